//! Short-term memory: recurring themes, simple personal facts, expiration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::category::{Category, FactKind};
use super::detectors::Analysis;
use super::state::ConversationState;
use super::text::{normalize, tokenize};

/// Themes older than this many turns are forgotten.
pub const DEFAULT_MAX_AGE: u64 = 30;

/// Categories scoring at least this much are worth remembering.
pub const THEME_SCORE_THRESHOLD: f32 = 2.0;

/// Articles skipped when capturing the word after an anchor phrase.
const ARTICLES: &[&str] = &["a", "an", "the"];

/// A theme surfaced for recall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalledTheme {
    pub category: Category,
    pub last_mention: String,
    pub last_turn: u64,
}

/// Records that `input` touched on `category` during the current turn.
///
/// Storing the same input twice in one turn only refreshes recency.
pub fn store_theme_mention(state: &mut ConversationState, category: Category, input: &str) {
    let turn = state.turn;
    let item = state.memory.themes.entry(category).or_default();

    let repeated = item.last_turn == turn && item.mentions.last().map(String::as_str) == Some(input);
    if !repeated {
        item.mentions.push(input.to_string());
    }
    item.last_turn = turn;
}

/// Up to `limit` remembered themes, most recent first.
pub fn recall_themes(state: &ConversationState, limit: usize) -> Vec<RecalledTheme> {
    let mut themes: Vec<RecalledTheme> = state
        .memory
        .themes
        .iter()
        .filter_map(|(category, item)| {
            item.mentions.last().map(|mention| RecalledTheme {
                category: *category,
                last_mention: mention.clone(),
                last_turn: item.last_turn,
            })
        })
        .collect();

    themes.sort_by(|a, b| {
        b.last_turn
            .cmp(&a.last_turn)
            .then_with(|| a.category.cmp(&b.category))
    });
    themes.truncate(limit);
    themes
}

pub fn store_fact(state: &mut ConversationState, kind: FactKind, value: impl Into<String>) {
    state.memory.facts.insert(kind, value.into());
}

pub fn recall_facts(state: &ConversationState) -> &BTreeMap<FactKind, String> {
    &state.memory.facts
}

/// Naive anchor-phrase extraction of a name, job or location.
///
/// Rules are tried in that order and the first one that captures a value wins.
pub fn detect_and_store_entities(
    state: &mut ConversationState,
    input: &str,
) -> Option<(FactKind, String)> {
    let text = normalize(input);

    let captured = word_after(&text, "my name is")
        .map(|name| (FactKind::Name, name))
        .or_else(|| word_after(&text, "i work as").map(|job| (FactKind::Job, job)))
        .or_else(|| {
            let tokens = tokenize(&text);
            tokens
                .iter()
                .position(|t| t == "from")
                .and_then(|idx| tokens.get(idx + 1))
                .map(|location| (FactKind::Location, location.clone()))
        })?;

    debug!("Captured fact {} = {}", captured.0, captured.1);
    store_fact(state, captured.0, captured.1.clone());
    Some(captured)
}

fn word_after(text: &str, anchor: &str) -> Option<String> {
    let (_, rest) = text.split_once(anchor)?;
    rest.split_whitespace()
        .find(|word| !ARTICLES.contains(word))
        .map(str::to_string)
}

/// Forgets themes not mentioned within the last `max_age` turns. Facts are kept.
pub fn expire_old_memories(state: &mut ConversationState, max_age: u64) {
    let turn = state.turn;
    let before = state.memory.themes.len();
    state
        .memory
        .themes
        .retain(|_, item| turn.saturating_sub(item.last_turn) <= max_age);

    let expired = before - state.memory.themes.len();
    if expired > 0 {
        debug!("Expired {} stale theme(s) at turn {}", expired, turn);
    }
}

pub fn clear_all_memory(state: &mut ConversationState) {
    state.clear_memory();
}

/// Appends "earlier you mentioned" recall sentences, then re-stores this
/// turn's strong categories so recurring themes stay fresh.
pub fn augment_reply_with_memory(
    state: &mut ConversationState,
    reply: &str,
    analysis: &Analysis,
    input: &str,
    recall_limit: usize,
) -> String {
    let mut augmented = reply.to_string();

    let recalled: Vec<String> = recall_themes(state, recall_limit)
        .into_iter()
        .map(|theme| {
            format!(
                "Earlier you mentioned {} (e.g., \"{}\").",
                theme.category.label().replace('_', " "),
                single_line(&theme.last_mention)
            )
        })
        .collect();

    if !recalled.is_empty() {
        augmented.push(' ');
        augmented.push_str(&recalled.join(" "));
    }

    for category in analysis.categories_at_least(THEME_SCORE_THRESHOLD) {
        store_theme_mention(state, category, input);
    }

    augmented
}

/// Collapses every whitespace run, line breaks included, to one space.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
