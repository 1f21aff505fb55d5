//! Reply composition.
//!
//! A reply is built from optional parts joined by single spaces: opener,
//! reflection, one validation fragment, an optional safety check line, an
//! optional technique preface, and a closer. Memory recall sentences follow,
//! and a guided-flow prompt (with its `Options:` block) always comes last.

use rand::Rng;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

use super::data::{ConversationData, Step};
use super::detectors::Analysis;
use super::flow::{FlowAdvance, InterventionOffer};
use super::memory::augment_reply_with_memory;
use super::state::ConversationState;
use super::text::{random_choice, tokenize};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Marker line that tells the host the reply expects a choice.
pub const OPTIONS_MARKER: &str = "Options:";

pub const SAFETY_CHECK_LINE: &str =
    "I'm concerned by what you shared. Would you say you feel in danger right now?";

const REFLECTION_TOKENS: usize = 10;

static PRACTICAL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^practical:\s*").expect("Invalid regex: practical prefix"));

/// Inputs to one composition.
#[derive(Debug, Clone, Copy)]
pub struct ComposeContext<'a> {
    pub analysis: &'a Analysis,
    /// A flow offered for the first time this turn.
    pub offer: Option<&'a InterventionOffer<'a>>,
    /// The outcome of answering the active flow this turn.
    pub advance: Option<&'a FlowAdvance<'a>>,
    pub input: &'a str,
    pub therapist_tone: bool,
}

/// First ten normalized tokens of the input, ellipsized when longer.
pub fn reflective_summary(input: &str) -> String {
    let tokens = tokenize(input);
    if tokens.len() <= REFLECTION_TOKENS {
        return tokens.join(" ");
    }
    format!("{}…", tokens[..REFLECTION_TOKENS].join(" "))
}

/// One random fragment per scored category, strongest first, at most `max`.
///
/// Falls back to a generic pool when no scored category has fragments.
pub fn pick_fragments<R>(
    analysis: &Analysis,
    max: usize,
    data: &ConversationData,
    rng: &mut R,
) -> Vec<String>
where
    R: Rng + ?Sized,
{
    let mut ranked: Vec<_> = analysis.category_scores.iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(Ordering::Equal));

    let mut fragments = Vec::new();
    for (category, _) in ranked {
        if fragments.len() >= max {
            break;
        }
        let Some(pool) = data.fragments(*category) else {
            continue;
        };
        if let Some(fragment) = random_choice(pool, rng) {
            let fragment = if analysis.negation {
                PRACTICAL_PREFIX.replace(fragment, "Maybe: ").into_owned()
            } else {
                fragment.clone()
            };
            fragments.push(fragment);
        }
    }

    if fragments.is_empty() {
        if let Some(fallback) = random_choice(data.general_negative(), rng) {
            fragments.push(fallback.clone());
        }
    }
    fragments
}

/// Renders a flow step as its own paragraph, with a numbered option list.
pub fn render_step(step: &Step) -> String {
    let mut rendered = String::new();
    if let Some(text) = &step.text {
        rendered.push_str("\n\n");
        rendered.push_str(text);
    }

    let options = step.options();
    if !options.is_empty() {
        rendered.push('\n');
        rendered.push_str(OPTIONS_MARKER);
        for (i, option) in options.iter().enumerate() {
            rendered.push_str(&format!("\n{}. {}", i + 1, option));
        }
    }
    rendered
}

pub fn compose_full_reply<R>(
    ctx: ComposeContext<'_>,
    state: &mut ConversationState,
    data: &ConversationData,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<String, EngineError>
where
    R: Rng + ?Sized,
{
    let opener = random_choice(data.openers(), rng)
        .ok_or_else(|| EngineError::Composition("opener pool is empty".to_string()))?;

    let mut parts: Vec<String> = vec![opener.clone()];

    let reflection = reflective_summary(ctx.input);
    if !reflection.is_empty() {
        parts.push(format!("It sounds like: \"{}\".", reflection));
    }

    parts.extend(pick_fragments(ctx.analysis, 1, data, rng));

    if let Some(top) = ctx.analysis.hits.first() {
        if top.confidence >= config.safety_check_threshold {
            parts.push(SAFETY_CHECK_LINE.to_string());
        }
    }

    let mid_flow = ctx.advance.is_some();
    let offer_technique = ctx.offer.is_some()
        || (ctx.therapist_tone
            && !mid_flow
            && data.techniques().next().is_some()
            && rng.gen_bool(config.technique_offer_rate.clamp(0.0, 1.0)));
    if offer_technique {
        parts.push(data.evidence_preface().to_string());
    }

    let closer = random_choice(data.closers(), rng)
        .ok_or_else(|| EngineError::Composition("closer pool is empty".to_string()))?;
    parts.push(closer.clone());

    let mut reply = augment_reply_with_memory(
        state,
        &parts.join(" "),
        ctx.analysis,
        ctx.input,
        config.recall_limit,
    );

    if let Some(offer) = ctx.offer {
        let step = offer.initial_step().ok_or_else(|| {
            EngineError::Composition(format!("flow {} has no initial step", offer.flow_id))
        })?;
        reply.push_str(&render_step(step));
    } else if let Some(advance) = ctx.advance {
        match advance {
            FlowAdvance::Step { step, .. } => reply.push_str(&render_step(step)),
            FlowAdvance::Completed { message, .. } => {
                reply.push_str("\n\n");
                reply.push_str(message);
            }
        }
    }

    Ok(reply.trim().to_string())
}
