//! Turn orchestration.
//!
//! One call to [`Engine::process_user_input`] is one turn: safety pre-check,
//! detectors, memory, flow step, shortcuts or composition, safety override,
//! history.

use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};

use super::category::FlowId;
use super::composer::{compose_full_reply, ComposeContext};
use super::data::ConversationData;
use super::detectors::DetectorRegistry;
use super::flow::{activate_flow, advance_flow, maybe_offer_intervention, reset_flow_state};
use super::memory::{
    clear_all_memory, detect_and_store_entities, expire_old_memories, store_theme_mention,
    THEME_SCORE_THRESHOLD,
};
use super::safety::{check_safety, SafetyVerdict};
use super::state::{ConversationState, InterventionMeta};
use super::techniques::{box_breathing_script, produce_technique_script};
use super::text::normalize;
use crate::config::EngineConfig;
use crate::error::EngineError;

pub const EMPTY_INPUT_MESSAGE: &str = "I'm here to listen whenever you feel ready to share.";

pub const DECLINE_MESSAGE: &str = "That's completely fine. We can just talk, or you can let me know if you'd like a short exercise later.";

pub const TECHNIQUE_NOT_FOUND_MESSAGE: &str =
    "I couldn't find that technique, but I can share Box Breathing or Grounding if you'd like.";

// NOTE: expect() is acceptable for compile-time constant patterns.
static ACCEPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(yes|sure|okay|ok|alright)$").expect("Invalid regex: accept shortcut")
});

static DECLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(no|not now|maybe later)$").expect("Invalid regex: decline shortcut")
});

static TECHNIQUE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*technique\s*:(.*)$").expect("Invalid regex: technique prefix")
});

/// Per-turn switches supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOptions {
    pub therapist_tone: bool,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            therapist_tone: true,
        }
    }
}

/// Exact-match replies to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shortcut {
    Accept,
    Decline,
}

impl Shortcut {
    fn detect(normalized: &str) -> Option<Self> {
        if ACCEPT_PATTERN.is_match(normalized) {
            Some(Shortcut::Accept)
        } else if DECLINE_PATTERN.is_match(normalized) {
            Some(Shortcut::Decline)
        } else {
            None
        }
    }
}

/// The conversation engine: shared static data, detectors, tunables and the RNG.
///
/// Holds no conversation state of its own; every turn borrows a
/// [`ConversationState`] mutably.
pub struct Engine {
    data: Arc<ConversationData>,
    detectors: DetectorRegistry,
    config: EngineConfig,
    rng: StdRng,
}

impl Engine {
    pub fn new(data: Arc<ConversationData>, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let detectors = DetectorRegistry::standard(config.history_window);
        info!(
            "Engine ready with {} detectors (seeded: {})",
            detectors.ids().len(),
            config.rng_seed.is_some()
        );

        Self {
            data,
            detectors,
            config,
            rng,
        }
    }

    /// Loads the configured data file, or the embedded data set.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let data = match &config.data_path {
            Some(path) => ConversationData::from_path(path)?,
            None => ConversationData::embedded()?,
        };
        Ok(Self::new(Arc::new(data), config))
    }

    /// Replaces the detector set.
    pub fn with_detectors(mut self, detectors: DetectorRegistry) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn data(&self) -> &ConversationData {
        &self.data
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one turn and returns the reply text.
    #[instrument(skip_all, fields(session_id = %state.session_id, turn = state.turn + 1))]
    pub fn process_user_input(
        &mut self,
        input: &str,
        state: &mut ConversationState,
        options: TurnOptions,
    ) -> Result<String, EngineError> {
        if input.trim().is_empty() {
            return Ok(EMPTY_INPUT_MESSAGE.to_string());
        }

        state.turn += 1;
        let data = Arc::clone(&self.data);
        let verdict = check_safety(input, &mut self.rng);

        if let Some(query) = technique_request(input) {
            debug!("Direct technique request: {:?}", query);
            let script = produce_technique_script(&data, &query)
                .unwrap_or_else(|| TECHNIQUE_NOT_FOUND_MESSAGE.to_string());
            return Ok(finish_turn(state, input, &verdict, script));
        }

        let analysis = self.detectors.run(input, state, data.keywords());
        debug!(
            "Analysis: {} scored categories, {} hits, negation {}",
            analysis.category_scores.len(),
            analysis.hits.len(),
            analysis.negation
        );

        detect_and_store_entities(state, input);
        for category in analysis.categories_at_least(THEME_SCORE_THRESHOLD) {
            store_theme_mention(state, category, input);
        }
        expire_old_memories(state, self.config.memory_max_age);

        if !verdict.safe {
            let reply = verdict.override_reply(String::new());
            return Ok(finish_turn(state, input, &verdict, reply));
        }

        let flow_in_play = state.active_flow.as_ref().map(|active| active.flow_id);
        let mut offer = None;
        let mut advance = None;
        if flow_in_play.is_some() {
            advance = advance_flow(state, input, &data);
        } else if let Some(offered) =
            maybe_offer_intervention(state, &analysis.hits, &data, self.config.offer_cap)
        {
            activate_flow(state, offered.flow_id);
            offer = Some(offered);
        }

        if let Some(shortcut) = Shortcut::detect(&normalize(input)) {
            let flow_id = flow_in_play.or(offer.as_ref().map(|o| o.flow_id));
            let reply = shortcut_reply(shortcut, flow_id, &data);
            return Ok(finish_turn(state, input, &verdict, reply));
        }

        let ctx = ComposeContext {
            analysis: &analysis,
            offer: offer.as_ref(),
            advance: advance.as_ref(),
            input,
            therapist_tone: options.therapist_tone,
        };
        let reply = compose_full_reply(ctx, state, &data, &self.config, &mut self.rng)?;

        Ok(finish_turn(state, input, &verdict, reply))
    }
}

/// "yes" answers with the script behind the flow in play, "no" with an
/// acknowledgment. Flow bookkeeping is left to the flow step.
fn shortcut_reply(
    shortcut: Shortcut,
    flow_id: Option<FlowId>,
    data: &ConversationData,
) -> String {
    match shortcut {
        Shortcut::Accept => flow_id
            .and_then(|id| data.flow(id))
            .and_then(|flow| flow.technique.as_deref())
            .and_then(|technique| produce_technique_script(data, technique))
            .unwrap_or_else(|| box_breathing_script(data)),
        Shortcut::Decline => DECLINE_MESSAGE.to_string(),
    }
}

/// The id or name after a `technique:` prefix, if the input has one.
fn technique_request(input: &str) -> Option<String> {
    TECHNIQUE_PREFIX
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Applies the safety override and records the exchange.
fn finish_turn(
    state: &mut ConversationState,
    input: &str,
    verdict: &SafetyVerdict,
    reply: String,
) -> String {
    let reply = verdict.override_reply(reply);
    if let Some(category) = verdict.category {
        warn!("Safety override applied ({})", category);
    }
    state.add_history(input, reply.clone());
    reply
}

/// Clears memory, flow, history and intervention bookkeeping in place.
pub fn reset_engine(state: &mut ConversationState) {
    clear_all_memory(state);
    reset_flow_state(state);
    state.history.clear();
    state.intervention_meta = InterventionMeta::default();
    info!("Conversation {} reset", state.session_id);
}
