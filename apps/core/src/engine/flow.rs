//! Guided intervention flows: offering, throttling, advancing, completing.

use tracing::{debug, info, warn};

use super::category::FlowId;
use super::data::{ConversationData, Flow, Step, Transition, INITIAL_STEP};
use super::detectors::DetectorHit;
use super::state::ConversationState;
use super::text::normalize;

/// Offers without a single completion after which a flow is no longer offered.
pub const DEFAULT_OFFER_CAP: u32 = 2;

pub const DEFAULT_COMPLETION_TEXT: &str = "Nice work completing this exercise.";

/// A flow proposed to the user this turn.
#[derive(Debug, Clone)]
pub struct InterventionOffer<'a> {
    pub flow_id: FlowId,
    pub trigger: DetectorHit,
    pub flow: &'a Flow,
}

impl<'a> InterventionOffer<'a> {
    pub fn initial_step(&self) -> Option<&'a Step> {
        self.flow.initial_step()
    }
}

/// What happened when the user answered the active step.
#[derive(Debug, Clone)]
pub enum FlowAdvance<'a> {
    /// The flow moved on to `step_key`, which the composer renders.
    Step {
        flow_id: FlowId,
        step_key: String,
        step: &'a Step,
    },
    /// The flow finished; `message` is its completion text.
    Completed { flow_id: FlowId, message: String },
}

/// Proposes the flow mapped to the first detector hit, unless it has been
/// ignored too often. Records the offer; the caller activates the flow.
pub fn maybe_offer_intervention<'a>(
    state: &mut ConversationState,
    hits: &[DetectorHit],
    data: &'a ConversationData,
    offer_cap: u32,
) -> Option<InterventionOffer<'a>> {
    let trigger = hits.first()?.clone();
    let flow_id = data.flow_for_detector(trigger.id)?;
    let flow = data.flow(flow_id)?;

    let meta = &mut state.intervention_meta;
    let completed = meta
        .completions
        .get(&flow_id)
        .map(|c| c.count)
        .unwrap_or(0);
    let offer = meta.offers.entry(flow_id).or_default();

    if offer.count >= offer_cap && completed == 0 {
        debug!(
            "Not offering {}: offered {} times without completion",
            flow_id, offer.count
        );
        return None;
    }

    offer.count += 1;
    offer.last_offered_turn = state.turn;
    info!(
        "Offering flow {} (trigger {} at {:.2})",
        flow_id, trigger.id, trigger.confidence
    );

    Some(InterventionOffer {
        flow_id,
        trigger,
        flow,
    })
}

/// Resolves the user's answer to the active step.
///
/// Returns `None` when no flow is active, or when the active flow or step no
/// longer exists, in which case the flow state is reset.
pub fn advance_flow<'a>(
    state: &mut ConversationState,
    input: &str,
    data: &'a ConversationData,
) -> Option<FlowAdvance<'a>> {
    let active = state.active_flow.clone()?;

    let Some(flow) = data.flow(active.flow_id) else {
        warn!("Active flow {} has no definition, resetting", active.flow_id);
        reset_flow_state(state);
        return None;
    };
    let Some(step) = flow.step(&active.step_key) else {
        warn!(
            "Flow {} has no step {}, resetting",
            active.flow_id, active.step_key
        );
        reset_flow_state(state);
        return None;
    };

    let next = match &step.transition {
        Transition::Terminal => None,
        Transition::Linear { next } => Some(next.clone()),
        Transition::Branching { choices, fallback } => {
            let answer = normalize(input);
            let chosen = choice_by_number(&answer, choices.len())
                .or_else(|| {
                    choices
                        .iter()
                        .position(|c| {
                            let label = normalize(&c.label);
                            !label.is_empty() && answer.contains(&label)
                        })
                })
                .map(|idx| choices[idx].target.clone());

            if chosen.is_none() {
                *state
                    .intervention_meta
                    .clarify_counts
                    .entry(active.flow_id)
                    .or_default()
                    .entry(active.step_key.clone())
                    .or_insert(0) += 1;
                debug!(
                    "Answer matched no option of {}/{}",
                    active.flow_id, active.step_key
                );
            }
            chosen.or_else(|| fallback.clone())
        }
    };

    match next.and_then(|key| flow.step(&key).map(|step| (key, step))) {
        Some((step_key, step)) => {
            state.set_flow(active.flow_id, step_key.clone());
            Some(FlowAdvance::Step {
                flow_id: active.flow_id,
                step_key,
                step,
            })
        }
        None => Some(complete_flow(state, flow)),
    }
}

/// Accepts "1", "2", ... as a pick of the matching option.
fn choice_by_number(answer: &str, count: usize) -> Option<usize> {
    let n: usize = answer.parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}

fn complete_flow<'a>(state: &mut ConversationState, flow: &Flow) -> FlowAdvance<'a> {
    let turn = state.turn;
    let record = state
        .intervention_meta
        .completions
        .entry(flow.id)
        .or_default();
    record.count += 1;
    record.last_completed_turn = turn;
    reset_flow_state(state);

    info!("Flow {} completed at turn {}", flow.id, turn);
    FlowAdvance::Completed {
        flow_id: flow.id,
        message: flow
            .completion_text
            .clone()
            .unwrap_or_else(|| DEFAULT_COMPLETION_TEXT.to_string()),
    }
}

/// Puts the flow at its initial step.
pub fn activate_flow(state: &mut ConversationState, flow_id: FlowId) {
    state.set_flow(flow_id, INITIAL_STEP);
}

pub fn reset_flow_state(state: &mut ConversationState) {
    state.reset_flow();
}
