//! Engine Tests
//!
//! Multi-turn conversations through the controller: safety precedence, memory
//! recall, offers and flow progress, shortcuts, and turn bookkeeping.

use crate::config::EngineConfig;
use crate::engine::category::{Category, DetectorId, FlowId};
use crate::engine::controller::{Engine, TurnOptions, EMPTY_INPUT_MESSAGE};
use crate::engine::detectors::{DetectionContext, Detector, DetectorRegistry};
use crate::engine::memory::recall_themes;
use crate::engine::safety::SafetyCategory;
use crate::engine::state::ConversationState;
use crate::error::DetectorError;

// ============================================================================
// Test Fixtures
// ============================================================================

fn seeded_engine(seed: u64) -> Engine {
    let config = EngineConfig {
        rng_seed: Some(seed),
        ..EngineConfig::default()
    };
    Engine::from_config(config).expect("embedded data must load")
}

fn say(engine: &mut Engine, state: &mut ConversationState, input: &str) -> String {
    engine
        .process_user_input(input, state, TurnOptions::default())
        .expect("turn must succeed")
}

const BURNOUT_INPUT: &str = "I'm so burned out and exhausted";

// ============================================================================
// Scenarios
// ============================================================================

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_crisis_input_is_overridden() {
        let mut engine = seeded_engine(1);
        let mut state = ConversationState::new();

        let reply = say(&mut engine, &mut state, "I want to kill myself");

        assert!(
            SafetyCategory::Suicide.messages().contains(&reply.as_str()),
            "Unexpected reply: {}",
            reply
        );
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].ai, reply);
        assert!(state.active_flow.is_none());
        assert!(state.intervention_meta.offers.is_empty());
    }

    #[test]
    fn test_crisis_during_flow_does_not_advance_it() {
        let mut engine = seeded_engine(2);
        let mut state = ConversationState::new();

        say(&mut engine, &mut state, BURNOUT_INPUT);
        let before = state.active_flow.clone();
        assert!(before.is_some());

        let reply = say(&mut engine, &mut state, "honestly I'm burned out and I want to die");
        assert!(SafetyCategory::Suicide.messages().contains(&reply.as_str()));
        assert_eq!(state.active_flow, before);
    }

    #[test]
    fn test_empty_input() {
        let mut engine = seeded_engine(3);
        let mut state = ConversationState::new();
        say(&mut engine, &mut state, "hello");

        let reply = say(&mut engine, &mut state, "");
        assert_eq!(reply, EMPTY_INPUT_MESSAGE);
        assert_eq!(state.turn, 1);
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_repeated_burnout_is_recalled() {
        let mut engine = seeded_engine(4);
        let mut state = ConversationState::new();

        for _ in 0..2 {
            let analysis = DetectorRegistry::default().run(
                BURNOUT_INPUT,
                &state,
                engine.data().keywords(),
            );
            let burnout = analysis
                .hits
                .iter()
                .find(|h| h.id == DetectorId::Burnout)
                .expect("burnout must fire");
            assert!(burnout.confidence > 0.0);

            say(&mut engine, &mut state, BURNOUT_INPUT);
        }

        let themes = recall_themes(&state, 2);
        assert!(themes.iter().any(|t| t.category == Category::Burnout));
        assert_eq!(state.memory.themes[&Category::Burnout].mentions.len(), 2);
    }

    #[test]
    fn test_offer_then_yes_returns_script() {
        let mut engine = seeded_engine(5);
        let mut state = ConversationState::new();

        let offer = say(&mut engine, &mut state, BURNOUT_INPUT);
        assert!(offer.contains("\nOptions:\n1. Guide me"));
        let active = state.active_flow.clone().expect("flow must be active");
        assert_eq!(active.flow_id, FlowId::BoxBreathing);
        assert_eq!(active.step_key, "step1");

        let reply = say(&mut engine, &mut state, "yes");
        assert!(reply.contains("Technique:"));
        assert!(!reply.contains("Options:"));
        assert_eq!(state.active_flow.as_ref().map(|a| a.step_key.as_str()), Some("step2"));
        assert!(state.intervention_meta.completions.is_empty());
    }

    #[test]
    fn test_ok_mid_flow_does_not_abort_exercise() {
        let mut engine = seeded_engine(15);
        let mut state = ConversationState::new();

        say(&mut engine, &mut state, BURNOUT_INPUT);
        say(&mut engine, &mut state, "Guide me");
        assert_eq!(state.active_flow.as_ref().map(|a| a.step_key.as_str()), Some("step2"));

        let reply = say(&mut engine, &mut state, "ok");
        assert!(reply.contains("Technique:"));
        assert_eq!(state.active_flow.as_ref().map(|a| a.step_key.as_str()), Some("step3"));
        assert!(state.intervention_meta.completions.is_empty());
    }

    #[test]
    fn test_guided_flow_runs_to_completion() {
        let mut engine = seeded_engine(6);
        let mut state = ConversationState::new();

        say(&mut engine, &mut state, BURNOUT_INPUT);

        let step2 = say(&mut engine, &mut state, "Guide me please");
        assert_eq!(state.active_flow.as_ref().map(|a| a.step_key.as_str()), Some("step2"));
        let box_breathing = engine.data().flow(FlowId::BoxBreathing).unwrap().clone();
        let step2_text = box_breathing.step("step2").unwrap().text.clone().unwrap();
        assert!(step2.ends_with(&step2_text));

        say(&mut engine, &mut state, "done with that");
        say(&mut engine, &mut state, "that felt calmer");
        assert!(state.active_flow.is_none());
        let completion = state.history.last().unwrap().ai.clone();
        assert!(completion.ends_with(box_breathing.completion_text.as_deref().unwrap()));
        assert_eq!(state.intervention_meta.completions[&FlowId::BoxBreathing].count, 1);
    }

    #[test]
    fn test_decline_after_offer() {
        let mut engine = seeded_engine(7);
        let mut state = ConversationState::new();

        say(&mut engine, &mut state, BURNOUT_INPUT);
        let reply = say(&mut engine, &mut state, "maybe later");
        assert!(reply.starts_with("That's completely fine."));
        assert!(state.intervention_meta.completions.is_empty());
    }

    #[test]
    fn test_ignored_offers_are_throttled() {
        let mut engine = seeded_engine(8);
        let mut state = ConversationState::new();

        for _ in 0..4 {
            say(&mut engine, &mut state, BURNOUT_INPUT);
            state.reset_flow();
        }
        assert_eq!(state.intervention_meta.offers[&FlowId::BoxBreathing].count, 2);
    }

    #[test]
    fn test_facts_are_captured() {
        let mut engine = seeded_engine(9);
        let mut state = ConversationState::new();

        say(&mut engine, &mut state, "my name is Jordan");
        assert_eq!(
            state.memory.facts.get(&crate::engine::category::FactKind::Name).map(String::as_str),
            Some("jordan")
        );
    }
}

// ============================================================================
// Resilience
// ============================================================================

#[cfg(test)]
mod resilience_tests {
    use super::*;

    struct BrokenDetector;

    impl Detector for BrokenDetector {
        fn id(&self) -> DetectorId {
            DetectorId::Burnout
        }

        fn description(&self) -> &'static str {
            "fails every time"
        }

        fn detect(&self, _ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError> {
            Err(DetectorError::Heuristic {
                detector: "burnout".to_string(),
                reason: "unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_failing_detector_does_not_abort_turn() {
        let mut engine = seeded_engine(10)
            .with_detectors(DetectorRegistry::with_detectors(vec![Box::new(BrokenDetector)]));
        let mut state = ConversationState::new();

        let reply = say(&mut engine, &mut state, BURNOUT_INPUT);
        assert!(!reply.is_empty());
        assert!(state.active_flow.is_none());
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let inputs = ["hello", BURNOUT_INPUT, "Guide me", "I feel so alone lately"];
        let mut first = seeded_engine(42);
        let mut second = seeded_engine(42);
        let mut a = ConversationState::new();
        let mut b = ConversationState::new();

        for input in inputs {
            assert_eq!(say(&mut first, &mut a, input), say(&mut second, &mut b, input));
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn turn_counts_non_empty_inputs(inputs in prop::collection::vec(".{0,40}", 1..8)) {
            let mut engine = seeded_engine(13);
            let mut state = ConversationState::new();

            for input in &inputs {
                let before = state.turn;
                let history = state.history.len();
                let reply = engine
                    .process_user_input(input, &mut state, TurnOptions::default())
                    .unwrap();

                if input.trim().is_empty() {
                    prop_assert_eq!(state.turn, before);
                    prop_assert_eq!(state.history.len(), history);
                    prop_assert_eq!(reply, EMPTY_INPUT_MESSAGE);
                } else {
                    prop_assert_eq!(state.turn, before + 1);
                    prop_assert_eq!(state.history.len(), history + 1);
                }
            }
        }

        #[test]
        fn crisis_phrase_always_wins(prefix in "[a-z ]{0,30}", suffix in "[a-z ]{0,30}") {
            let mut engine = seeded_engine(14);
            let mut state = ConversationState::new();
            let input = format!("{} suicidal {}", prefix, suffix);

            let reply = engine
                .process_user_input(&input, &mut state, TurnOptions::default())
                .unwrap();
            prop_assert!(SafetyCategory::Suicide.messages().contains(&reply.as_str()));
            prop_assert!(state.active_flow.is_none());
        }
    }
}
