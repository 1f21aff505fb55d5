//! Host-facing conversation surface.
//!
//! Wraps an [`Engine`] and one [`ConversationState`], turns raw reply text into
//! a plain message or a multiple-choice prompt, and never lets an engine error
//! reach the host.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::engine::composer::OPTIONS_MARKER;
use crate::engine::controller::{reset_engine, Engine, TurnOptions};
use crate::engine::state::{ConversationState, Exchange, StateSnapshot};
use crate::error::EngineError;

pub const APOLOGY_MESSAGE: &str =
    "I'm having some trouble finding the right words. Could you try rephrasing or tell me in another way?";

static THERAPIST_TONE: AtomicBool = AtomicBool::new(true);

static OPTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("Invalid regex: option number"));

/// Sets the process-wide therapist tone read by every session on each turn.
pub fn set_therapist_tone(enabled: bool) {
    THERAPIST_TONE.store(enabled, Ordering::Relaxed);
    info!("Therapist tone {}", if enabled { "enabled" } else { "disabled" });
}

pub fn therapist_tone() -> bool {
    THERAPIST_TONE.load(Ordering::Relaxed)
}

/// A reply as the host presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Message { text: String },
    Choice { text: String, options: Vec<String> },
}

impl Response {
    pub fn text(&self) -> &str {
        match self {
            Response::Message { text } | Response::Choice { text, .. } => text,
        }
    }
}

/// Splits reply text at its `Options:` line into a prompt and numbered options.
pub fn split_choice(reply: &str) -> Response {
    let marker = format!("\n{}", OPTIONS_MARKER);
    let Some((text, rest)) = reply.split_once(&marker) else {
        return Response::Message {
            text: reply.to_string(),
        };
    };

    let options: Vec<String> = rest
        .lines()
        .map(|line| OPTION_NUMBER.replace(line.trim(), "").trim().to_string())
        .filter(|option| !option.is_empty())
        .collect();

    if options.is_empty() {
        return Response::Message {
            text: reply.to_string(),
        };
    }

    Response::Choice {
        text: text.trim().to_string(),
        options,
    }
}

/// Presents a turn's outcome, replacing any error with the generic apology.
pub fn reply_or_apology(result: Result<String, EngineError>) -> Response {
    match result {
        Ok(reply) => split_choice(&reply),
        Err(e) => {
            error!("Failed to produce a reply: {}", e);
            Response::Message {
                text: APOLOGY_MESSAGE.to_string(),
            }
        }
    }
}

/// One conversation with the companion.
pub struct CompanionSession {
    engine: Engine,
    state: ConversationState,
}

impl CompanionSession {
    pub fn new(engine: Engine) -> Self {
        let state = ConversationState::new();
        info!("Session {} started", state.session_id);
        Self { engine, state }
    }

    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::new(Engine::from_config(config)?))
    }

    /// Replies to `input`. Engine errors become a generic apology.
    pub fn get_response(&mut self, input: &str) -> Response {
        let options = TurnOptions {
            therapist_tone: therapist_tone(),
        };

        reply_or_apology(self.engine.process_user_input(input, &mut self.state, options))
    }

    /// Forgets everything and starts a fresh conversation.
    pub fn reset_conversation(&mut self) {
        reset_engine(&mut self.state);
        self.state = ConversationState::new();
        info!("Session reset, new id {}", self.state.session_id);
    }

    pub fn history(&self) -> &[Exchange] {
        &self.state.history
    }

    pub fn debug_state(&self) -> StateSnapshot {
        self.state.debug_snapshot()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_message() {
        assert_eq!(
            split_choice("Just text."),
            Response::Message { text: "Just text.".to_string() }
        );
    }

    #[test]
    fn test_split_choice() {
        let reply = "Hello.\n\nHow would you like to start?\nOptions:\n1. Breathing\n2. Grounding";
        assert_eq!(
            split_choice(reply),
            Response::Choice {
                text: "Hello.\n\nHow would you like to start?".to_string(),
                options: vec!["Breathing".to_string(), "Grounding".to_string()],
            }
        );
    }

    #[test]
    fn test_marker_without_options_is_a_message() {
        let reply = "Hello.\nOptions:\n";
        assert_eq!(split_choice(reply).text(), reply);
    }

    #[test]
    fn test_response_serializes_with_kind_tag() {
        let json = serde_json::to_value(Response::Choice {
            text: "Pick".to_string(),
            options: vec!["A".to_string()],
        })
        .unwrap();
        assert_eq!(json["kind"], "choice");
        assert_eq!(json["options"][0], "A");

        let json = serde_json::to_value(Response::Message { text: "Hi".to_string() }).unwrap();
        assert_eq!(json["kind"], "message");
    }
}
