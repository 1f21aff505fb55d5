//! # Engine Module
//!
//! Rule-driven conversation engine for the wellness companion.
//! Classifies input with keyword weights and phrase detectors, runs guided
//! exercises, remembers recurring themes and overrides replies on crisis language.
//!
//! ## Components
//! - `text`: Normalization, tokenization, negation and scoring helpers
//! - `category`: Category, detector, flow and fact identifiers
//! - `data`: Static conversation data, validated at load time
//! - `safety`: Crisis and sensitive-topic override
//! - `detectors`: Keyword baseline and pattern detectors
//! - `memory`: Theme recall, personal facts, expiration
//! - `flow`: Guided intervention flows
//! - `techniques`: Technique scripts
//! - `composer`: Reply assembly
//! - `controller`: Turn orchestration
//! - `state`: Per-conversation state

pub mod category;
pub mod composer;
pub mod controller;
pub mod data;
pub mod detectors;
pub mod flow;
pub mod memory;
pub mod safety;
pub mod state;
pub mod techniques;
pub mod text;

pub use category::{Category, DetectorId, FactKind, FlowId};
pub use controller::{reset_engine, Engine, TurnOptions};
pub use data::ConversationData;
pub use detectors::{Analysis, Detector, DetectorHit, DetectorRegistry};
pub use safety::{SafetyCategory, SafetyVerdict};
pub use state::{ConversationState, Exchange, StateSnapshot};
