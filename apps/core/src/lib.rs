//! Companion Core
//!
//! Rule-driven, stateful conversation engine for the wellness companion.

pub mod config;
pub mod engine;
pub mod error;
pub mod session;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use error::{DataError, DetectorError, EngineError};
pub use session::{set_therapist_tone, split_choice, therapist_tone, CompanionSession, Response};
