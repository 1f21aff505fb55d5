use std::io;
use thiserror::Error;

/// Engine-wide error type, consolidating everything a turn or a data load can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The static conversation data failed load-time validation.
    #[error("Conversation data error: {0}")]
    Data(#[from] DataError),

    /// Represents unexpected failures while assembling a reply.
    #[error("Composition error: {0}")]
    Composition(String),

    /// Represents configuration-related errors (e.g., malformed environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents malformed JSON in a conversation data file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::Config(format!("Validation errors: {}", err))
    }
}

/// Inconsistencies found while validating conversation data at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("detector '{detector}' maps to unknown flow '{flow}'")]
    UnknownFlow { detector: String, flow: String },

    #[error("flow '{flow}' has no step1")]
    MissingInitialStep { flow: String },

    #[error("flow '{flow}' step '{step}' points at unknown step '{target}'")]
    DanglingStep {
        flow: String,
        step: String,
        target: String,
    },

    #[error("flow '{flow}' step '{step}' has {options} options but {branches} branches")]
    BranchMismatch {
        flow: String,
        step: String,
        options: usize,
        branches: usize,
    },

    #[error("flow '{flow}' references unknown technique '{technique}'")]
    UnknownTechnique { flow: String, technique: String },

    #[error("response pool '{0}' is empty")]
    EmptyPool(String),
}

/// A single detector failing. Collected as data, never propagated out of a turn.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("detector '{detector}' failed: {reason}")]
    Heuristic { detector: String, reason: String },

    #[error("detector '{detector}' produced out-of-range confidence {value}")]
    InvalidConfidence { detector: String, value: f32 },
}
