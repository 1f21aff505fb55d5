use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;
use validator::Validate;

use crate::error::EngineError;

/// Tunables of the conversation engine.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Turns after which an unmentioned theme is forgotten.
    #[validate(range(min = 1))]
    pub memory_max_age: u64,
    /// Offers of one flow allowed before it must be completed once.
    #[validate(range(min = 1))]
    pub offer_cap: u32,
    /// Chance of an unsolicited technique preface when the therapist tone is on.
    #[validate(range(min = 0.0, max = 1.0))]
    pub technique_offer_rate: f64,
    /// Top detector confidence at which the composer asks a safety question.
    #[validate(range(min = 0.0, max = 1.0))]
    pub safety_check_threshold: f32,
    #[validate(range(max = 10))]
    pub recall_limit: usize,
    /// Past turns the insomnia detector looks back over.
    #[validate(range(min = 1))]
    pub history_window: usize,
    /// Conversation data file; the embedded data set is used when unset.
    pub data_path: Option<PathBuf>,
    /// Seed for reproducible replies.
    pub rng_seed: Option<u64>,
    /// Initial value of the process-wide therapist tone toggle.
    pub therapist_tone: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_max_age: 30,
            offer_cap: 2,
            technique_offer_rate: 0.35,
            safety_check_threshold: 0.7,
            recall_limit: 2,
            history_window: 5,
            data_path: None,
            rng_seed: None,
            therapist_tone: true,
        }
    }
}

impl EngineConfig {
    /// Reads `COMPANION_*` variables (after loading a `.env` file if present)
    /// on top of the defaults, then validates the result.
    pub fn from_env() -> Result<Self, EngineError> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            memory_max_age: parse_var("COMPANION_MEMORY_MAX_AGE", defaults.memory_max_age)?,
            offer_cap: parse_var("COMPANION_OFFER_CAP", defaults.offer_cap)?,
            technique_offer_rate: parse_var(
                "COMPANION_TECHNIQUE_OFFER_RATE",
                defaults.technique_offer_rate,
            )?,
            safety_check_threshold: parse_var(
                "COMPANION_SAFETY_CHECK_THRESHOLD",
                defaults.safety_check_threshold,
            )?,
            recall_limit: parse_var("COMPANION_RECALL_LIMIT", defaults.recall_limit)?,
            history_window: parse_var("COMPANION_HISTORY_WINDOW", defaults.history_window)?,
            data_path: env::var("COMPANION_DATA_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            rng_seed: match env::var("COMPANION_RNG_SEED") {
                Ok(raw) => Some(parse_value("COMPANION_RNG_SEED", &raw)?),
                Err(_) => None,
            },
            therapist_tone: parse_var("COMPANION_THERAPIST_TONE", defaults.therapist_tone)?,
        };

        config.validate()?;
        debug!("Engine config: {:?}", config);
        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, EngineError> {
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, EngineError> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{} has an invalid value: '{}'", key, raw)))
}
