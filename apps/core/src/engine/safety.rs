//! Safety filter for crisis and sensitive language.
//!
//! Crisis categories are checked before sensitive ones and the first match
//! wins. An unsafe verdict replaces the whole reply; nothing the composer
//! produced survives it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::text::{normalize, random_choice};

/// Whether a category is an immediate crisis or a sensitive topic to redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Crisis,
    Sensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Suicide,
    SelfHarm,
    Violence,
    Substance,
    Abuse,
}

/// Check order: crisis first, then sensitive.
const CHECK_ORDER: [SafetyCategory; 5] = [
    SafetyCategory::Suicide,
    SafetyCategory::SelfHarm,
    SafetyCategory::Violence,
    SafetyCategory::Substance,
    SafetyCategory::Abuse,
];

// Phrases are written in normalized form: apostrophes and hyphens become spaces.
const SUICIDE_PHRASES: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "want to die",
    "end my life",
    "not worth living",
    "better off dead",
];

const SELF_HARM_PHRASES: &[&str] = &[
    "cut myself",
    "cutting myself",
    "hurting myself",
    "hurt myself",
    "self harm",
    "burn myself",
];

const VIOLENCE_PHRASES: &[&str] = &[
    "kill them",
    "kill him",
    "kill her",
    "shoot someone",
    "stab someone",
    "hurt others",
    "murder",
];

const SUBSTANCE_PHRASES: &[&str] = &[
    "overdose",
    "drug abuse",
    "drank too much",
    "cocaine",
    "heroin",
];

const ABUSE_PHRASES: &[&str] = &[
    "abusive partner",
    "gaslighting",
    "domestic violence",
    "he hits me",
    "she hits me",
];

const SUICIDE_MESSAGES: &[&str] = &[
    "I'm really concerned by what you said, and you are not alone in this. If you are thinking about suicide, please call your local crisis line or emergency services right now.",
    "Your safety matters more than anything else here. Please reach out to a suicide prevention hotline or emergency services immediately.",
    "It sounds like you are in a lot of pain. Please contact a crisis line or a professional right now. You deserve support and care.",
];

const SELF_HARM_MESSAGES: &[&str] = &[
    "I'm really sorry you're feeling like hurting yourself. Please talk to someone you trust or a professional right away.",
    "Hurting yourself is serious and your safety matters to me. Please contact a crisis line in your area.",
    "If you're at risk of harming yourself, please pause and call a helpline or emergency number now.",
];

const VIOLENCE_MESSAGES: &[&str] = &[
    "I can't support harming anyone. If you feel like you might hurt someone, please seek professional help immediately.",
    "Your feelings matter, but violence isn't the answer. Please reach out to a counselor or mental health professional right now.",
    "Harming others isn't safe for you or them. Please contact emergency services or a mental health professional.",
];

const SUBSTANCE_MESSAGES: &[&str] = &[
    "It sounds like you may be struggling with substance use. I'm not a replacement for medical help, but talking to a professional could make a real difference.",
    "Managing substances can be really hard. Please consider speaking with a doctor, counselor, or support group.",
    "If substance use is hurting you, please reach out to a professional for safe guidance.",
];

const ABUSE_MESSAGES: &[&str] = &[
    "I'm so sorry you're experiencing this. You deserve to be safe and respected. Please contact someone you trust or a local helpline.",
    "Abuse is never okay. If you are in danger, please call emergency services or a domestic violence hotline right away.",
    "You are not alone. Please reach out to a support service in your area that can help you stay safe.",
];

impl SafetyCategory {
    pub fn severity(&self) -> Severity {
        match self {
            SafetyCategory::Suicide | SafetyCategory::SelfHarm | SafetyCategory::Violence => {
                Severity::Crisis
            }
            SafetyCategory::Substance | SafetyCategory::Abuse => Severity::Sensitive,
        }
    }

    pub fn phrases(&self) -> &'static [&'static str] {
        match self {
            SafetyCategory::Suicide => SUICIDE_PHRASES,
            SafetyCategory::SelfHarm => SELF_HARM_PHRASES,
            SafetyCategory::Violence => VIOLENCE_PHRASES,
            SafetyCategory::Substance => SUBSTANCE_PHRASES,
            SafetyCategory::Abuse => ABUSE_PHRASES,
        }
    }

    /// The fixed pool a safety message is drawn from.
    pub fn messages(&self) -> &'static [&'static str] {
        match self {
            SafetyCategory::Suicide => SUICIDE_MESSAGES,
            SafetyCategory::SelfHarm => SELF_HARM_MESSAGES,
            SafetyCategory::Violence => VIOLENCE_MESSAGES,
            SafetyCategory::Substance => SUBSTANCE_MESSAGES,
            SafetyCategory::Abuse => ABUSE_MESSAGES,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SafetyCategory::Suicide => "suicide",
            SafetyCategory::SelfHarm => "self_harm",
            SafetyCategory::Violence => "violence",
            SafetyCategory::Substance => "substance",
            SafetyCategory::Abuse => "abuse",
        }
    }
}

impl fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub category: Option<SafetyCategory>,
    pub message: Option<String>,
}

impl SafetyVerdict {
    fn safe() -> Self {
        Self {
            safe: true,
            category: None,
            message: None,
        }
    }

    /// The safety message when unsafe, the candidate otherwise.
    pub fn override_reply(&self, candidate: String) -> String {
        match (&self.message, self.safe) {
            (Some(message), false) => message.clone(),
            _ => candidate,
        }
    }
}

/// Scans the normalized input for crisis and sensitive phrases.
pub fn check_safety<R>(input: &str, rng: &mut R) -> SafetyVerdict
where
    R: Rng + ?Sized,
{
    let text = normalize(input);
    if text.is_empty() {
        return SafetyVerdict::safe();
    }

    let matched = CHECK_ORDER
        .iter()
        .find(|category| category.phrases().iter().any(|p| text.contains(p)));

    match matched {
        Some(category) => {
            let message = random_choice(category.messages(), rng)
                .map(|m| m.to_string())
                .unwrap_or_default();
            SafetyVerdict {
                safe: false,
                category: Some(*category),
                message: Some(message),
            }
        }
        None => SafetyVerdict::safe(),
    }
}

/// Returns the safety message instead of `candidate` when the input is unsafe.
pub fn apply_safety_override<R>(input: &str, candidate: String, rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    check_safety(input, rng).override_reply(candidate)
}
