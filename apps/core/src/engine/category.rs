//! Closed sets of identifiers used across the engine.
//!
//! Everything the static data is keyed by lives here as an enum, so an
//! unknown key in the JSON fails at load time instead of silently producing
//! an empty lookup mid-conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Emotional or behavioral category scored from keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Stress,
    Anxiety,
    Sadness,
    Loneliness,
    Anger,
    Burnout,
    Sleep,
    SelfEsteem,
    Relationships,
    Money,
    Motivation,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Stress,
        Category::Anxiety,
        Category::Sadness,
        Category::Loneliness,
        Category::Anger,
        Category::Burnout,
        Category::Sleep,
        Category::SelfEsteem,
        Category::Relationships,
        Category::Money,
        Category::Motivation,
    ];

    /// Returns the data key for the category
    pub fn label(&self) -> &'static str {
        match self {
            Category::Stress => "stress",
            Category::Anxiety => "anxiety",
            Category::Sadness => "sadness",
            Category::Loneliness => "loneliness",
            Category::Anger => "anger",
            Category::Burnout => "burnout",
            Category::Sleep => "sleep",
            Category::SelfEsteem => "self_esteem",
            Category::Relationships => "relationships",
            Category::Money => "money",
            Category::Motivation => "motivation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Pattern detector identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    Burnout,
    Depression,
    ImposterSyndrome,
    ProcrastinationCycle,
    SubstanceConcern,
    SocialAnxiety,
    InsomniaRisk,
    RelationshipAbuseSignal,
    FinancialStress,
}

impl DetectorId {
    pub fn label(&self) -> &'static str {
        match self {
            DetectorId::Burnout => "burnout",
            DetectorId::Depression => "depression",
            DetectorId::ImposterSyndrome => "imposter_syndrome",
            DetectorId::ProcrastinationCycle => "procrastination_cycle",
            DetectorId::SubstanceConcern => "substance_concern",
            DetectorId::SocialAnxiety => "social_anxiety",
            DetectorId::InsomniaRisk => "insomnia_risk",
            DetectorId::RelationshipAbuseSignal => "relationship_abuse_signal",
            DetectorId::FinancialStress => "financial_stress",
        }
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Guided intervention flow identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowId {
    BoxBreathing,
    Grounding,
    CognitiveReframe,
    BehavioralActivation,
    SleepWindDown,
}

impl FlowId {
    pub fn label(&self) -> &'static str {
        match self {
            FlowId::BoxBreathing => "box_breathing",
            FlowId::Grounding => "grounding",
            FlowId::CognitiveReframe => "cognitive_reframe",
            FlowId::BehavioralActivation => "behavioral_activation",
            FlowId::SleepWindDown => "sleep_wind_down",
        }
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Personal facts the memory store can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Name,
    Job,
    Location,
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FactKind::Name => "name",
            FactKind::Job => "job",
            FactKind::Location => "location",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_match_serde_keys() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.label()));
        }
        let json = serde_json::to_string(&DetectorId::RelationshipAbuseSignal).unwrap();
        assert_eq!(json, "\"relationship_abuse_signal\"");
        let json = serde_json::to_string(&FlowId::SleepWindDown).unwrap();
        assert_eq!(json, "\"sleep_wind_down\"");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let parsed: Result<Category, _> = serde_json::from_str("\"jealousy\"");
        assert!(parsed.is_err());
    }
}
