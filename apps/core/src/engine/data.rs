//! Static conversation data: keyword weights, response pools, flows, techniques.
//!
//! The JSON is deserialized into raw structs, then validated into
//! [`ConversationData`]. Every cross reference (detector -> flow, step ->
//! step, flow -> technique) is checked once here so the rest of the engine
//! can rely on lookups succeeding.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::info;

use super::category::{Category, DetectorId, FlowId};
use crate::error::{DataError, EngineError};

/// Key of the step every flow starts at.
pub const INITIAL_STEP: &str = "step1";

const EMBEDDED_DATA: &str = include_str!("../../data/conversation_logic.json");

const DEFAULT_EVIDENCE_PREFACE: &str = "I can share brief, evidence-based techniques that many people find helpful. Would you like to try one?";

/// One weighted keyword of a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordWeight {
    pub word: String,
    pub weight: f32,
}

/// A short, self-guided technique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technique {
    pub title: String,
    pub desc: String,
    pub steps: Vec<String>,
    pub duration_minutes: u32,
}

/// A selectable option on a branching step and the step it leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub target: String,
}

/// How a step moves on once the user answers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Answering this step completes the flow.
    Terminal,
    /// Always moves to `next`.
    Linear { next: String },
    /// First choice whose label appears in the answer wins, otherwise `fallback`.
    Branching {
        choices: Vec<Choice>,
        fallback: Option<String>,
    },
}

/// One step of a guided flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub text: Option<String>,
    pub transition: Transition,
}

impl Step {
    /// Option labels in display order; empty unless the step branches.
    pub fn options(&self) -> Vec<&str> {
        match &self.transition {
            Transition::Branching { choices, .. } => {
                choices.iter().map(|c| c.label.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A validated guided flow.
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowId,
    pub completion_text: Option<String>,
    /// Technique id offered when the user accepts this flow outright.
    pub technique: Option<String>,
    steps: HashMap<String, Step>,
}

impl Flow {
    pub fn step(&self, key: &str) -> Option<&Step> {
        self.steps.get(key)
    }

    pub fn initial_step(&self) -> Option<&Step> {
        self.step(INITIAL_STEP)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[derive(Debug, Deserialize)]
struct ResponsePools {
    openers: Vec<String>,
    closers: Vec<String>,
    general_negative: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IntroductionPhrases {
    evidence_preface: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    text: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    branches: Vec<String>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFlow {
    completion_text: Option<String>,
    technique: Option<String>,
    steps: HashMap<String, RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawConversationData {
    keywords: HashMap<Category, Vec<KeywordWeight>>,
    #[serde(default)]
    response_fragments: HashMap<Category, Vec<String>>,
    responses: ResponsePools,
    introduction_phrases: Option<IntroductionPhrases>,
    intervention_flows: HashMap<FlowId, RawFlow>,
    detector_to_flow: HashMap<DetectorId, FlowId>,
    techniques_short: BTreeMap<String, Technique>,
}

/// Immutable, validated conversation data shared by every turn.
#[derive(Debug, Clone)]
pub struct ConversationData {
    keywords: HashMap<Category, Vec<KeywordWeight>>,
    fragments: HashMap<Category, Vec<String>>,
    openers: Vec<String>,
    closers: Vec<String>,
    general_negative: Vec<String>,
    evidence_preface: String,
    flows: HashMap<FlowId, Flow>,
    detector_to_flow: HashMap<DetectorId, FlowId>,
    techniques: BTreeMap<String, Technique>,
}

impl ConversationData {
    /// Loads the data set compiled into the crate.
    pub fn embedded() -> Result<Self, EngineError> {
        Self::from_json_str(EMBEDDED_DATA)
    }

    /// Loads and validates a data file from disk.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path)?;
        let data = Self::from_json_str(&raw)?;
        info!("Loaded conversation data from {:?}", path);
        Ok(data)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let raw: RawConversationData = serde_json::from_str(json)?;
        let data = Self::validate(raw)?;
        info!(
            "Conversation data ready: {} categories, {} flows, {} techniques",
            data.keywords.len(),
            data.flows.len(),
            data.techniques.len()
        );
        Ok(data)
    }

    fn validate(raw: RawConversationData) -> Result<Self, DataError> {
        non_empty("openers", &raw.responses.openers)?;
        non_empty("closers", &raw.responses.closers)?;
        non_empty("general_negative", &raw.responses.general_negative)?;
        for (category, pool) in &raw.response_fragments {
            non_empty(category.label(), pool)?;
        }

        let mut flows = HashMap::with_capacity(raw.intervention_flows.len());
        for (flow_id, raw_flow) in raw.intervention_flows {
            let flow = build_flow(flow_id, raw_flow, &raw.techniques_short)?;
            flows.insert(flow_id, flow);
        }

        for (detector, flow) in &raw.detector_to_flow {
            if !flows.contains_key(flow) {
                return Err(DataError::UnknownFlow {
                    detector: detector.label().to_string(),
                    flow: flow.label().to_string(),
                });
            }
        }

        let evidence_preface = raw
            .introduction_phrases
            .and_then(|p| p.evidence_preface)
            .unwrap_or_else(|| DEFAULT_EVIDENCE_PREFACE.to_string());

        Ok(Self {
            keywords: raw.keywords,
            fragments: raw.response_fragments,
            openers: raw.responses.openers,
            closers: raw.responses.closers,
            general_negative: raw.responses.general_negative,
            evidence_preface,
            flows,
            detector_to_flow: raw.detector_to_flow,
            techniques: raw.techniques_short,
        })
    }

    pub fn keywords(&self) -> &HashMap<Category, Vec<KeywordWeight>> {
        &self.keywords
    }

    /// Validation fragments for a category, if the category has a pool.
    pub fn fragments(&self, category: Category) -> Option<&[String]> {
        self.fragments
            .get(&category)
            .map(Vec::as_slice)
            .filter(|pool| !pool.is_empty())
    }

    pub fn openers(&self) -> &[String] {
        &self.openers
    }

    pub fn closers(&self) -> &[String] {
        &self.closers
    }

    pub fn general_negative(&self) -> &[String] {
        &self.general_negative
    }

    pub fn evidence_preface(&self) -> &str {
        &self.evidence_preface
    }

    pub fn flow(&self, id: FlowId) -> Option<&Flow> {
        self.flows.get(&id)
    }

    pub fn flow_for_detector(&self, detector: DetectorId) -> Option<FlowId> {
        self.detector_to_flow.get(&detector).copied()
    }

    pub fn technique(&self, id: &str) -> Option<&Technique> {
        self.techniques.get(id)
    }

    /// Techniques ordered by id.
    pub fn techniques(&self) -> impl Iterator<Item = (&str, &Technique)> {
        self.techniques.iter().map(|(id, t)| (id.as_str(), t))
    }
}

fn non_empty(name: &str, pool: &[String]) -> Result<(), DataError> {
    if pool.is_empty() {
        return Err(DataError::EmptyPool(name.to_string()));
    }
    Ok(())
}

fn build_flow(
    id: FlowId,
    raw: RawFlow,
    techniques: &BTreeMap<String, Technique>,
) -> Result<Flow, DataError> {
    let flow_label = id.label().to_string();

    if !raw.steps.contains_key(INITIAL_STEP) {
        return Err(DataError::MissingInitialStep { flow: flow_label });
    }

    if let Some(technique) = &raw.technique {
        if !techniques.contains_key(technique) {
            return Err(DataError::UnknownTechnique {
                flow: flow_label,
                technique: technique.clone(),
            });
        }
    }

    let check_target = |step: &str, target: &str| -> Result<(), DataError> {
        if raw.steps.contains_key(target) {
            Ok(())
        } else {
            Err(DataError::DanglingStep {
                flow: flow_label.clone(),
                step: step.to_string(),
                target: target.to_string(),
            })
        }
    };

    let mut steps = HashMap::with_capacity(raw.steps.len());
    for (key, raw_step) in &raw.steps {
        if raw_step.options.len() != raw_step.branches.len() {
            return Err(DataError::BranchMismatch {
                flow: flow_label.clone(),
                step: key.clone(),
                options: raw_step.options.len(),
                branches: raw_step.branches.len(),
            });
        }

        for target in raw_step.branches.iter().chain(raw_step.next.iter()) {
            check_target(key, target)?;
        }

        let transition = if !raw_step.options.is_empty() {
            Transition::Branching {
                choices: raw_step
                    .options
                    .iter()
                    .zip(&raw_step.branches)
                    .map(|(label, target)| Choice {
                        label: label.clone(),
                        target: target.clone(),
                    })
                    .collect(),
                fallback: raw_step.next.clone(),
            }
        } else if let Some(next) = &raw_step.next {
            Transition::Linear { next: next.clone() }
        } else {
            Transition::Terminal
        };

        steps.insert(
            key.clone(),
            Step {
                text: raw_step.text.clone(),
                transition,
            },
        );
    }

    Ok(Flow {
        id,
        completion_text: raw.completion_text,
        technique: raw.technique,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(flows: &str, detector_map: &str) -> String {
        format!(
            r#"{{
                "keywords": {{ "stress": [{{ "word": "stressed", "weight": 2 }}] }},
                "responses": {{ "openers": ["Hi."], "closers": ["Bye."], "general_negative": ["Okay."] }},
                "intervention_flows": {flows},
                "detector_to_flow": {detector_map},
                "techniques_short": {{
                    "box_breathing": {{ "title": "Box Breathing", "desc": "d", "steps": ["a"], "duration_minutes": 1 }}
                }}
            }}"#
        )
    }

    #[test]
    fn test_embedded_data_loads() {
        let data = ConversationData::embedded().expect("embedded data must validate");

        assert!(!data.openers().is_empty());
        assert!(data.technique("box_breathing").is_some());
        assert_eq!(
            data.flow_for_detector(DetectorId::Burnout),
            Some(FlowId::BoxBreathing)
        );
        assert!(data.flow_for_detector(DetectorId::SubstanceConcern).is_none());

        let flow = data.flow(FlowId::BoxBreathing).unwrap();
        let step1 = flow.initial_step().unwrap();
        assert_eq!(step1.options(), vec!["Guide me", "Just the steps", "Skip it"]);
    }

    #[test]
    fn test_transitions_are_resolved() {
        let json = minimal_json(
            r#"{ "grounding": { "steps": {
                "step1": { "text": "one", "options": ["A", "B"], "branches": ["step2", "step3"], "next": "step2" },
                "step2": { "text": "two", "next": "step3" },
                "step3": { "text": "three" }
            } } }"#,
            r#"{ "social_anxiety": "grounding" }"#,
        );
        let data = ConversationData::from_json_str(&json).unwrap();
        let flow = data.flow(FlowId::Grounding).unwrap();

        assert!(matches!(
            flow.step("step1").unwrap().transition,
            Transition::Branching { ref fallback, .. } if fallback.as_deref() == Some("step2")
        ));
        assert_eq!(
            flow.step("step2").unwrap().transition,
            Transition::Linear { next: "step3".to_string() }
        );
        assert_eq!(flow.step("step3").unwrap().transition, Transition::Terminal);
        assert_eq!(flow.step_count(), 3);
    }

    #[test]
    fn test_unknown_flow_in_detector_map_is_rejected() {
        let json = minimal_json(
            r#"{ "grounding": { "steps": { "step1": { "text": "x" } } } }"#,
            r#"{ "burnout": "box_breathing" }"#,
        );
        let err = ConversationData::from_json_str(&json).unwrap_err();
        assert!(matches!(err, EngineError::Data(DataError::UnknownFlow { .. })));
    }

    #[test]
    fn test_missing_step1_is_rejected() {
        let json = minimal_json(
            r#"{ "grounding": { "steps": { "intro": { "text": "x" } } } }"#,
            "{}",
        );
        let err = ConversationData::from_json_str(&json).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Data(DataError::MissingInitialStep { .. })
        ));
    }

    #[test]
    fn test_dangling_branch_is_rejected() {
        let json = minimal_json(
            r#"{ "grounding": { "steps": {
                "step1": { "options": ["A"], "branches": ["nowhere"] }
            } } }"#,
            "{}",
        );
        let err = ConversationData::from_json_str(&json).unwrap_err();
        assert!(matches!(err, EngineError::Data(DataError::DanglingStep { .. })));
    }

    #[test]
    fn test_option_branch_mismatch_is_rejected() {
        let json = minimal_json(
            r#"{ "grounding": { "steps": {
                "step1": { "options": ["A", "B"], "branches": ["step1"] }
            } } }"#,
            "{}",
        );
        let err = ConversationData::from_json_str(&json).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Data(DataError::BranchMismatch { options: 2, branches: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_technique_is_rejected() {
        let json = minimal_json(
            r#"{ "grounding": { "technique": "juggling", "steps": { "step1": { "text": "x" } } } }"#,
            "{}",
        );
        let err = ConversationData::from_json_str(&json).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Data(DataError::UnknownTechnique { .. })
        ));
    }

    #[test]
    fn test_unknown_category_key_fails_to_parse() {
        let json = minimal_json("{}", "{}").replace("\"stress\"", "\"jealousy\"");
        let err = ConversationData::from_json_str(&json).unwrap_err();
        assert!(matches!(err, EngineError::Json(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, minimal_json("{}", "{}")).unwrap();

        let data = ConversationData::from_path(&path).unwrap();
        assert_eq!(data.general_negative(), &["Okay.".to_string()]);
        assert_eq!(data.evidence_preface(), DEFAULT_EVIDENCE_PREFACE);

        let missing = ConversationData::from_path(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(EngineError::Io(_))));
    }
}
