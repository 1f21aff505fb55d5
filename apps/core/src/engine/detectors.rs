//! Pattern detectors.
//!
//! Each detector looks at the input, the conversation so far and the
//! baseline keyword scores, and either fires with a confidence or stays
//! quiet. The runner computes the baseline scores, runs every detector in
//! registration order and fails open: a detector error is logged and
//! counted as a non-hit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::category::{Category, DetectorId};
use super::data::KeywordWeight;
use super::state::ConversationState;
use super::text::{has_negation, keyword_match_score, normalize, tokenize};
use crate::error::DetectorError;

/// A detector firing on the current input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorHit {
    pub id: DetectorId,
    pub confidence: f32,
}

/// What one turn's input looks like to the rest of the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    /// Baseline keyword score per category; zero-score categories are absent.
    pub category_scores: BTreeMap<Category, f32>,
    /// Hits in the order the detectors fired.
    pub hits: Vec<DetectorHit>,
    pub negation: bool,
    /// Detectors that failed this turn.
    #[serde(skip)]
    pub failures: Vec<DetectorError>,
}

impl Analysis {
    pub fn score(&self, category: Category) -> f32 {
        self.category_scores.get(&category).copied().unwrap_or(0.0)
    }

    /// Categories scoring at least `threshold`.
    pub fn categories_at_least(&self, threshold: f32) -> Vec<Category> {
        self.category_scores
            .iter()
            .filter(|(_, score)| **score >= threshold)
            .map(|(category, _)| *category)
            .collect()
    }

    /// Hits sorted by confidence, strongest first.
    pub fn hits_by_confidence(&self) -> Vec<DetectorHit> {
        let mut sorted = self.hits.clone();
        sorted.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }
}

/// Everything a detector may look at.
pub struct DetectionContext<'a> {
    pub input: &'a str,
    pub normalized: String,
    pub tokens: Vec<String>,
    pub state: &'a ConversationState,
    pub category_scores: &'a BTreeMap<Category, f32>,
}

impl DetectionContext<'_> {
    fn score(&self, category: Category) -> f32 {
        self.category_scores.get(&category).copied().unwrap_or(0.0)
    }

    fn contains_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.normalized.contains(p))
    }

    fn count_tokens(&self, words: &[&str]) -> usize {
        self.tokens
            .iter()
            .filter(|t| words.contains(&t.as_str()))
            .count()
    }
}

/// A named heuristic. `Ok(None)` means the detector did not fire.
pub trait Detector: Send + Sync {
    fn id(&self) -> DetectorId;

    fn description(&self) -> &'static str;

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError>;
}

/// Detector that fires with a fixed confidence when any phrase appears.
struct PhraseDetector {
    id: DetectorId,
    description: &'static str,
    phrases: &'static [&'static str],
    confidence: f32,
}

impl Detector for PhraseDetector {
    fn id(&self) -> DetectorId {
        self.id
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError> {
        Ok(ctx.contains_any(self.phrases).then_some(self.confidence))
    }
}

struct BurnoutDetector;

impl Detector for BurnoutDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Burnout
    }

    fn description(&self) -> &'static str {
        "Detects exhaustion, drained energy, and work fatigue"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError> {
        let mut score = 2.0 * ctx.count_tokens(&["burnout", "burned", "burnt", "drained", "exhausted", "fried"]) as f32;
        score += ctx.count_tokens(&["tired", "fatigue"]) as f32;
        if ctx.score(Category::Stress) > 2.0 {
            score += 1.0;
        }
        Ok((score > 0.0).then(|| (score / 5.0).min(1.0)))
    }
}

struct DepressionDetector;

impl Detector for DepressionDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Depression
    }

    fn description(&self) -> &'static str {
        "Detects depressed mood or hopelessness"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError> {
        let mut score = 2.0 * ctx.count_tokens(&["hopeless", "worthless", "empty", "numb"]) as f32;
        if ctx.score(Category::Sadness) > 2.0 {
            score += 2.0;
        }
        if ctx.score(Category::Loneliness) > 1.0 {
            score += 1.0;
        }
        Ok((score > 0.0).then(|| (score / 6.0).min(1.0)))
    }
}

struct SocialAnxietyDetector;

impl Detector for SocialAnxietyDetector {
    fn id(&self) -> DetectorId {
        DetectorId::SocialAnxiety
    }

    fn description(&self) -> &'static str {
        "Detects fear of social interactions"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError> {
        if ctx.contains_any(&["social anxiety"]) {
            return Ok(Some(0.7));
        }
        if ctx.contains_any(&["afraid of people", "panic in public"]) {
            return Ok(Some(0.6));
        }
        Ok(None)
    }
}

/// Sleep trouble named directly, or brought up again and again lately.
struct InsomniaDetector {
    window: usize,
}

impl Detector for InsomniaDetector {
    fn id(&self) -> DetectorId {
        DetectorId::InsomniaRisk
    }

    fn description(&self) -> &'static str {
        "Detects repeated poor sleep or insomnia mentions"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Option<f32>, DetectorError> {
        if ctx.contains_any(&["cant sleep", "can t sleep", "cannot sleep", "insomnia"]) {
            return Ok(Some(0.7));
        }

        let sleep_mentions = ctx
            .state
            .history_window(self.window)
            .iter()
            .map(|exchange| normalize(&exchange.user))
            .filter(|text| text.contains("sleep") || text.contains("tired"))
            .count();

        Ok((sleep_mentions >= 3).then_some(0.6))
    }
}

/// Detectors in registration order.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::standard(5)
    }
}

impl DetectorRegistry {
    /// The built-in detectors in their fixed registration order.
    ///
    /// `history_window` is how many past turns the insomnia detector looks back over.
    pub fn standard(history_window: usize) -> Self {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(BurnoutDetector),
            Box::new(DepressionDetector),
            Box::new(PhraseDetector {
                id: DetectorId::ImposterSyndrome,
                description: "Detects imposter syndrome self-doubt phrases",
                phrases: &["imposter", "impostor", "fraud", "phony", "not good enough", "fooling everyone"],
                confidence: 0.7,
            }),
            Box::new(PhraseDetector {
                id: DetectorId::ProcrastinationCycle,
                description: "Detects procrastination and avoidance loops",
                phrases: &["keep delaying", "procrastinat", "can t start", "cant start", "always put off"],
                confidence: 0.6,
            }),
            Box::new(PhraseDetector {
                id: DetectorId::SubstanceConcern,
                description: "Detects substance overuse and dependency mentions",
                phrases: &["drinking too much", "alcohol problem", "weed addiction", "cocaine", "heroin", "drug problem"],
                confidence: 0.8,
            }),
            Box::new(SocialAnxietyDetector),
            Box::new(InsomniaDetector {
                window: history_window,
            }),
            Box::new(PhraseDetector {
                id: DetectorId::RelationshipAbuseSignal,
                description: "Detects unhealthy or abusive relationship signals",
                phrases: &["my partner yells at me", "controlling", "abusive relationship", "gaslighting"],
                confidence: 0.8,
            }),
            Box::new(PhraseDetector {
                id: DetectorId::FinancialStress,
                description: "Detects money stress and financial pressure",
                phrases: &["bills", "debt", "rent", "money problems", "broke"],
                confidence: 0.6,
            }),
        ];

        Self { detectors }
    }

    /// A registry with an arbitrary detector list, in the given order.
    pub fn with_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// Detector ids in registration order.
    pub fn ids(&self) -> Vec<DetectorId> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    /// Sums keyword weights per category for the tokens present in `input`.
    pub fn baseline_scores(
        input: &str,
        keywords: &HashMap<Category, Vec<KeywordWeight>>,
    ) -> BTreeMap<Category, f32> {
        let tokens = tokenize(input);
        keywords
            .iter()
            .filter_map(|(category, words)| {
                let score = keyword_match_score(
                    &tokens,
                    words.iter().map(|k| (k.word.as_str(), k.weight)),
                );
                (score > 0.0).then_some((*category, score))
            })
            .collect()
    }

    /// Scores the input and runs every detector.
    pub fn run(
        &self,
        input: &str,
        state: &ConversationState,
        keywords: &HashMap<Category, Vec<KeywordWeight>>,
    ) -> Analysis {
        let category_scores = Self::baseline_scores(input, keywords);
        let negation = has_negation(input);
        let ctx = DetectionContext {
            input,
            normalized: normalize(input),
            tokens: tokenize(input),
            state,
            category_scores: &category_scores,
        };

        let mut hits = Vec::new();
        let mut failures = Vec::new();

        for detector in &self.detectors {
            let outcome = detector.detect(&ctx).and_then(|confidence| match confidence {
                Some(c) if !(0.0..=1.0).contains(&c) => Err(DetectorError::InvalidConfidence {
                    detector: detector.id().label().to_string(),
                    value: c,
                }),
                other => Ok(other),
            });

            match outcome {
                Ok(Some(confidence)) => {
                    debug!("Detector {} fired ({:.2})", detector.id(), confidence);
                    hits.push(DetectorHit {
                        id: detector.id(),
                        confidence,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("{} ({})", err, detector.description());
                    failures.push(err);
                }
            }
        }

        Analysis {
            category_scores,
            hits,
            negation,
            failures,
        }
    }
}
