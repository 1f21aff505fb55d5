//! Text utilities shared by every stage of the engine.
//!
//! Pure functions only: normalization, tokenization, negation detection,
//! random selection and token-set similarity.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Single-token negations.
const NEGATION_TOKENS: &[&str] = &[
    "not", "never", "no", "cannot", "cant", "dont", "wont", "nothing", "nobody",
];

/// Contractions as they look after normalization splits the apostrophe out.
const NEGATION_CONTRACTIONS: &[&str] = &["don t", "can t", "won t", "isn t", "doesn t", "didn t"];

/// Lowercases, replaces everything outside `[a-z0-9\s]` with a space,
/// collapses whitespace and trims.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes then splits into words.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// True if the text contains a negation word or a negated contraction.
pub fn has_negation(text: &str) -> bool {
    let normalized = normalize(text);
    if normalized
        .split_whitespace()
        .any(|t| NEGATION_TOKENS.contains(&t))
    {
        return true;
    }

    let padded = format!(" {} ", normalized);
    NEGATION_CONTRACTIONS
        .iter()
        .any(|c| padded.contains(&format!(" {} ", c)))
}

/// Uniformly random element, `None` for an empty slice.
pub fn random_choice<'a, T, R>(items: &'a [T], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    items.choose(rng)
}

/// Shuffled copy of a slice.
pub fn shuffle<T: Clone, R>(items: &[T], rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let mut copy = items.to_vec();
    copy.shuffle(rng);
    copy
}

/// Jaccard similarity of the two token sets. Zero when both are empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a: HashSet<String> = tokenize(a).into_iter().collect();
    let set_b: HashSet<String> = tokenize(b).into_iter().collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f32 / union as f32
}

/// Sums the weight of every keyword present in `tokens`.
pub fn keyword_match_score<'a, I>(tokens: &[String], keywords: I) -> f32
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    keywords
        .into_iter()
        .filter(|(word, _)| tokens.iter().any(|t| t == word))
        .map(|(_, weight)| weight)
        .sum()
}
