//! Technique scripts: lookup by id or title, and plain-text formatting.

use serde::{Deserialize, Serialize};

use super::data::{ConversationData, Technique};

/// Used when the data set has no box breathing entry of its own.
pub const FALLBACK_BOX_BREATHING: &str = "Technique: Box Breathing\n\
A simple paced-breathing pattern that helps calm the nervous system.\n\
\n\
Steps:\n\
1. Breathe in for 4 counts.\n\
2. Hold for 4 counts.\n\
3. Breathe out for 4 counts.\n\
4. Hold for 4 counts.\n\
\n\
(Duration: ~2 minutes)";

pub const BOX_BREATHING_ID: &str = "box_breathing";

/// Short listing entry for hosts that show a technique menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueSummary {
    pub id: String,
    pub title: String,
    pub duration_minutes: u32,
}

/// Renders a technique as a numbered, plain-text script.
pub fn format_technique(technique: &Technique) -> String {
    let steps: String = technique
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}\n", i + 1, step))
        .collect();

    let unit = if technique.duration_minutes == 1 {
        "minute"
    } else {
        "minutes"
    };

    format!(
        "Technique: {}\n{}\n\nSteps:\n{}\n(Duration: ~{} {})",
        technique.title, technique.desc, steps, technique.duration_minutes, unit
    )
}

/// Finds a technique by exact id, then by case-insensitive title fragment.
pub fn find_technique<'a>(
    data: &'a ConversationData,
    id_or_name: &str,
) -> Option<(&'a str, &'a Technique)> {
    let query = id_or_name.trim();
    if query.is_empty() {
        return None;
    }

    let needle = query.to_lowercase();
    data.techniques()
        .find(|(id, _)| *id == query)
        .or_else(|| {
            data.techniques()
                .find(|(_, t)| t.title.to_lowercase().contains(&needle))
        })
}

/// The formatted script for `id_or_name`, if any technique matches.
pub fn produce_technique_script(data: &ConversationData, id_or_name: &str) -> Option<String> {
    find_technique(data, id_or_name).map(|(_, technique)| format_technique(technique))
}

/// Box breathing from the data set, or the built-in script.
pub fn box_breathing_script(data: &ConversationData) -> String {
    produce_technique_script(data, BOX_BREATHING_ID)
        .unwrap_or_else(|| FALLBACK_BOX_BREATHING.to_string())
}

pub fn list_techniques(data: &ConversationData) -> Vec<TechniqueSummary> {
    data.techniques()
        .map(|(id, t)| TechniqueSummary {
            id: id.to_string(),
            title: t.title.clone(),
            duration_minutes: t.duration_minutes,
        })
        .collect()
}
