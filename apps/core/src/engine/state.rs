//! Conversation state: the single mutable value a session owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::category::{Category, FactKind, FlowId};

/// One user message and the reply it received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub ai: String,
    pub at: DateTime<Utc>,
}

/// Everything remembered about one theme.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Raw inputs that mentioned the theme, oldest first.
    pub mentions: Vec<String>,
    pub last_turn: u64,
}

/// Short-term memory: recurring themes plus a few personal facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    pub themes: HashMap<Category, MemoryItem>,
    pub facts: BTreeMap<FactKind, String>,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.themes.len() + usize::from(!self.facts.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty() && self.facts.is_empty()
    }
}

/// The flow in progress and the step the user is answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFlow {
    pub flow_id: FlowId,
    pub step_key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub count: u32,
    pub last_offered_turn: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub count: u32,
    pub last_completed_turn: u64,
}

/// Bookkeeping about offers, completions and off-script answers per flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterventionMeta {
    pub offers: HashMap<FlowId, OfferRecord>,
    pub completions: HashMap<FlowId, CompletionRecord>,
    /// flow -> step key -> answers that matched none of the step's options
    pub clarify_counts: HashMap<FlowId, HashMap<String, u32>>,
}

/// Serializable summary of the engine internals, for debugging hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub session_id: Uuid,
    pub turn: u64,
    pub history_length: usize,
    pub active_flow: Option<ActiveFlow>,
    pub memory_size: usize,
    pub offers: HashMap<FlowId, OfferRecord>,
    pub completions: HashMap<FlowId, CompletionRecord>,
}

/// State of one conversation. Created at conversation start and mutated in place every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: Uuid,
    pub history: Vec<Exchange>,
    pub memory: Memory,
    pub turn: u64,
    pub active_flow: Option<ActiveFlow>,
    pub intervention_meta: InterventionMeta,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            history: Vec::new(),
            memory: Memory::default(),
            turn: 0,
            active_flow: None,
            intervention_meta: InterventionMeta::default(),
        }
    }

    pub fn add_history(&mut self, user: impl Into<String>, ai: impl Into<String>) {
        self.history.push(Exchange {
            user: user.into(),
            ai: ai.into(),
            at: Utc::now(),
        });
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.history.last().map(|e| e.user.as_str())
    }

    pub fn last_ai_message(&self) -> Option<&str> {
        self.history.last().map(|e| e.ai.as_str())
    }

    /// The last `n` exchanges, oldest first.
    pub fn history_window(&self, n: usize) -> &[Exchange] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn set_flow(&mut self, flow_id: FlowId, step_key: impl Into<String>) {
        self.active_flow = Some(ActiveFlow {
            flow_id,
            step_key: step_key.into(),
        });
    }

    pub fn reset_flow(&mut self) {
        self.active_flow = None;
    }

    pub fn clear_memory(&mut self) {
        self.memory = Memory::default();
    }

    pub fn debug_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            session_id: self.session_id,
            turn: self.turn,
            history_length: self.history.len(),
            active_flow: self.active_flow.clone(),
            memory_size: self.memory.len(),
            offers: self.intervention_meta.offers.clone(),
            completions: self.intervention_meta.completions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = ConversationState::new();
        assert_eq!(state.turn, 0);
        assert!(state.history.is_empty());
        assert!(state.active_flow.is_none());
        assert!(state.memory.is_empty());
        assert!(state.last_user_message().is_none());
    }

    #[test]
    fn test_history_window() {
        let mut state = ConversationState::new();
        for i in 0..7 {
            state.add_history(format!("user {}", i), format!("ai {}", i));
        }

        let window = state.history_window(5);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].user, "user 2");
        assert_eq!(state.last_user_message(), Some("user 6"));
        assert_eq!(state.last_ai_message(), Some("ai 6"));
        assert_eq!(state.history_window(50).len(), 7);
    }

    #[test]
    fn test_flow_pointers_move_together() {
        let mut state = ConversationState::new();
        state.set_flow(FlowId::Grounding, "step1");
        let active = state.active_flow.clone().unwrap();
        assert_eq!(active.flow_id, FlowId::Grounding);
        assert_eq!(active.step_key, "step1");

        state.reset_flow();
        assert!(state.active_flow.is_none());
    }

    #[test]
    fn test_debug_snapshot() {
        let mut state = ConversationState::new();
        state.turn = 3;
        state.add_history("hi", "hello");
        state.memory.facts.insert(FactKind::Name, "sam".to_string());
        state
            .intervention_meta
            .offers
            .insert(FlowId::BoxBreathing, OfferRecord { count: 1, last_offered_turn: 2 });

        let snapshot = state.debug_snapshot();
        assert_eq!(snapshot.turn, 3);
        assert_eq!(snapshot.history_length, 1);
        assert_eq!(snapshot.memory_size, 1);
        assert_eq!(snapshot.offers[&FlowId::BoxBreathing].count, 1);
        assert!(serde_json::to_string(&snapshot).is_ok());
    }
}
