//! Conversation store (spec C11).
//!
//! An append-only log of turns, bounded in memory at the last `max_turns`
//! (oldest evicted first), with an atomic file-backed persist/load and a
//! contextual-prompt builder the NL router (C8) uses to seed a conversation
//! completion with recent history. Atomicity follows the same
//! write-temp/fsync/rename shape `logger.rs` uses for its ring buffer, just
//! applied to a structured turn log instead of plain lines.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("io error at {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub ts_unix: u64,
    pub user_input: String,
    pub intent_summary: Option<String>,
    pub response: String,
    pub outcome: Outcome,
    pub actions: Vec<String>,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedLog {
    turns: Vec<ConversationTurn>,
}

pub struct ConversationStore {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
    persist_path: Option<PathBuf>,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self { turns: VecDeque::with_capacity(max_turns.min(256)), max_turns, persist_path: None }
    }

    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    /// Appends a new turn in [`Outcome::Pending`] state and returns its id;
    /// callers fill in the final response via [`Self::update_outcome`] once
    /// the turn completes.
    pub fn add_turn(&mut self, user_input: impl Into<String>, intent_summary: Option<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.turns.push_back(ConversationTurn {
            id: id.clone(),
            ts_unix: now_unix(),
            user_input: user_input.into(),
            intent_summary,
            response: String::new(),
            outcome: Outcome::Pending,
            actions: Vec::new(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
        id
    }

    pub fn update_outcome(&mut self, id: &str, outcome: Outcome, response: impl Into<String>) {
        if let Some(turn) = self.turns.iter_mut().find(|t| t.id == id) {
            turn.outcome = outcome;
            turn.response = response.into();
        }
    }

    pub fn record_action(&mut self, id: &str, action: impl Into<String>) {
        if let Some(turn) = self.turns.iter_mut().find(|t| t.id == id) {
            turn.actions.push(action.into());
        }
    }

    pub fn recent(&self, n: usize) -> Vec<&ConversationTurn> {
        let len = self.turns.len();
        self.turns.iter().skip(len.saturating_sub(n)).collect()
    }

    /// Concatenates a system instruction, recent turns, and the current
    /// intent summary under a rough token budget (approximated as
    /// `chars / 4`, a common rule of thumb absent a real tokenizer). Oldest
    /// included turns are dropped first when the budget is tight.
    pub fn generate_contextual_prompt(&self, user_input: &str, intent_summary: &str, token_budget: usize) -> String {
        let budget_chars = token_budget.saturating_mul(4);
        let header = "You are an interactive coding assistant. Use the conversation history below for context.\n";

        let mut history_lines: Vec<String> = self
            .turns
            .iter()
            .rev()
            .map(|t| format!("user: {}\nassistant: {}", t.user_input, t.response))
            .collect();
        history_lines.reverse();

        let mut body = String::new();
        for line in history_lines.iter().rev() {
            let candidate_len = header.len() + body.len() + line.len() + user_input.len() + intent_summary.len();
            if candidate_len > budget_chars {
                break;
            }
            body = format!("{line}\n{body}");
        }

        format!("{header}{body}intent: {intent_summary}\nuser: {user_input}")
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Atomic persist: write to a sibling temp file, fsync, then rename over
    /// the destination — a crash mid-write never leaves a truncated log.
    pub fn persist(&self) -> Result<(), ConversationError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConversationError::Io { path: parent.display().to_string(), source: e })?;
            }
        }

        let log = PersistedLog { turns: self.turns.iter().cloned().collect() };
        let json = serde_json::to_string_pretty(&log)?;

        let tmp_path = path.with_extension("tmp");
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp_path).map_err(|e| ConversationError::Io { path: tmp_path.display().to_string(), source: e })?;
            file.write_all(json.as_bytes()).map_err(|e| ConversationError::Io { path: tmp_path.display().to_string(), source: e })?;
            file.sync_all().map_err(|e| ConversationError::Io { path: tmp_path.display().to_string(), source: e })?;
        }
        std::fs::rename(&tmp_path, path).map_err(|e| ConversationError::Io { path: path.display().to_string(), source: e })?;
        Ok(())
    }

    pub fn load(path: impl Into<PathBuf>, max_turns: usize) -> Result<Self, ConversationError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::new(max_turns).with_persist_path(path));
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| ConversationError::Io { path: path.display().to_string(), source: e })?;
        let log: PersistedLog = serde_json::from_str(&contents)?;
        let mut turns: VecDeque<ConversationTurn> = log.turns.into_iter().collect();
        while turns.len() > max_turns {
            turns.pop_front();
        }
        Ok(Self { turns, max_turns, persist_path: Some(path) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_turn_starts_pending_and_update_outcome_finalizes_it() {
        let mut store = ConversationStore::new(200);
        let id = store.add_turn("hello", None);
        store.update_outcome(&id, Outcome::Success, "hi there");
        let turn = store.recent(1)[0];
        assert_eq!(turn.outcome, Outcome::Success);
        assert_eq!(turn.response, "hi there");
    }

    #[test]
    fn eviction_keeps_only_the_most_recent_max_turns() {
        let mut store = ConversationStore::new(3);
        for i in 0..5 {
            store.add_turn(format!("turn {i}"), None);
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.recent(3)[0].user_input, "turn 2");
    }

    #[test]
    fn persist_then_load_round_trips_turns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("conversation.json");

        let mut store = ConversationStore::new(200).with_persist_path(&path);
        let id = store.add_turn("do the thing", Some("task_request".to_string()));
        store.update_outcome(&id, Outcome::Success, "done");
        store.persist().unwrap();

        let loaded = ConversationStore::load(&path, 200).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.recent(1)[0].user_input, "do the thing");
    }

    #[test]
    fn contextual_prompt_includes_recent_history_and_current_input() {
        let mut store = ConversationStore::new(200);
        let id = store.add_turn("what is rust", None);
        store.update_outcome(&id, Outcome::Success, "a systems language");

        let prompt = store.generate_contextual_prompt("tell me more", "question", 2000);
        assert!(prompt.contains("what is rust"));
        assert!(prompt.contains("tell me more"));
    }

    #[test]
    fn loading_a_missing_file_starts_an_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing.json");
        let store = ConversationStore::load(&path, 200).unwrap();
        assert!(store.is_empty());
    }
}
