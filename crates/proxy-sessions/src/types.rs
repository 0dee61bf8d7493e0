use std::collections::HashSet;

use proxy_core::types::{CallerId, Message, Role};

/// Per-caller turn state.
///
/// Owned exclusively by [`crate::SessionManager`]; everything else in the
/// proxy (retriever, classifier, orchestrator) sees a session read-only
/// except the orchestrator's own append path, which the manager serializes
/// per caller.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub caller_id: CallerId,
    pub messages: Vec<Message>,
    pub total_tokens: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
    pub god_mode: bool,
    pub tool_calls: u32,
    pub facts_seen: HashSet<String>,
    pub flush_counter: u32,
}

impl Session {
    pub fn new(caller_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            caller_id: caller_id.into(),
            messages: Vec::new(),
            total_tokens: 0,
            created_at: now,
            last_activity: now,
            god_mode: false,
            tool_calls: 0,
            facts_seen: HashSet::new(),
            flush_counter: 0,
        }
    }

    /// True once `T_idle` has elapsed since the last turn.
    pub fn is_expired(&self, idle_timeout_s: i64) -> bool {
        let age = chrono::Utc::now() - self.last_activity;
        age.num_seconds() > idle_timeout_s
    }

    /// True once accumulated tokens exceed the flush threshold.
    pub fn needs_flush(&self, flush_threshold: u32) -> bool {
        self.total_tokens > flush_threshold
    }

    /// Recompute `total_tokens` from the live message list — used as an
    /// assertion aid and after any bulk mutation (pruning, compaction).
    pub fn recompute_total_tokens(&mut self) {
        self.total_tokens = self.messages.iter().map(|m| m.token_estimate).sum();
    }

    /// Formatted last-`k` messages, capped per-message, for inclusion in an
    /// assembled system prompt.
    pub fn get_context(&self, k: usize, per_message_cap: usize) -> String {
        self.messages
            .iter()
            .rev()
            .take(k)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|m| {
                let label = match m.role {
                    Role::System => "System",
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::Tool => "Tool",
                };
                let content: String = m.content.chars().take(per_message_cap).collect();
                format!("{label}: {content}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            id: self.id.clone(),
            messages: self.messages.len(),
            total_tokens: self.total_tokens,
            tool_calls: self.tool_calls,
            god_mode: self.god_mode,
            flush_counter: self.flush_counter,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStats {
    pub id: String,
    pub messages: usize,
    pub total_tokens: u32,
    pub tool_calls: u32,
    pub god_mode: bool,
    pub flush_counter: u32,
}
