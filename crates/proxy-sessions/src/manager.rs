use std::sync::Mutex;

use dashmap::DashMap;
use tracing::{debug, info, instrument};

use proxy_core::types::{CallerId, Message, Role};

use crate::types::{Session, SessionStats};

const PRUNE_MARKER: &str = "[pruned]";

/// Knobs the manager needs from `proxy_core::config::SessionConfig` /
/// `PruningConfig`, collected so the manager doesn't depend on the full
/// config struct.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// `M` — max messages retained per session.
    pub max_messages: usize,
    /// `T_idle` — seconds of inactivity before a session is eligible for
    /// teardown.
    pub idle_timeout_s: i64,
    /// `T_flush` — total token threshold that makes a session flushable.
    pub flush_threshold: u32,
    /// `N` — tool results older than the N-th most-recent assistant message
    /// get pruned.
    pub prune_after_messages: usize,
    /// Cap a pruned tool result is truncated to.
    pub prune_tool_max_chars: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_messages: 20,
            idle_timeout_s: 1800,
            flush_threshold: 28_000,
            prune_after_messages: 3,
            prune_tool_max_chars: 200,
        }
    }
}

/// Per-caller bounded session ring.
///
/// Every session lives behind its own `Mutex`, held in a `DashMap` keyed by
/// `caller_id`. The map itself is lock-striped by `DashMap`, so unrelated
/// callers never contend; a single caller's reads/writes are serialized by
/// its own mutex.
pub struct SessionManager {
    sessions: DashMap<CallerId, Mutex<Session>>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
        }
    }

    /// Run `f` with exclusive access to `caller_id`'s session, creating one
    /// if absent or expired. This is the only way callers touch a `Session`
    /// — it keeps the per-session lock scoped to a single critical section.
    #[instrument(skip(self, f), fields(caller_id))]
    pub fn with_session<R>(&self, caller_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let entry = self
            .sessions
            .entry(caller_id.to_string())
            .or_insert_with(|| Mutex::new(Session::new(caller_id)));
        let mut guard = entry.lock().unwrap();

        if guard.is_expired(self.policy.idle_timeout_s) {
            debug!(caller_id, "session expired, replacing with a fresh one");
            *guard = Session::new(caller_id);
        }

        f(&mut guard)
    }

    /// Returns a read-only snapshot of the (possibly freshly-created)
    /// session for `caller_id`.
    pub fn get_or_create(&self, caller_id: &str) -> Session {
        self.with_session(caller_id, |s| s.clone())
    }

    /// Append a turn, estimate its tokens, and apply tool-result pruning and
    /// ring eviction.
    #[instrument(skip(self, content), fields(caller_id, role = ?role))]
    pub fn append(&self, caller_id: &str, role: Role, content: impl Into<String>, is_tool_result: bool) {
        let content = content.into();
        self.with_session(caller_id, |session| {
            let tokens = proxy_budget::tokens(&content);
            let mut message = Message::new(role, content, tokens);
            message.is_tool_result = is_tool_result;

            session.messages.push(message);
            session.total_tokens += tokens;
            session.last_activity = chrono::Utc::now();

            self.prune_tool_results(session);
            self.evict_overflow(session);

            session.recompute_total_tokens();
        });
    }

    /// Truncate tool results older than the N-th most-recent assistant
    /// message, each exactly once (a `[pruned]`-suffixed result is never
    /// re-truncated — it's already short).
    fn prune_tool_results(&self, session: &mut Session) {
        let n = self.policy.prune_after_messages;
        let assistant_positions: Vec<usize> = session
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::Assistant)
            .map(|(i, _)| i)
            .collect();

        if assistant_positions.len() < n {
            return;
        }

        // The N-th most-recent assistant message's index; anything at or
        // before it is eligible for tool-result pruning.
        let cutoff = assistant_positions[assistant_positions.len() - n];
        let cap = self.policy.prune_tool_max_chars;

        for message in session.messages[..cutoff].iter_mut() {
            if message.is_tool_result && message.content.chars().count() > cap {
                let truncated: String = message.content.chars().take(cap).collect();
                message.content = format!("{truncated}{PRUNE_MARKER}");
                message.token_estimate = proxy_budget::tokens(&message.content);
            }
        }
    }

    /// Evict from the front while over the message cap, oldest first.
    fn evict_overflow(&self, session: &mut Session) {
        while session.messages.len() > self.policy.max_messages {
            session.messages.remove(0);
        }
    }

    /// Formatted last-`k` messages for prompt assembly.
    pub fn get_context(&self, caller_id: &str, k: usize) -> String {
        self.with_session(caller_id, |s| s.get_context(k, 300))
    }

    /// Retain only the last 3 messages, recompute tokens, bump the flush
    /// counter.
    #[instrument(skip(self), fields(caller_id))]
    pub fn compact(&self, caller_id: &str) {
        self.with_session(caller_id, |session| {
            if session.messages.len() > 3 {
                let keep_from = session.messages.len() - 3;
                session.messages.drain(..keep_from);
            }
            session.recompute_total_tokens();
            session.flush_counter += 1;
            info!(caller_id, flush_counter = session.flush_counter, "session compacted");
        });
    }

    pub fn needs_flush(&self, caller_id: &str) -> bool {
        self.with_session(caller_id, |s| s.needs_flush(self.policy.flush_threshold))
    }

    pub fn set_god_mode(&self, caller_id: &str, enabled: bool) {
        self.with_session(caller_id, |s| s.god_mode = enabled);
    }

    pub fn god_mode(&self, caller_id: &str) -> bool {
        self.with_session(caller_id, |s| s.god_mode)
    }

    pub fn record_tool_call(&self, caller_id: &str) {
        self.with_session(caller_id, |s| s.tool_calls += 1);
    }

    /// Insert `content` into the caller's dedup set, returning `true` if it
    /// was newly inserted (i.e. not a duplicate fact this session).
    pub fn dedupe_fact(&self, caller_id: &str, content: &str) -> bool {
        self.with_session(caller_id, |s| s.facts_seen.insert(content.to_string()))
    }

    pub fn stats(&self, caller_id: &str) -> SessionStats {
        self.with_session(caller_id, |s| s.stats())
    }

    /// Drop idle sessions from the map entirely, returning how many were
    /// torn down. Intended to be called periodically, not per-turn.
    pub fn sweep_expired(&self) -> usize {
        let idle = self.policy.idle_timeout_s;
        let expired: Vec<CallerId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().lock().unwrap().is_expired(idle))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &expired {
            self.sessions.remove(key);
        }
        expired.len()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop a single session outright.
    /// Returns `true` if a session existed for `caller_id`.
    pub fn remove(&self, caller_id: &str) -> bool {
        self.sessions.remove(caller_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(SessionPolicy {
            max_messages: 4,
            idle_timeout_s: 1800,
            flush_threshold: 50,
            prune_after_messages: 1,
            prune_tool_max_chars: 5,
        })
    }

    #[test]
    fn total_tokens_invariant_holds_after_append() {
        let mgr = manager();
        mgr.append("owner", Role::User, "hello there", false);
        mgr.append("owner", Role::Assistant, "hi", false);
        mgr.with_session("owner", |s| {
            let sum: u32 = s.messages.iter().map(|m| m.token_estimate).sum();
            assert_eq!(s.total_tokens, sum);
        });
    }

    #[test]
    fn message_cap_is_enforced_oldest_evicted_first() {
        let mgr = manager();
        for i in 0..10 {
            mgr.append("owner", Role::User, format!("message {i}"), false);
        }
        mgr.with_session("owner", |s| {
            assert!(s.messages.len() <= 4);
            assert!(s.messages.last().unwrap().content.contains('9'));
        });
    }

    #[test]
    fn tool_results_older_than_n_assistant_turns_are_truncated() {
        let mgr = manager();
        mgr.append("owner", Role::Tool, "a very long tool result that exceeds cap", true);
        mgr.append("owner", Role::Assistant, "ok", false);
        mgr.append("owner", Role::User, "next turn", false);
        mgr.with_session("owner", |s| {
            let tool_msg = s.messages.iter().find(|m| m.is_tool_result).unwrap();
            assert!(tool_msg.content.ends_with(PRUNE_MARKER));
        });
    }

    #[test]
    fn compact_retains_at_most_three_messages() {
        let mgr = manager();
        for i in 0..8 {
            mgr.append("owner", Role::User, format!("m{i}"), false);
        }
        mgr.compact("owner");
        mgr.with_session("owner", |s| {
            assert!(s.messages.len() <= 3);
            let sum: u32 = s.messages.iter().map(|m| m.token_estimate).sum();
            assert_eq!(s.total_tokens, sum);
            assert_eq!(s.flush_counter, 1);
        });
    }

    #[test]
    fn dedupe_fact_rejects_repeat_within_session() {
        let mgr = manager();
        assert!(mgr.dedupe_fact("owner", "User likes tea"));
        assert!(!mgr.dedupe_fact("owner", "User likes tea"));
    }

    #[test]
    fn expired_session_is_replaced_not_reused() {
        let mgr = SessionManager::new(SessionPolicy {
            idle_timeout_s: -1,
            ..SessionPolicy::default()
        });
        mgr.append("owner", Role::User, "first session", false);
        let first_id = mgr.with_session("owner", |s| s.id.clone());
        mgr.append("owner", Role::User, "second session", false);
        let second_id = mgr.with_session("owner", |s| s.id.clone());
        assert_ne!(first_id, second_id);
    }
}
