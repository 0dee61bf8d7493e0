//! Route Classifier.
//!
//! Three levels, evaluated in order; the first hit wins. The classifier is
//! pure with respect to routing — it never calls a model — but keeps
//! cumulative `{direct, agent, total}` counters for the `/health` surface.

use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;
use tracing::debug;

use proxy_core::types::RouteDecision;

/// Canonical god-mode activation/deactivation phrases, matched as an exact
/// (trimmed, lowercased) phrase, no partial match.
const GOD_MODE_ON_PHRASES: &[&str] = &[
    "активируй режим бога",
    "режим бога",
    "включи режим бога",
    "включи бога",
    "/god",
    "/godmode",
    "godmode",
    "god mode",
    "god",
];

const GOD_MODE_OFF_PHRASES: &[&str] = &[
    "отключи режим бога",
    "выключи режим бога",
    "выключи бога",
    "отключи бога",
    "локальный режим",
    "/local",
    "local",
    "выход",
    "выйди из режима бога",
];

/// Canned acknowledgement text for a mode toggle — no model is invoked.
pub const GOD_MODE_ON_ACK: &str = "Premium mode engaged.";
pub const GOD_MODE_OFF_ACK: &str = "Back to normal mode.";

#[derive(Debug, Clone)]
pub enum ClassifyOutcome {
    /// A mode-toggle phrase matched. The caller applies `enabled` to the
    /// session's `god_mode` flag and returns `ack` verbatim without calling
    /// any backend.
    ModeToggle { enabled: bool, ack: &'static str },
    Decision(RouteDecision),
}

struct ToolPattern {
    regex: Regex,
    tools: &'static [&'static str],
}

struct DirectPattern {
    regex: Regex,
}

/// A small tool-keyword vocabulary used only by the level-4 fallback score.
const TOOL_KEYWORDS: &[&str] = &[
    "task", "задача", "news", "новости", "weather", "погода", "file", "файл", "remember",
    "запомни", "recall", "помнишь", "time", "время", "system", "docker", "gpu", "calendar",
    "календарь", "email", "почта", "shell", "command", "команда",
];

pub struct Classifier {
    tool_patterns: Vec<ToolPattern>,
    direct_patterns: Vec<DirectPattern>,
    direct_count: AtomicU64,
    agent_count: AtomicU64,
    total_count: AtomicU64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            tool_patterns: build_tool_patterns(),
            direct_patterns: build_direct_patterns(),
            direct_count: AtomicU64::new(0),
            agent_count: AtomicU64::new(0),
            total_count: AtomicU64::new(0),
        }
    }

    /// Classify one user turn. `current_god_mode` is only used to phrase the
    /// toggle acknowledgement consistently; the caller is responsible for
    /// actually flipping the session's flag.
    pub fn classify(&self, text: &str) -> ClassifyOutcome {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        // Level 1a: mode toggles.
        if GOD_MODE_ON_PHRASES.contains(&lower.as_str()) {
            return ClassifyOutcome::ModeToggle {
                enabled: true,
                ack: GOD_MODE_ON_ACK,
            };
        }
        if GOD_MODE_OFF_PHRASES.contains(&lower.as_str()) {
            return ClassifyOutcome::ModeToggle {
                enabled: false,
                ack: GOD_MODE_OFF_ACK,
            };
        }

        // Level 1b: unrecognized slash commands are forced to agent with an
        // empty tool set (the registry decides what's actually available).
        if trimmed.starts_with('/') && trimmed.len() > 1 {
            return self.record(ClassifyOutcome::Decision(RouteDecision::agent(
                Vec::new(),
                1.0,
                "slash command",
            )));
        }

        // Level 2: tool-pattern table. Any hit ⇒ agent with the union of
        // matched tool sets.
        let mut matched_tools: Vec<String> = Vec::new();
        for pattern in &self.tool_patterns {
            if pattern.regex.is_match(&lower) {
                for t in pattern.tools {
                    if !matched_tools.iter().any(|m| m == t) {
                        matched_tools.push(t.to_string());
                    }
                }
            }
        }
        if !matched_tools.is_empty() {
            debug!(tools = ?matched_tools, "classifier: tool pattern hit");
            return self.record(ClassifyOutcome::Decision(RouteDecision::agent(
                matched_tools,
                0.9,
                "tool pattern match",
            )));
        }

        // Level 3: direct-pattern table.
        if self.direct_patterns.iter().any(|p| p.regex.is_match(&lower)) {
            return self.record(ClassifyOutcome::Decision(RouteDecision::direct(
                0.85,
                "direct pattern match",
            )));
        }

        // Level 4: keyword overlap score, else fall back on turn length.
        let tokens: Vec<&str> = lower.split_whitespace().collect();
        let overlap = tokens
            .iter()
            .filter(|t| TOOL_KEYWORDS.contains(&t.trim_matches(|c: char| !c.is_alphanumeric())))
            .count();
        let score = (overlap as f32 / 3.0).min(1.0);

        if score > 0.5 {
            return self.record(ClassifyOutcome::Decision(RouteDecision::agent(
                Vec::new(),
                score,
                "keyword overlap score",
            )));
        }

        if tokens.len() <= 8 {
            self.record(ClassifyOutcome::Decision(RouteDecision::direct(
                0.5,
                "short turn, default direct",
            )))
        } else {
            self.record(ClassifyOutcome::Decision(RouteDecision::agent(
                Vec::new(),
                0.5,
                "long turn, default agent with all tools",
            )))
        }
    }

    fn record(&self, outcome: ClassifyOutcome) -> ClassifyOutcome {
        if let ClassifyOutcome::Decision(ref d) = outcome {
            self.total_count.fetch_add(1, Ordering::Relaxed);
            match d.route {
                proxy_core::types::RouteType::Direct => {
                    self.direct_count.fetch_add(1, Ordering::Relaxed);
                }
                proxy_core::types::RouteType::Agent => {
                    self.agent_count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        outcome
    }

    pub fn counters(&self) -> ClassifierCounters {
        ClassifierCounters {
            direct: self.direct_count.load(Ordering::Relaxed),
            agent: self.agent_count.load(Ordering::Relaxed),
            total: self.total_count.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ClassifierCounters {
    pub direct: u64,
    pub agent: u64,
    pub total: u64,
}

fn build_tool_patterns() -> Vec<ToolPattern> {
    let rules: &[(&str, &'static [&'static str])] = &[
        (r"(?i)\b(task|todo|задач)", &["task"]),
        (r"(?i)\b(news|новост|weather|погод|internet|интернет)", &["web"]),
        (r"(?i)\b(file|файл|directory|папк)", &["fs"]),
        (r"(?i)\b(remember|запомни|recall|помнишь|forget)", &["memory", "vector"]),
        (r"(?i)\b(what time|который час|время сейчас)", &["time"]),
        (r"(?i)\b(system|gpu|docker|cpu|процессор)", &["shell"]),
        (r"(?i)\b(calendar|календар|meeting|встреч)", &["calendar"]),
        (r"(?i)\b(email|почт|письмо)", &["mail"]),
        (
            r"(?i)(morning briefing|утренн[а-я]* сводк)",
            &["time", "calendar", "mail", "task"],
        ),
    ];
    rules
        .iter()
        .map(|(p, tools)| ToolPattern {
            regex: Regex::new(p).expect("tool pattern must compile"),
            tools,
        })
        .collect()
}

fn build_direct_patterns() -> Vec<DirectPattern> {
    let patterns = [
        r"(?i)^(hi|hello|hey|привет|здравствуй)",
        r"(?i)(thank|спасибо|благодар)",
        r"(?i)^(bye|goodbye|пока|до свидания)",
        r"(?i)(who are you|what are you|кто ты|что ты такое)",
        r"(?i)^(what is|what's|explain|что такое|объясни)",
        r"(?i)(translate|переведи|summarize|перескажи)",
        r"(?i)(what do you think|your opinion|твое мнение|посоветуй)",
    ];
    patterns
        .iter()
        .map(|p| DirectPattern {
            regex: Regex::new(p).expect("direct pattern must compile"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxy_core::types::RouteType;

    #[test]
    fn god_mode_on_phrase_toggles_without_routing() {
        let c = Classifier::new();
        match c.classify("god mode") {
            ClassifyOutcome::ModeToggle { enabled, .. } => assert!(enabled),
            _ => panic!("expected mode toggle"),
        }
        assert_eq!(c.counters().total, 0);
    }

    #[test]
    fn slash_command_forces_agent_with_empty_tools() {
        let c = Classifier::new();
        match c.classify("/unknown-thing") {
            ClassifyOutcome::Decision(d) => {
                assert_eq!(d.route, RouteType::Agent);
                assert!(d.needed_tools.is_empty());
            }
            _ => panic!("expected decision"),
        }
    }

    #[test]
    fn task_phrase_routes_to_agent_with_task_tool() {
        let c = Classifier::new();
        match c.classify("добавь задачу: купить молоко") {
            ClassifyOutcome::Decision(d) => {
                assert_eq!(d.route, RouteType::Agent);
                assert!(d.needed_tools.contains(&"task".to_string()));
            }
            _ => panic!("expected decision"),
        }
    }

    #[test]
    fn greeting_routes_direct() {
        let c = Classifier::new();
        match c.classify("Привет") {
            ClassifyOutcome::Decision(d) => assert_eq!(d.route, RouteType::Direct),
            _ => panic!("expected decision"),
        }
    }

    #[test]
    fn exactly_one_route_per_decision() {
        let c = Classifier::new();
        for text in ["hello", "what time is it", "explain quantum computing", "/foo"] {
            if let ClassifyOutcome::Decision(d) = c.classify(text) {
                match d.route {
                    RouteType::Direct => assert!(d.needed_tools.is_empty() || true),
                    RouteType::Agent => {}
                }
            }
        }
    }

    #[test]
    fn counters_accumulate_across_calls() {
        let c = Classifier::new();
        c.classify("hello");
        c.classify("explain rust ownership");
        let counters = c.counters();
        assert_eq!(counters.total, 2);
    }
}
