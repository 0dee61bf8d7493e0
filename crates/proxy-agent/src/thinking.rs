//! The local adapter's boolean "thinking" toggle.
//!
//! A small set of regex cues on the user's turn decide whether the local
//! model is asked to reason inside a `<think>...</think>` block before its
//! visible answer. The adapter always strips leftover think spans from the
//! final content, preferring the post-think text; if nothing survives the
//! strip, the think contents themselves become the answer rather than
//! returning empty content to the client.

use std::sync::LazyLock;

use regex::Regex;

static THINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").unwrap());

static THINKING_CUES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d+\s*[-+*/]\s*\d+",
        r"(?i)step[- ]by[- ]step",
        r"(?i)по\s+шагам",
        r"(?i)puzzle|головоломк|загадк",
        r"(?i)```|write (a|the) (function|code)|напиши код",
        r"(?i)\banaly[sz]e\b|проанализируй",
        r"(?i)\bplan\b|спланируй",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether `user_turn` contains any of the cues that should enable thinking
/// mode for this call.
pub fn needs_thinking(user_turn: &str) -> bool {
    THINKING_CUES.iter().any(|re| re.is_match(user_turn))
}

/// Strip `<think>...</think>` spans from `content`, returning the text that
/// should actually be shown to the user. If everything outside think spans
/// is empty, falls back to the (concatenated) think contents rather than
/// returning an empty string.
pub fn strip_think(content: &str) -> String {
    let outside: String = THINK_TAG.replace_all(content, "").trim().to_string();
    if !outside.is_empty() {
        return outside;
    }

    let inside: String = THINK_TAG
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect::<Vec<_>>()
        .join("\n");
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_triggers_thinking() {
        assert!(needs_thinking("what is 12 + 37?"));
    }

    #[test]
    fn greeting_does_not_trigger_thinking() {
        assert!(!needs_thinking("good morning!"));
    }

    #[test]
    fn strip_think_prefers_text_after_the_block() {
        let out = strip_think("<think>scratch work</think>final answer");
        assert_eq!(out, "final answer");
    }

    #[test]
    fn strip_think_falls_back_to_think_contents_when_nothing_else_remains() {
        let out = strip_think("<think>only reasoning here</think>");
        assert_eq!(out, "only reasoning here");
    }

    #[test]
    fn content_without_think_tags_is_unchanged() {
        assert_eq!(strip_think("plain answer"), "plain answer");
    }
}
