//! Token estimation and context-overflow trimming.
//!
//! The estimator is deliberately crude: `tokens(s) = max(1, ceil(chars/3))`.
//! The ratio is tuned for Cyrillic-heavy input; pure Latin text estimates
//! slightly high, which is harmless since it only makes the budgeter more
//! conservative.

use proxy_core::types::Message;
use tracing::warn;

/// Per-message bookkeeping overhead counted on top of content tokens —
/// mirrors the role/separator tokens a real tokenizer would add per turn.
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Section markers bounding the RAG block inside an assembled system prompt.
/// The block between these two lines (inclusive) is the first thing trimmed
/// on overflow.
pub const RAG_BLOCK_START: &str = "<!-- RAG:BEGIN -->";
pub const RAG_BLOCK_END: &str = "<!-- RAG:END -->";

/// Floor below which the system prompt is never trimmed further.
const SYSTEM_PROMPT_FLOOR_CHARS: usize = 200;

/// Estimate the token cost of a single string.
pub fn tokens(s: &str) -> u32 {
    if s.is_empty() {
        return 0;
    }
    let chars = s.chars().count();
    (chars.div_ceil(3)).max(1) as u32
}

/// Estimate the total token cost of a message sequence, including per-message
/// overhead.
pub fn messages_tokens(messages: &[Message]) -> u32 {
    messages
        .iter()
        .map(|m| tokens(&m.content) + MESSAGE_OVERHEAD_TOKENS)
        .sum()
}

/// Compute the dynamic output token budget.
///
/// `max_output = clamp(context_window - input_tokens - safety_reserve, 256, desired_cap)`.
/// Logs a warning (never panics or errors) when the clamp bites on the low
/// side, since that means the caller's desired cap could not be honored.
pub fn dynamic_max_output(
    context_window: u32,
    input_tokens: u32,
    desired_cap: u32,
    safety_reserve: u32,
) -> u32 {
    let headroom = context_window
        .saturating_sub(input_tokens)
        .saturating_sub(safety_reserve);
    let max_output = headroom.clamp(256, desired_cap.max(256));

    if max_output < desired_cap {
        warn!(
            context_window,
            input_tokens, desired_cap, max_output, "output budget clamped below desired cap"
        );
    }

    max_output
}

/// Result of an overflow trim pass, useful for logging/tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub rag_trimmed: bool,
    pub rag_removed: bool,
    pub messages_dropped: usize,
    pub system_prompt_truncated: bool,
}

/// Apply the three-stage overflow trim in place.
///
/// Stage 1 shrinks or removes the RAG block in `system_prompt`. Stage 2 drops
/// the oldest non-system messages, always preserving at least the last user
/// turn. Stage 3 truncates the system prompt tail as a last resort, down to
/// `SYSTEM_PROMPT_FLOOR_CHARS`.
///
/// Property: after this call, `tokens(system_prompt) + messages_tokens(messages)`
/// is `<= context_window - min_response_tokens`, or the system prompt has
/// been reduced to its floor length.
pub fn trim_overflow(
    system_prompt: &mut String,
    messages: &mut Vec<Message>,
    context_window: u32,
    min_response_tokens: u32,
) -> TrimReport {
    let budget = context_window.saturating_sub(min_response_tokens);
    let mut report = TrimReport::default();

    let total = |sp: &str, msgs: &[Message]| tokens(sp) + messages_tokens(msgs);

    if total(system_prompt, messages) <= budget {
        return report;
    }

    // Stage 1: trim or remove the RAG block.
    if let (Some(start), Some(end)) = (
        system_prompt.find(RAG_BLOCK_START),
        system_prompt.find(RAG_BLOCK_END),
    ) {
        if end > start {
            let block_end = end + RAG_BLOCK_END.len();
            let overflow = total(system_prompt, messages).saturating_sub(budget);
            let rag_content = &system_prompt[start..block_end];
            let rag_tokens = tokens(rag_content);

            if rag_tokens > overflow && overflow > 0 {
                // Truncate the RAG block to roughly what's needed, keeping the markers.
                let inner_start = start + RAG_BLOCK_START.len();
                let keep_tokens = rag_tokens.saturating_sub(overflow);
                let keep_chars = (keep_tokens as usize) * 3;
                let inner = &system_prompt[inner_start..end];
                let truncated_inner: String = inner.chars().take(keep_chars).collect();
                let mut new_block = String::with_capacity(truncated_inner.len() + 64);
                new_block.push_str(RAG_BLOCK_START);
                new_block.push_str(&truncated_inner);
                new_block.push_str(RAG_BLOCK_END);
                system_prompt.replace_range(start..block_end, &new_block);
                report.rag_trimmed = true;
            } else {
                system_prompt.replace_range(start..block_end, "");
                report.rag_removed = true;
            }
        }
    }

    if total(system_prompt, messages) <= budget {
        return report;
    }

    // Stage 2: drop oldest non-system messages, preserving at least the last
    // user turn (never emptying the message list down to nothing).
    while total(system_prompt, messages) > budget && messages.len() > 1 {
        messages.remove(0);
        report.messages_dropped += 1;
    }

    if total(system_prompt, messages) <= budget {
        return report;
    }

    // Stage 3: truncate the system prompt tail.
    while total(system_prompt, messages) > budget
        && system_prompt.chars().count() > SYSTEM_PROMPT_FLOOR_CHARS
    {
        let target_len = system_prompt
            .chars()
            .count()
            .saturating_sub(64)
            .max(SYSTEM_PROMPT_FLOOR_CHARS);
        *system_prompt = system_prompt.chars().take(target_len).collect();
        report.system_prompt_truncated = true;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxy_core::types::Role;

    fn msg(role: Role, content: &str) -> Message {
        Message::new(role, content, tokens(content))
    }

    #[test]
    fn tokens_floor_is_one_for_nonempty() {
        assert_eq!(tokens("a"), 1);
        assert_eq!(tokens(""), 0);
        assert_eq!(tokens("abcdef"), 2);
    }

    #[test]
    fn messages_tokens_adds_overhead_per_message() {
        let msgs = vec![msg(Role::User, "abc"), msg(Role::Assistant, "abcdef")];
        // tokens("abc")=1 +4, tokens("abcdef")=2 +4 => 11
        assert_eq!(messages_tokens(&msgs), 11);
    }

    #[test]
    fn dynamic_max_output_respects_floor_and_cap() {
        assert_eq!(dynamic_max_output(32768, 30000, 2000, 512), 256);
        assert_eq!(dynamic_max_output(32768, 1000, 2000, 512), 2000);
    }

    #[test]
    fn trim_removes_rag_block_when_history_alone_fits() {
        let mut system = format!(
            "persona\n{}\nsome retrieved memory that is reasonably long for a test{}\nrules",
            RAG_BLOCK_START, RAG_BLOCK_END
        );
        let mut messages = vec![msg(Role::User, "hi")];
        let before_history_tokens = messages_tokens(&messages);

        let report = trim_overflow(&mut system, &mut messages, 20, 5);

        assert!(report.rag_removed || report.rag_trimmed);
        assert_eq!(messages_tokens(&messages), before_history_tokens);
        assert!(!system.contains("retrieved memory that is reasonably long"));
    }

    #[test]
    fn trim_preserves_last_user_turn() {
        let mut system = "short".to_string();
        let mut messages: Vec<Message> = (0..30)
            .map(|i| msg(Role::Assistant, &format!("message number {i} padding padding padding")))
            .collect();
        messages.push(msg(Role::User, "final question"));

        trim_overflow(&mut system, &mut messages, 50, 5);

        assert_eq!(messages.last().unwrap().content, "final question");
    }
}
