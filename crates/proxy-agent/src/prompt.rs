//! System prompt assembly:
//! Workspace ⊕ (optional) RAG block ⊕ (optional) tools manifest ⊕ recent
//! session context ⊕ a literal rules block forbidding hallucinated tool use.

use proxy_budget::{RAG_BLOCK_END, RAG_BLOCK_START};
use proxy_core::types::ToolDefinition;

const RULES_BLOCK: &str = "\n\nRules: only call a tool that is explicitly listed above. Never \
claim to have used a tool you did not actually call. If no tool is needed, answer directly.";

/// Assemble the full system prompt for one turn.
///
/// `rag_context` is `None` when retrieval wasn't triggered or returned
/// nothing for this turn — the RAG block is
/// omitted entirely rather than emitted empty, since an empty-but-present
/// block would still cost overflow-trim bookkeeping for nothing.
pub fn compose(
    workspace_context: &str,
    rag_context: Option<&[String]>,
    tools: &[ToolDefinition],
    session_context: &str,
    rules_enabled: bool,
) -> String {
    let mut out = String::new();
    out.push_str(workspace_context);

    if let Some(snippets) = rag_context {
        if !snippets.is_empty() {
            out.push_str("\n\n");
            out.push_str(RAG_BLOCK_START);
            out.push('\n');
            for s in snippets {
                out.push_str("- ");
                out.push_str(s);
                out.push('\n');
            }
            out.push_str(RAG_BLOCK_END);
        }
    }

    if !tools.is_empty() {
        out.push_str("\n\nAvailable tools:\n");
        for t in tools {
            out.push_str(&format!("- {}: {}\n", t.name, t.description));
        }
    }

    if !session_context.is_empty() {
        out.push_str("\n\nRecent conversation:\n");
        out.push_str(session_context);
    }

    if rules_enabled {
        out.push_str(RULES_BLOCK);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_rag_block_when_no_context() {
        let out = compose("persona", None, &[], "", true);
        assert!(!out.contains(RAG_BLOCK_START));
    }

    #[test]
    fn includes_rag_block_when_snippets_present() {
        let out = compose("persona", Some(&["user likes tea".to_string()]), &[], "", true);
        assert!(out.contains(RAG_BLOCK_START));
        assert!(out.contains("user likes tea"));
    }

    #[test]
    fn rules_block_forbids_hallucinated_tools() {
        let out = compose("persona", None, &[], "", true);
        assert!(out.contains("Never claim to have used a tool"));
    }
}
