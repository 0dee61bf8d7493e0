use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A caller is identified by an opaque string handed down by the chat
/// transport (a messenger user id, or a stable label like `"owner"`). The
/// proxy never resolves identity or permissions beyond this string.
pub type CallerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single turn in a session's message ring. `token_estimate` is computed
/// once on ingress (see `proxy_budget::tokens`) and cached here so the
/// session's running `total_tokens` never needs to recompute it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub ts: chrono::DateTime<chrono::Utc>,
    pub token_estimate: u32,
    pub is_tool_result: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, token_estimate: u32) -> Self {
        Self {
            role,
            content: content.into(),
            ts: chrono::Utc::now(),
            token_estimate,
            is_tool_result: false,
        }
    }

    pub fn tool_result(content: impl Into<String>, token_estimate: u32) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            ts: chrono::Utc::now(),
            token_estimate,
            is_tool_result: true,
        }
    }
}

/// Kind of durable fact mined from a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Fact,
    Preference,
    Project,
    Hobby,
    Skill,
    Plan,
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FactKind::Fact => "fact",
            FactKind::Preference => "preference",
            FactKind::Project => "project",
            FactKind::Hobby => "hobby",
            FactKind::Skill => "skill",
            FactKind::Plan => "plan",
        };
        write!(f, "{s}")
    }
}

/// A durable fact extracted from conversation, destined for the memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub caller_id: CallerId,
    pub kind: FactKind,
    pub content: String,
    pub confidence: f32,
    pub source_session_id: String,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Fact {
    pub fn new(
        caller_id: impl Into<String>,
        kind: FactKind,
        content: impl Into<String>,
        confidence: f32,
        source_session_id: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            caller_id: caller_id.into(),
            kind,
            content: content.into(),
            confidence,
            source_session_id: source_session_id.into(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The two destinations a turn can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Direct,
    Agent,
}

/// Outcome of the route classifier for a single user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: RouteType,
    pub needed_tools: Vec<String>,
    pub confidence: f32,
    pub reason: String,
}

impl RouteDecision {
    pub fn direct(confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            route: RouteType::Direct,
            needed_tools: Vec::new(),
            confidence,
            reason: reason.into(),
        }
    }

    pub fn agent(tools: Vec<String>, confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            route: RouteType::Agent,
            needed_tools: tools,
            confidence,
            reason: reason.into(),
        }
    }
}

/// Static description of a tool backend, exposed to both adapters and the
/// HTTP `/tools` surface. `parameters` maps a parameter name to a short
/// human-readable description (the shape a free-text adapter repeats back in
/// its system prompt convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
}

/// A tool invocation intent produced by a backend adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub params: serde_json::Value,
    /// Only populated by the premium (structured tool-calling) adapter.
    pub call_id: Option<String>,
}

/// The result of executing a `ToolCall` through the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call_id: Option<String>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_kind_display_matches_wire_format() {
        assert_eq!(FactKind::Preference.to_string(), "preference");
    }

    #[test]
    fn route_decision_direct_has_no_tools() {
        let d = RouteDecision::direct(0.6, "short message");
        assert_eq!(d.route, RouteType::Direct);
        assert!(d.needed_tools.is_empty());
    }
}
