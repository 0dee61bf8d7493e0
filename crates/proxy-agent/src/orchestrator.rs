//! Tool-Loop Orchestrator.
//!
//! Drives one full turn: mode-toggle short-circuit, prompt assembly, budget
//! trim, route classification, then either a single direct call or a
//! bounded ReAct loop, finishing with a (non-blocking) fact-extraction pass
//! and a (blocking) memory flush when the session crosses its token budget.
//!
//! Request flow mirrors spec §6: get/create session → flush if due → mode
//! toggle check → compose system prompt → trim → classify → run.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{info, instrument, warn};

use proxy_core::config::ProxyConfig;
use proxy_core::types::{Message, Role, RouteType, ToolDefinition};
use proxy_memory::{FactExtractor, MemoryFlusher, Summarizer};
use proxy_retriever::HybridRetriever;
use proxy_sessions::SessionManager;
use proxy_tools::ToolRegistry;

use crate::adapter::{AdapterError, BackendAdapter, GenerateOutcome, GenerateRequest};
use crate::premium;
use crate::prompt;

/// A commercial chat API's context window is effectively unbounded next to
/// the local model's; the budgeter still needs *some* number to clamp
/// against since `premium_llm` carries no `context_window` knob of its own.
const PREMIUM_CONTEXT_WINDOW: u32 = 128_000;

const ITERATION_LIMIT_TEXT: &str =
    "I wasn't able to finish that within the allowed number of tool steps.";

/// How many recent turns feed the "Recent conversation" recap inside the
/// assembled system prompt (separate from the full history sent on the wire).
const SESSION_RECAP_TURNS: usize = 6;

/// How long to back off after a 429 before surfacing it to the caller.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub owner_id: String,
    pub max_tool_iterations: usize,
    pub search_top_k: usize,
    pub min_response_tokens: u32,
    pub reserve_tokens: u32,
    pub local_context_window: u32,
    pub local_model: String,
    pub local_max_tokens: u32,
    pub premium_model: String,
    pub premium_max_tokens: u32,
}

impl OrchestratorConfig {
    pub fn from_proxy_config(cfg: &ProxyConfig) -> Self {
        Self {
            owner_id: cfg.identity.owner_id.clone(),
            max_tool_iterations: cfg.tools.max_tool_iterations,
            search_top_k: cfg.retrieval.search_top_k,
            min_response_tokens: cfg.budget.min_response_tokens,
            reserve_tokens: cfg.budget.reserve_tokens,
            local_context_window: cfg.local_llm.context_window,
            local_model: cfg.local_llm.model.clone(),
            local_max_tokens: cfg.local_llm.max_tokens,
            premium_model: cfg.premium_llm.model.clone(),
            premium_max_tokens: cfg.premium_llm.max_tokens,
        }
    }
}

/// What one `handle_turn` call produced, enough for the HTTP layer to build
/// the `animara_stats` envelope without reaching back into the
/// orchestrator's internals.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub content: String,
    pub model: String,
    pub flush_done: bool,
    pub tools_used: Vec<String>,
}

pub struct Orchestrator {
    sessions: Arc<SessionManager>,
    workspace: Arc<proxy_workspace::WorkspaceLoader>,
    retriever: Arc<HybridRetriever>,
    classifier: Arc<proxy_classifier::Classifier>,
    tools: Arc<ToolRegistry>,
    fact_extractor: Arc<FactExtractor>,
    flusher: Arc<MemoryFlusher>,
    summarizer: Arc<dyn Summarizer>,
    local: Arc<dyn BackendAdapter>,
    premium: Arc<dyn BackendAdapter>,
    config: OrchestratorConfig,
    /// Runtime override for the premium model name, settable via the
    /// `/godmode/model` admin endpoint without a restart. `None` means "use
    /// `config.premium_model`".
    premium_model_override: RwLock<Option<String>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionManager>,
        workspace: Arc<proxy_workspace::WorkspaceLoader>,
        retriever: Arc<HybridRetriever>,
        classifier: Arc<proxy_classifier::Classifier>,
        tools: Arc<ToolRegistry>,
        fact_extractor: Arc<FactExtractor>,
        flusher: Arc<MemoryFlusher>,
        summarizer: Arc<dyn Summarizer>,
        local: Arc<dyn BackendAdapter>,
        premium: Arc<dyn BackendAdapter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            sessions,
            workspace,
            retriever,
            classifier,
            tools,
            fact_extractor,
            flusher,
            summarizer,
            local,
            premium,
            config,
            premium_model_override: RwLock::new(None),
        }
    }

    /// Current premium model name, honoring any runtime override.
    pub fn premium_model(&self) -> String {
        self.premium_model_override
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.config.premium_model.clone())
    }

    /// Configured (on-disk) premium model, ignoring any runtime override —
    /// what `/godmode/refresh` restores.
    pub fn configured_premium_model(&self) -> &str {
        &self.config.premium_model
    }

    /// Set a runtime premium-model override.
    pub fn set_premium_model(&self, model: String) {
        *self.premium_model_override.write().unwrap() = Some(model);
    }

    /// Drop any runtime override, reverting to the configured premium model
    ///.
    pub fn refresh_premium_model(&self) {
        *self.premium_model_override.write().unwrap() = None;
    }

    #[instrument(skip(self, user_text), fields(caller_id))]
    pub async fn handle_turn(&self, caller_id: &str, user_text: &str) -> TurnResult {
        // F: touching the session (even just to read it) creates it if absent
        // or replaces it if expired.
        let _ = self.sessions.get_or_create(caller_id);

        let mut flush_done = false;
        if self.sessions.needs_flush(caller_id) {
            flush_done = self.run_flush(caller_id).await;
        }

        // Mode toggles never touch the message ring, never call a model, and
        // never run the rest of the pipeline.
        match self.classifier.classify(user_text) {
            proxy_classifier::ClassifyOutcome::ModeToggle { enabled, ack } => {
                self.sessions.set_god_mode(caller_id, enabled);
                return TurnResult {
                    content: ack.to_string(),
                    model: "none".to_string(),
                    flush_done,
                    tools_used: Vec::new(),
                };
            }
            proxy_classifier::ClassifyOutcome::Decision(decision) => {
                self.sessions.append(caller_id, Role::User, user_text, false);
                self.spawn_fact_extraction(caller_id, user_text);

                let god_mode = self.sessions.god_mode(caller_id);
                let (model, context_window, desired_output_cap) = if god_mode {
                    (
                        self.premium_model(),
                        PREMIUM_CONTEXT_WINDOW,
                        self.config.premium_max_tokens,
                    )
                } else {
                    (
                        self.config.local_model.clone(),
                        self.config.local_context_window,
                        self.config.local_max_tokens,
                    )
                };
                let (primary, fallback): (&Arc<dyn BackendAdapter>, &Arc<dyn BackendAdapter>) =
                    if god_mode {
                        (&self.premium, &self.local)
                    } else {
                        (&self.local, &self.premium)
                    };

                let rag_context = if proxy_retriever::should_retrieve(user_text) {
                    match self.retriever.search(user_text, caller_id, self.config.search_top_k).await {
                        Ok(hits) if !hits.is_empty() => Some(hits),
                        Ok(_) => None,
                        Err(e) => {
                            warn!(error = %e, "retrieval failed, continuing without RAG context");
                            None
                        }
                    }
                } else {
                    None
                };

                let workspace_context = self.workspace.context_for(caller_id, &self.config.owner_id).await;
                let session_context = self.sessions.get_context(caller_id, SESSION_RECAP_TURNS);
                let all_tools = self.tools.manifest(&[]);
                let mut system_prompt = prompt::compose(
                    &workspace_context,
                    rag_context.as_deref(),
                    &all_tools,
                    &session_context,
                    decision.route == RouteType::Agent,
                );

                let mut history = self.sessions.with_session(caller_id, |s| s.messages.clone());
                proxy_budget::trim_overflow(
                    &mut system_prompt,
                    &mut history,
                    context_window,
                    self.config.min_response_tokens,
                );

                let (content, tools_used) = match decision.route {
                    RouteType::Direct => {
                        self.run_direct(
                            caller_id,
                            primary,
                            fallback,
                            &model,
                            context_window,
                            desired_output_cap,
                            &mut system_prompt,
                            &mut history,
                        )
                        .await
                    }
                    RouteType::Agent => {
                        let manifest = self.tools.manifest(&decision.needed_tools);
                        self.run_agent_loop(
                            caller_id,
                            primary,
                            fallback,
                            &model,
                            context_window,
                            desired_output_cap,
                            &mut system_prompt,
                            &mut history,
                            &manifest,
                        )
                        .await
                    }
                };

                self.sessions.append(caller_id, Role::Assistant, content.clone(), false);

                TurnResult {
                    content,
                    model,
                    flush_done,
                    tools_used,
                }
            }
        }
    }

    /// Single tools-disabled call; falls back to a (still tools-disabled)
    /// agent iteration on empty content or a non-auth error.
    #[allow(clippy::too_many_arguments)]
    async fn run_direct(
        &self,
        caller_id: &str,
        primary: &Arc<dyn BackendAdapter>,
        fallback: &Arc<dyn BackendAdapter>,
        model: &str,
        context_window: u32,
        desired_output_cap: u32,
        system_prompt: &mut String,
        history: &mut Vec<Message>,
    ) -> (String, Vec<String>) {
        let max_output = proxy_budget::dynamic_max_output(
            context_window,
            proxy_budget::tokens(system_prompt) + proxy_budget::messages_tokens(history),
            desired_output_cap,
            self.config.reserve_tokens,
        );

        let req = GenerateRequest {
            system_prompt: system_prompt.as_str(),
            history: history.as_slice(),
            tools: &[],
            model,
            max_output,
            temperature: 0.7,
        };

        match self.call_backend(primary, fallback, &req).await {
            Ok(GenerateOutcome::Final(text)) if !text.trim().is_empty() => {
                (text.trim().to_string(), Vec::new())
            }
            Err(e) if e.is_auth_error() => {
                (format!("⚠️ backend configuration error: {e}"), Vec::new())
            }
            _ => {
                // Empty content, a stray tool call with tools disabled, or a
                // retryable error: never hand the client nothing back.
                self.run_agent_loop(
                    caller_id,
                    primary,
                    fallback,
                    model,
                    context_window,
                    desired_output_cap,
                    system_prompt,
                    history,
                    &[],
                )
                .await
            }
        }
    }

    /// ReAct loop bounded by `I_max`, re-trimming the budget every iteration
    /// since tool round trips grow `history` as the loop runs.
    #[allow(clippy::too_many_arguments)]
    async fn run_agent_loop(
        &self,
        caller_id: &str,
        primary: &Arc<dyn BackendAdapter>,
        fallback: &Arc<dyn BackendAdapter>,
        model: &str,
        context_window: u32,
        desired_output_cap: u32,
        system_prompt: &mut String,
        history: &mut Vec<Message>,
        tools_manifest: &[ToolDefinition],
    ) -> (String, Vec<String>) {
        let mut tools_used = Vec::new();

        for iteration in 0..self.config.max_tool_iterations {
            proxy_budget::trim_overflow(
                system_prompt,
                history,
                context_window,
                self.config.min_response_tokens,
            );
            let max_output = proxy_budget::dynamic_max_output(
                context_window,
                proxy_budget::tokens(system_prompt) + proxy_budget::messages_tokens(history),
                desired_output_cap,
                self.config.reserve_tokens,
            );

            let req = GenerateRequest {
                system_prompt: system_prompt.as_str(),
                history: history.as_slice(),
                tools: tools_manifest,
                model,
                max_output,
                temperature: 0.7,
            };

            match self.call_backend(primary, fallback, &req).await {
                Ok(GenerateOutcome::Final(text)) => {
                    let cleaned = text.trim();
                    if !cleaned.is_empty() {
                        return (cleaned.to_string(), tools_used);
                    }
                    // Empty reply still costs an iteration; a well-behaved
                    // backend should either answer or call a tool.
                }
                Ok(GenerateOutcome::ToolCalls(calls)) => {
                    let assistant_msg = premium::assistant_tool_call_message(&calls);
                    history.push(assistant_msg.clone());
                    self.sessions.append(caller_id, Role::Assistant, assistant_msg.content.clone(), false);

                    for call in &calls {
                        let outcome = self.tools.execute(&call.tool_name, call.params.clone()).await;
                        self.sessions.record_tool_call(caller_id);
                        tools_used.push(call.tool_name.clone());

                        let call_id = call.call_id.clone().unwrap_or_else(|| call.tool_name.clone());
                        let result_msg = premium::tool_result_message(&call_id, &outcome.text);
                        history.push(result_msg.clone());
                        self.sessions.append(caller_id, Role::Tool, result_msg.content.clone(), true);
                    }
                }
                Err(e) => {
                    warn!(error = %e, iteration, "agent loop: backend call failed");
                    return (format!("⚠️ backend error: {e}"), tools_used);
                }
            }
        }

        (ITERATION_LIMIT_TEXT.to_string(), tools_used)
    }

    /// Try `primary`. An auth error gives up immediately (retrying elsewhere
    /// won't fix bad credentials); a rate limit backs off once and is then
    /// surfaced rather than silently shifted to `fallback` (spec §7: "back
    /// off and surface"); any other retryable error (timeout, transport,
    /// 5xx) gets one shot at `fallback`; everything else surfaces as-is.
    async fn call_backend(
        &self,
        primary: &Arc<dyn BackendAdapter>,
        fallback: &Arc<dyn BackendAdapter>,
        req: &GenerateRequest<'_>,
    ) -> Result<GenerateOutcome, AdapterError> {
        match primary.generate(req).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_auth_error() => Err(e),
            Err(e) if e.is_rate_limited() => {
                warn!(backend = primary.name(), error = %e, "rate limited, backing off");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                Err(e)
            }
            Err(e) if e.is_retryable_elsewhere() => {
                warn!(backend = primary.name(), error = %e, "retrying on the other backend");
                fallback.generate(req).await
            }
            Err(e) => Err(e),
        }
    }

    /// Regex fact mining never blocks the reply — embedding and the store
    /// write happen off the critical path. The session's
    /// `facts_seen` dedup set is cloned in (so we don't re-extract a fact
    /// already mined earlier this session) and written back only for facts
    /// that were actually persisted.
    fn spawn_fact_extraction(&self, caller_id: &str, text: &str) {
        let session_id = self.sessions.with_session(caller_id, |s| s.id.clone());
        let mut seen = self.sessions.with_session(caller_id, |s| s.facts_seen.clone());
        let extractor = self.fact_extractor.clone();
        let sessions = self.sessions.clone();
        let caller_id = caller_id.to_string();
        let text = text.to_string();

        tokio::spawn(async move {
            match extractor.extract_and_save(&caller_id, &session_id, &text, &mut seen).await {
                Ok(facts) => {
                    for fact in facts {
                        sessions.dedupe_fact(&caller_id, &fact.content);
                    }
                }
                Err(e) => warn!(error = %e, "background fact extraction failed"),
            }
        });
    }

    /// Force a flush regardless of `needs_flush`. Returns `true` if a
    /// summary was actually produced and persisted.
    pub async fn force_flush(&self, caller_id: &str) -> bool {
        self.run_flush(caller_id).await
    }

    /// Summarize the session, persist the result, and compact the ring
    ///. Runs synchronously at turn start since it must finish
    /// before this turn's budget accounting sees the compacted session.
    async fn run_flush(&self, caller_id: &str) -> bool {
        let session_id = self.sessions.with_session(caller_id, |s| s.id.clone());
        let transcript = self.sessions.get_context(caller_id, usize::MAX);

        match self
            .flusher
            .flush(self.summarizer.as_ref(), caller_id, &session_id, &transcript)
            .await
        {
            Ok(_) => {
                self.sessions.compact(caller_id);
                info!(caller_id, "session flushed and compacted");
                true
            }
            Err(e) => {
                warn!(error = %e, "memory flush failed, continuing with the session as-is");
                false
            }
        }
    }
}
