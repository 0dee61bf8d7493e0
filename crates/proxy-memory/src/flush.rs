//! Session-flush summarization.
//!
//! Triggered when a session's token budget crosses `T_flush`. Produces an
//! LLM summary of "3-7 durable facts or NONE", appends it to the workspace,
//! and persists each bullet as a `flush`-typed memory. Decoupled from any
//! concrete backend adapter via [`Summarizer`] so this crate doesn't need to
//! depend on `proxy-agent`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use proxy_core::types::FactKind;
use proxy_retriever::{Embedder, MemoryRecord, VectorStore};

/// Confidence assigned to facts mined from a flush summary — lower than the
/// regex extractor's, since an LLM summary can hallucinate.
pub const FLUSH_FACT_CONFIDENCE: f32 = 0.7;

/// Instructs the summarizer to keep it short and low-temperature.
pub const FLUSH_PROMPT: &str = "Summarize the durable facts worth remembering from this \
conversation in 3-7 short bullet points (one fact per line, no numbering). If nothing is \
worth keeping, reply with exactly NONE.";

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("summarizer error: {0}")]
    Summarizer(String),
    #[error("vector store error: {0}")]
    Store(#[from] proxy_retriever::RetrieverError),
    #[error("workspace write failed: {0}")]
    Workspace(#[from] std::io::Error),
}

/// The minimal capability the flush path needs from an LLM backend. Kept
/// separate from `proxy_agent::BackendAdapter` so this crate has no
/// dependency on the orchestrator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<String, String>;
}

pub struct MemoryFlusher {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    workspace: Arc<proxy_workspace::WorkspaceLoader>,
}

impl MemoryFlusher {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        workspace: Arc<proxy_workspace::WorkspaceLoader>,
    ) -> Self {
        Self {
            store,
            embedder,
            workspace,
        }
    }

    /// Summarize `transcript`, persist the result, and return the bullets
    /// that were saved. Non-fatal on failure — callers should log and
    /// continue the turn.
    pub async fn flush(
        &self,
        summarizer: &dyn Summarizer,
        caller_id: &str,
        session_id: &str,
        transcript: &str,
    ) -> Result<Vec<String>, FlushError> {
        let summary = summarizer
            .summarize(transcript)
            .await
            .map_err(FlushError::Summarizer)?;

        let trimmed = summary.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            info!(caller_id, "flush summary was empty/NONE, nothing persisted");
            return Ok(Vec::new());
        }

        self.workspace.write_memory(trimmed, "Memory Flush").await?;

        let mut saved = Vec::new();
        for line in trimmed.lines() {
            let bullet = line.trim_start_matches(['-', '*', '•']).trim();
            if bullet.is_empty() {
                continue;
            }
            match self.embedder.embed(bullet).await {
                Ok(embedding) => {
                    self.store
                        .insert_memory(MemoryRecord {
                            caller_id: caller_id.to_string(),
                            content: bullet.to_string(),
                            embedding,
                            memory_type: FactKind::Fact.to_string(),
                            confidence: FLUSH_FACT_CONFIDENCE,
                            source_session_id: session_id.to_string(),
                        })
                        .await?;
                    saved.push(bullet.to_string());
                }
                Err(e) => warn!(error = %e, bullet, "embedding failed for flush bullet, skipping"),
            }
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _transcript: &str) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    struct RecordingStore {
        inserted: Mutex<Vec<MemoryRecord>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn search_memories(
            &self,
            _e: &[f32],
            _c: &str,
            _k: usize,
        ) -> Result<Vec<proxy_retriever::VectorHit>, proxy_retriever::RetrieverError> {
            Ok(vec![])
        }
        async fn search_conversations(
            &self,
            _e: &[f32],
            _c: &str,
            _k: usize,
        ) -> Result<Vec<proxy_retriever::VectorHit>, proxy_retriever::RetrieverError> {
            Ok(vec![])
        }
        async fn list_active_memories(
            &self,
            _limit: usize,
        ) -> Result<Vec<(String, String)>, proxy_retriever::RetrieverError> {
            Ok(vec![])
        }
        async fn list_conversations(
            &self,
            _limit: usize,
        ) -> Result<Vec<(String, String)>, proxy_retriever::RetrieverError> {
            Ok(vec![])
        }
        async fn insert_memory(&self, record: MemoryRecord) -> Result<(), proxy_retriever::RetrieverError> {
            self.inserted.lock().unwrap().push(record);
            Ok(())
        }
        async fn list_caller_memories(
            &self,
            _caller_id: &str,
            _limit: usize,
        ) -> Result<Vec<proxy_retriever::FactEntry>, proxy_retriever::RetrieverError> {
            Ok(vec![])
        }
    }

    struct ZeroEmbedder;

    #[async_trait]
    impl Embedder for ZeroEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, proxy_retriever::RetrieverError> {
            Ok(vec![0.0; 4])
        }
    }

    #[tokio::test]
    async fn none_summary_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let flusher = MemoryFlusher::new(
            Arc::new(RecordingStore {
                inserted: Mutex::new(Vec::new()),
            }),
            Arc::new(ZeroEmbedder),
            Arc::new(proxy_workspace::WorkspaceLoader::new(dir.path())),
        );
        let saved = flusher
            .flush(&FixedSummarizer("NONE"), "owner", "sess-1", "irrelevant chit-chat")
            .await
            .unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn bullet_summary_persists_each_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore {
            inserted: Mutex::new(Vec::new()),
        });
        let flusher = MemoryFlusher::new(
            store.clone(),
            Arc::new(ZeroEmbedder),
            Arc::new(proxy_workspace::WorkspaceLoader::new(dir.path())),
        );
        let saved = flusher
            .flush(
                &FixedSummarizer("- likes tea\n- building a proxy"),
                "owner",
                "sess-1",
                "transcript",
            )
            .await
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(store.inserted.lock().unwrap().len(), 2);
    }
}
