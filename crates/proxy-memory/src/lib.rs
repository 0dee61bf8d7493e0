//! Regex-driven fact extraction from user turns, persisted to the vector
//! store as durable memories.

pub mod error;
pub mod flush;
pub mod patterns;

pub use flush::{FlushError, MemoryFlusher, Summarizer};

use proxy_core::types::{Fact, FactKind};
use proxy_retriever::{Embedder, MemoryRecord, VectorStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub use error::MemoryError;

/// Confidence assigned to every regex-extracted fact. Facts volunteered this
/// way are treated as provisional next to anything the owner states directly
/// through `/workspace` writes.
pub const EXTRACTED_FACT_CONFIDENCE: f32 = 0.8;

pub struct FactExtractor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl FactExtractor {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Scan `text` against every fact pattern and return the candidate facts
    /// found, without touching the store. `seen` is a per-session dedup set
    /// of exact fact content — callers persist it across turns and pass it
    /// back in so the same fact isn't re-extracted twice in one session.
    pub fn candidates(
        &self,
        caller_id: &str,
        session_id: &str,
        text: &str,
        seen: &mut HashSet<String>,
    ) -> Vec<Fact> {
        let mut facts = Vec::new();
        for pattern in patterns::fact_patterns() {
            let Some(captures) = pattern.regex.captures(text) else {
                continue;
            };
            let Some(value) = captures.get(1) else {
                continue;
            };
            let content = pattern.template.replacen("{}", value.as_str().trim(), 1);
            if !seen.insert(content.clone()) {
                continue;
            }
            debug!(caller_id, kind = %pattern.kind, "fact extracted");
            facts.push(Fact::new(
                caller_id,
                pattern.kind,
                content,
                EXTRACTED_FACT_CONFIDENCE,
                session_id,
            ));
        }
        facts
    }

    /// Extract facts from `text` and persist any new ones to the vector
    /// store. Returns the facts that were actually saved.
    pub async fn extract_and_save(
        &self,
        caller_id: &str,
        session_id: &str,
        text: &str,
        seen: &mut HashSet<String>,
    ) -> Result<Vec<Fact>, MemoryError> {
        let facts = self.candidates(caller_id, session_id, text, seen);
        for fact in &facts {
            let embedding = self.embedder.embed(&fact.content).await?;
            self.store
                .insert_memory(MemoryRecord {
                    caller_id: fact.caller_id.clone(),
                    content: fact.content.clone(),
                    embedding,
                    memory_type: fact.kind.to_string(),
                    confidence: fact.confidence,
                    source_session_id: fact.source_session_id.clone(),
                })
                .await?;
        }
        Ok(facts)
    }
}

/// A durable fact produced directly (not regex-mined), e.g. by the memory
/// flush summarizer. Confidence is set by the caller.
pub async fn save_fact(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    caller_id: &str,
    kind: FactKind,
    content: &str,
    confidence: f32,
    session_id: &str,
) -> Result<(), MemoryError> {
    let embedding = embedder.embed(content).await?;
    store
        .insert_memory(MemoryRecord {
            caller_id: caller_id.to_string(),
            content: content.to_string(),
            embedding,
            memory_type: kind.to_string(),
            confidence,
            source_session_id: session_id.to_string(),
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

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
    async fn extracts_and_saves_preference_fact() {
        let store = Arc::new(RecordingStore {
            inserted: Mutex::new(Vec::new()),
        });
        let extractor = FactExtractor::new(store.clone(), Arc::new(ZeroEmbedder));
        let mut seen = HashSet::new();

        let saved = extractor
            .extract_and_save("owner", "sess-1", "i like hiking on weekends", &mut seen)
            .await
            .unwrap();

        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].kind, FactKind::Preference);
        assert_eq!(store.inserted.lock().unwrap().len(), 1);
    }

    #[test]
    fn same_fact_is_not_extracted_twice_in_one_session() {
        let store = Arc::new(RecordingStore {
            inserted: Mutex::new(Vec::new()),
        });
        let extractor = FactExtractor::new(store, Arc::new(ZeroEmbedder));
        let mut seen = HashSet::new();

        let first = extractor.candidates("owner", "sess-1", "my name is Nadia", &mut seen);
        let second = extractor.candidates("owner", "sess-1", "my name is Nadia", &mut seen);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn unrelated_text_yields_no_facts() {
        let store = Arc::new(RecordingStore {
            inserted: Mutex::new(Vec::new()),
        });
        let extractor = FactExtractor::new(store, Arc::new(ZeroEmbedder));
        let mut seen = HashSet::new();
        assert!(extractor
            .candidates("owner", "sess-1", "what time is it", &mut seen)
            .is_empty());
    }
}
