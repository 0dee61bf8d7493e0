//! Fused vector + lexical retrieval with a per-caller security boundary.
//!
//! The vector DB and embedding model are external collaborators; this crate
//! only defines the interfaces the core depends on ([`VectorStore`],
//! [`Embedder`]) plus the fusion algorithm itself ([`HybridRetriever`]).

use async_trait::async_trait;
use proxy_lexical::BM25Index;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("vector store error: {0}")]
    VectorStore(String),
    #[error("embedding error: {0}")]
    Embedding(String),
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub content: String,
    pub similarity: f32,
}

/// A record to persist into the memories collection (see spec §3 Memory).
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub caller_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub memory_type: String,
    pub confidence: f32,
    pub source_session_id: String,
}

/// A persisted memory/fact read back for display (e.g. `GET /session/{id}`),
/// deliberately without its embedding — callers displaying facts never need
/// the vector.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FactEntry {
    pub content: String,
    pub memory_type: String,
    pub confidence: f32,
    pub active: bool,
    pub created_at: String,
}

/// The vector DB's schema-level interface. Implementations own the actual
/// client (Qdrant, Milvus, ...); the core never talks HTTP/gRPC directly.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search_memories(
        &self,
        embedding: &[f32],
        caller_id: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, RetrieverError>;

    async fn search_conversations(
        &self,
        embedding: &[f32],
        caller_id: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, RetrieverError>;

    /// All currently-active memory records, bounded by `limit` — feeds the
    /// lexical index rebuild.
    async fn list_active_memories(&self, limit: usize) -> Result<Vec<(String, String)>, RetrieverError>;

    /// All conversation records, bounded by `limit` — feeds the lexical
    /// index rebuild.
    async fn list_conversations(&self, limit: usize) -> Result<Vec<(String, String)>, RetrieverError>;

    async fn insert_memory(&self, record: MemoryRecord) -> Result<(), RetrieverError>;

    /// All memory records belonging to `caller_id`, most recent first —
    /// feeds `GET /session/{caller_id}`'s fact listing.
    async fn list_caller_memories(
        &self,
        caller_id: &str,
        limit: usize,
    ) -> Result<Vec<FactEntry>, RetrieverError>;
}

/// The embedding adapter's interface — deliberately minimal since the model
/// itself is out of scope.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrieverError>;
}

/// Owns the lexical index and knows how to rebuild it from the vector store's
/// current snapshot.
pub struct LexicalIndexManager {
    index: RwLock<BM25Index>,
}

impl Default for LexicalIndexManager {
    fn default() -> Self {
        Self {
            index: RwLock::new(BM25Index::build(Vec::new())),
        }
    }
}

impl LexicalIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rebuild(&self, store: &dyn VectorStore) -> Result<usize, RetrieverError> {
        let memories = store.list_active_memories(1000).await.unwrap_or_else(|e| {
            warn!(error = %e, "BM25 rebuild: memories fetch failed");
            Vec::new()
        });
        let conversations = store.list_conversations(500).await.unwrap_or_else(|e| {
            warn!(error = %e, "BM25 rebuild: conversations fetch failed");
            Vec::new()
        });

        let mut docs = Vec::with_capacity(memories.len() + conversations.len());
        for (id, content) in memories {
            docs.push(("memories".to_string(), id, content));
        }
        for (id, content) in conversations {
            docs.push(("conversations".to_string(), id, content));
        }

        let count = docs.len();
        let built = BM25Index::build(docs);
        *self.index.write().unwrap() = built;
        Ok(count)
    }

    pub fn doc_count(&self) -> usize {
        self.index.read().unwrap().doc_count()
    }

    fn search(&self, query: &str, top_k: usize) -> Vec<proxy_lexical::SearchHit> {
        self.index.read().unwrap().search(query, top_k)
    }
}

/// Interrogative words that, along with a literal `?`, gate when the
/// retriever runs at all.
const INTERROGATIVES: &[&str] = &[
    "что", "кто", "где", "когда", "почему", "зачем", "какой", "какая", "какое", "сколько", "как",
];

/// Whether a user turn should trigger retrieval at all.
pub fn should_retrieve(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    let lower = text.to_lowercase();
    lower
        .split_whitespace()
        .any(|w| INTERROGATIVES.contains(&w.trim_matches(|c: char| !c.is_alphanumeric())))
}

pub struct HybridRetriever {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    lexical: Arc<LexicalIndexManager>,
    owner_id: String,
    vector_weight: f32,
    bm25_weight: f32,
}

impl HybridRetriever {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        lexical: Arc<LexicalIndexManager>,
        owner_id: impl Into<String>,
        vector_weight: f32,
        bm25_weight: f32,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            lexical,
            owner_id: owner_id.into(),
            vector_weight,
            bm25_weight,
        }
    }

    pub fn lexical(&self) -> &Arc<LexicalIndexManager> {
        &self.lexical
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Rebuild the lexical index from the current vector store snapshot
    ///.
    pub async fn rebuild_lexical(&self) -> Result<usize, RetrieverError> {
        self.lexical.rebuild(self.vector_store.as_ref()).await
    }

    /// Facts/memories persisted for `caller_id`, most recent first.
    pub async fn caller_facts(&self, caller_id: &str, limit: usize) -> Result<Vec<FactEntry>, RetrieverError> {
        self.vector_store.list_caller_memories(caller_id, limit).await
    }

    /// Fused search for `query` on behalf of `caller_id`. Side-effect free:
    /// never writes to any store. Lexical search only runs for the owner.
    pub async fn search(
        &self,
        query: &str,
        caller_id: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrieverError> {
        let mut scores: Vec<(String, f32)> = Vec::new();

        match self.embedder.embed(query).await {
            Ok(embedding) => {
                match self
                    .vector_store
                    .search_memories(&embedding, caller_id, top_k)
                    .await
                {
                    Ok(hits) => accumulate(&mut scores, hits, self.vector_weight),
                    Err(e) => warn!(error = %e, "memory vector search failed"),
                }

                match self
                    .vector_store
                    .search_conversations(&embedding, caller_id, top_k)
                    .await
                {
                    // Conversations contribute at half vector weight — they are
                    // noisier recall than curated memory facts.
                    Ok(hits) => accumulate(&mut scores, hits, self.vector_weight * 0.5),
                    Err(e) => warn!(error = %e, "conversation vector search failed"),
                }
            }
            Err(e) => warn!(error = %e, "query embedding failed, vector search skipped"),
        }

        // Lexical recall is gated to the owner only: it can surface
        // substring-level matches across the owner's whole memory and must
        // never leak to other callers.
        if caller_id == self.owner_id {
            let bm25_hits = self.lexical.search(query, top_k * 2);
            if !bm25_hits.is_empty() {
                let max_score = bm25_hits.iter().map(|h| h.score).fold(0.0_f64, f64::max);
                for hit in bm25_hits {
                    let normalized = if max_score > 0.0 {
                        (hit.score / max_score) as f32
                    } else {
                        0.0
                    };
                    add_score(&mut scores, hit.content, normalized * self.bm25_weight);
                }
            }
        }

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scores.truncate(top_k);
        Ok(scores.into_iter().map(|(content, _)| content).collect())
    }
}

fn accumulate(scores: &mut Vec<(String, f32)>, hits: Vec<VectorHit>, weight: f32) {
    for hit in hits {
        add_score(scores, hit.content, hit.similarity * weight);
    }
}

fn add_score(scores: &mut Vec<(String, f32)>, content: String, delta: f32) {
    if let Some(entry) = scores.iter_mut().find(|(c, _)| *c == content) {
        entry.1 += delta;
    } else {
        scores.push((content, delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStore {
        mem: Vec<VectorHit>,
        conv: Vec<VectorHit>,
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn search_memories(
            &self,
            _embedding: &[f32],
            _caller_id: &str,
            _top_k: usize,
        ) -> Result<Vec<VectorHit>, RetrieverError> {
            Ok(self.mem.clone())
        }

        async fn search_conversations(
            &self,
            _embedding: &[f32],
            _caller_id: &str,
            _top_k: usize,
        ) -> Result<Vec<VectorHit>, RetrieverError> {
            Ok(self.conv.clone())
        }

        async fn list_active_memories(&self, _limit: usize) -> Result<Vec<(String, String)>, RetrieverError> {
            Ok(vec![])
        }

        async fn list_conversations(&self, _limit: usize) -> Result<Vec<(String, String)>, RetrieverError> {
            Ok(vec![])
        }

        async fn insert_memory(&self, _record: MemoryRecord) -> Result<(), RetrieverError> {
            Ok(())
        }

        async fn list_caller_memories(
            &self,
            _caller_id: &str,
            _limit: usize,
        ) -> Result<Vec<FactEntry>, RetrieverError> {
            Ok(vec![])
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrieverError> {
            Ok(vec![0.0; 4])
        }
    }

    #[test]
    fn gating_triggers_on_question_mark_or_interrogative() {
        assert!(should_retrieve("what is this?"));
        assert!(should_retrieve("что ты помнишь обо мне"));
        assert!(!should_retrieve("привет как дела"));
    }

    #[tokio::test]
    async fn non_owner_gets_vector_only_results() {
        let store = Arc::new(FakeStore {
            mem: vec![VectorHit {
                content: "owner memory".to_string(),
                similarity: 0.9,
            }],
            conv: vec![],
        });
        let lexical = Arc::new(LexicalIndexManager::new());
        lexical
            .rebuild(&*(store.clone() as Arc<dyn VectorStore>))
            .await
            .unwrap();

        let retriever = HybridRetriever::new(
            store.clone(),
            Arc::new(FakeEmbedder),
            lexical,
            "owner",
            0.7,
            0.3,
        );

        let results = retriever.search("anything", "guest42", 5).await.unwrap();
        assert_eq!(results, vec!["owner memory".to_string()]);
    }
}
