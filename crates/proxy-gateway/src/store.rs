//! SQLite-backed [`VectorStore`] and a deterministic [`Embedder`] stand-in.
//!
//! The vector DB and embedding model are external collaborators outside
//! this crate's scope — nothing here is meant to be a production embedding
//! pipeline. It exists so the composition root has a concrete, runnable
//! implementation of the two traits `proxy-retriever` defines: a
//! `Mutex<Connection>`, a hand-rolled schema, plain `rusqlite::params!`
//! queries. Embeddings are a small hashed bag-of-trigrams vector — cheap,
//! deterministic, and good enough to make cosine similarity meaningful for
//! near-duplicate text, without pulling in a real model.

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;

use proxy_retriever::{Embedder, FactEntry, MemoryRecord, RetrieverError, VectorHit, VectorStore};

/// Dimensionality of the hashed embedding space.
const EMBED_DIM: usize = 256;

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=3000;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            caller_id   TEXT NOT NULL,
            content     TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            memory_type TEXT NOT NULL,
            confidence  REAL NOT NULL,
            source_session_id TEXT NOT NULL,
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memories_caller ON memories(caller_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            caller_id  TEXT NOT NULL,
            content    TEXT NOT NULL,
            embedding  BLOB NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_caller ON conversations(caller_id);",
    )
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn top_k_by_similarity(query: &[f32], rows: Vec<(String, Vec<u8>)>, top_k: usize) -> Vec<VectorHit> {
    let mut scored: Vec<VectorHit> = rows
        .into_iter()
        .map(|(content, blob)| VectorHit {
            similarity: cosine(query, &decode_embedding(&blob)),
            content,
        })
        .collect();
    scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    scored.truncate(top_k);
    scored
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn search_memories(
        &self,
        embedding: &[f32],
        caller_id: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, RetrieverError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT content, embedding FROM memories WHERE caller_id = ?1 AND active = 1")
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![caller_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        Ok(top_k_by_similarity(embedding, rows, top_k))
    }

    async fn search_conversations(
        &self,
        embedding: &[f32],
        caller_id: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, RetrieverError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT content, embedding FROM conversations WHERE caller_id = ?1")
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![caller_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        Ok(top_k_by_similarity(embedding, rows, top_k))
    }

    async fn list_active_memories(&self, limit: usize) -> Result<Vec<(String, String)>, RetrieverError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, content FROM memories WHERE active = 1 ORDER BY id DESC LIMIT ?1")
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        stmt.query_map(rusqlite::params![limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?.to_string(), row.get::<_, String>(1)?))
        })
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<(String, String)>, RetrieverError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, content FROM conversations ORDER BY id DESC LIMIT ?1")
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        stmt.query_map(rusqlite::params![limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?.to_string(), row.get::<_, String>(1)?))
        })
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))
    }

    async fn insert_memory(&self, record: MemoryRecord) -> Result<(), RetrieverError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO memories (caller_id, content, embedding, memory_type, confidence, source_session_id, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            rusqlite::params![
                record.caller_id,
                record.content,
                encode_embedding(&record.embedding),
                record.memory_type,
                record.confidence,
                record.source_session_id,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        Ok(())
    }

    async fn list_caller_memories(&self, caller_id: &str, limit: usize) -> Result<Vec<FactEntry>, RetrieverError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT content, memory_type, confidence, active, created_at FROM memories \
                 WHERE caller_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| RetrieverError::VectorStore(e.to_string()))?;
        stmt.query_map(rusqlite::params![caller_id, limit as i64], |row| {
            Ok(FactEntry {
                content: row.get(0)?,
                memory_type: row.get(1)?,
                confidence: row.get(2)?,
                active: row.get::<_, i64>(3)? != 0,
                created_at: row.get(4)?,
            })
        })
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RetrieverError::VectorStore(e.to_string()))
    }
}

/// Deterministic character-trigram hashing embedder. Not a semantic model —
/// just enough structure for cosine similarity to reward shared substrings,
/// so retrieval/memory tests exercise real ranking behavior offline.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrieverError> {
        let lower = text.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let mut vector = vec![0.0f32; EMBED_DIM];

        if chars.len() < 3 {
            if let Some(idx) = hash_bucket(&lower) {
                vector[idx] += 1.0;
            }
            return Ok(vector);
        }

        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            if let Some(idx) = hash_bucket(&trigram) {
                vector[idx] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

fn hash_bucket(s: &str) -> Option<usize> {
    if s.is_empty() {
        return None;
    }
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    Some((hasher.finish() as usize) % EMBED_DIM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let embedder = HashEmbedder;
        let a = embedder.embed("the user likes hiking").await.unwrap();
        let b = embedder.embed("the user likes hiking").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn similar_text_scores_higher_than_unrelated_text() {
        let embedder = HashEmbedder;
        let base = embedder.embed("the user likes hiking on weekends").await.unwrap();
        let similar = embedder.embed("the user likes hiking on weekdays").await.unwrap();
        let unrelated = embedder.embed("quarterly tax filing deadline").await.unwrap();

        assert!(cosine(&base, &similar) > cosine(&base, &unrelated));
    }

    #[tokio::test]
    async fn insert_then_search_memories_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteVectorStore::open(db_path.to_str().unwrap()).unwrap();
        let embedder = HashEmbedder;

        let embedding = embedder.embed("owner likes tea").await.unwrap();
        store
            .insert_memory(MemoryRecord {
                caller_id: "owner".to_string(),
                content: "owner likes tea".to_string(),
                embedding: embedding.clone(),
                memory_type: "preference".to_string(),
                confidence: 0.8,
                source_session_id: "sess-1".to_string(),
            })
            .await
            .unwrap();

        let hits = store.search_memories(&embedding, "owner", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "owner likes tea");
    }
}
