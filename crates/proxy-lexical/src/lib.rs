//! A small in-process Okapi BM25 index over memory and conversation
//! snippets. Rebuilt on startup and on explicit request — there is no
//! incremental update path, matching the bulk-rebuild semantics the proxy's
//! memory store expects.

use std::collections::HashMap;
use tracing::info;

const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Tokens shorter than this are dropped — filters stopword-ish noise without
/// a stopword list.
const MIN_TOKEN_LEN: usize = 3;

/// Tokenize: lowercase, strip punctuation, split on whitespace, drop short
/// tokens. Works on any script, not just Cyrillic — the original's `_ru`
/// naming reflected its primary corpus, not a hard language restriction.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let cleaned: String = lower
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .map(|w| w.to_string())
        .collect()
}

/// Where a document came from — used to scope a result back to its source
/// record for provenance in the retriever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

struct Doc {
    content: String,
    doc_ref: DocRef,
    tokens: Vec<String>,
    len: usize,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub content: String,
    pub doc_ref: DocRef,
    pub score: f64,
}

/// A BM25 index built from a fixed document snapshot. Query with
/// [`BM25Index::search`]; rebuild with [`BM25Index::build`].
pub struct BM25Index {
    docs: Vec<Doc>,
    avg_doc_len: f64,
    doc_freq: HashMap<String, usize>,
}

impl BM25Index {
    /// Build an index from `(collection, id, content)` triples.
    pub fn build(documents: Vec<(String, String, String)>) -> Self {
        let mut docs = Vec::with_capacity(documents.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for (collection, id, content) in documents {
            let tokens = tokenize(&content);
            let len = tokens.len();
            total_len += len;

            let mut seen = std::collections::HashSet::new();
            for t in &tokens {
                if seen.insert(t.clone()) {
                    *doc_freq.entry(t.clone()).or_insert(0) += 1;
                }
            }

            docs.push(Doc {
                content,
                doc_ref: DocRef { collection, id },
                tokens,
                len,
            });
        }

        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / docs.len() as f64
        };

        info!(documents = docs.len(), "BM25 index built");

        Self {
            docs,
            avg_doc_len,
            doc_freq,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.docs.len() as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        // Okapi BM25 idf with the +1 smoothing that keeps it non-negative
        // for terms appearing in every document.
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, query_tokens: &[String], doc: &Doc) -> f64 {
        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for t in &doc.tokens {
            *term_freq.entry(t.as_str()).or_insert(0) += 1;
        }

        query_tokens
            .iter()
            .map(|qt| {
                let tf = *term_freq.get(qt.as_str()).unwrap_or(&0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let idf = self.idf(qt);
                let denom = tf + K1 * (1.0 - B + B * (doc.len as f64 / self.avg_doc_len.max(1.0)));
                idf * (tf * (K1 + 1.0)) / denom
            })
            .sum()
    }

    /// Return the top-`top_k` documents by BM25 score, highest first. Zero
    /// and negative scores are dropped.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if self.docs.is_empty() {
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<SearchHit> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score = self.score(&query_tokens, doc);
                if score > 0.0 {
                    Some(SearchHit {
                        content: doc.content.clone(),
                        doc_ref: doc.doc_ref.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_short_tokens_and_punctuation() {
        let tokens = tokenize("I am, ok? Running tests!");
        assert_eq!(tokens, vec!["running", "tests"]);
    }

    #[test]
    fn search_ranks_more_relevant_doc_higher() {
        let index = BM25Index::build(vec![
            (
                "memories".to_string(),
                "1".to_string(),
                "user loves hiking in the mountains every weekend".to_string(),
            ),
            (
                "memories".to_string(),
                "2".to_string(),
                "user works as a software engineer".to_string(),
            ),
        ]);

        let hits = index.search("hiking mountains", 5);
        assert_eq!(hits[0].doc_ref.id, "1");
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = BM25Index::build(vec![]);
        assert!(index.search("anything", 5).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn rebuild_is_idempotent_given_fixed_snapshot() {
        let snapshot = vec![(
            "memories".to_string(),
            "1".to_string(),
            "deterministic content for testing".to_string(),
        )];
        let a = BM25Index::build(snapshot.clone());
        let b = BM25Index::build(snapshot);
        assert_eq!(
            a.search("deterministic", 5)[0].score,
            b.search("deterministic", 5)[0].score
        );
    }
}
