//! Chunk index: the retrieval capability behind the Answerer.
//!
//! [`ChunkIndex`] is the seam; [`InMemoryIndex`] is a brute-force
//! implementation built once per upload batch and read-only afterwards.
//! With an embedding provider it ranks by cosine similarity between the
//! query vector and each chunk vector. Without one it ranks by keyword
//! overlap: the fraction of distinct query terms that occur in the chunk.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};
use crate::models::Chunk;

/// A retrieved chunk with its relevance under the index's own metric.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Up to `k` chunks, best first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct IndexedChunk {
    chunk: Chunk,
    vector: Option<Vec<f32>>,
    terms: HashSet<String>,
}

pub struct InMemoryIndex {
    entries: Vec<IndexedChunk>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl InMemoryIndex {
    /// Index `chunks`, embedding them in batches of `batch_size` when an
    /// embedder is given.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        batch_size: usize,
    ) -> Result<Self> {
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());

        match &embedder {
            Some(provider) => {
                for batch in chunks.chunks(batch_size.max(1)) {
                    let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                    let embedded = provider.embed(&texts).await?;
                    if embedded.len() != texts.len() {
                        bail!(
                            "Embedding provider returned {} vectors for {} chunks",
                            embedded.len(),
                            texts.len()
                        );
                    }
                    vectors.extend(embedded.into_iter().map(Some));
                }
                tracing::info!(
                    chunks = chunks.len(),
                    model = provider.model_name(),
                    "Built vector index"
                );
            }
            None => {
                vectors.resize(chunks.len(), None);
                tracing::info!(chunks = chunks.len(), "Built keyword index");
            }
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk {
                terms: terms(&chunk.text),
                chunk,
                vector,
            })
            .collect();

        Ok(Self { entries, embedder })
    }

    fn rank(&self, scores: impl Iterator<Item = (usize, f32)>, k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = scores.collect();
        // Stable sort keeps index order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }
}

#[async_trait]
impl ChunkIndex for InMemoryIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let results = match &self.embedder {
            Some(provider) => {
                let query_vec = embed_query(provider.as_ref(), query).await?;
                self.rank(
                    self.entries.iter().enumerate().filter_map(|(i, e)| {
                        e.vector
                            .as_ref()
                            .map(|v| (i, cosine_similarity(&query_vec, v)))
                    }),
                    k,
                )
            }
            None => {
                let query_terms = terms(query);
                if query_terms.is_empty() {
                    return Ok(Vec::new());
                }
                let total = query_terms.len() as f32;
                self.rank(
                    self.entries.iter().enumerate().filter_map(|(i, e)| {
                        let hits = query_terms.intersection(&e.terms).count();
                        (hits > 0).then(|| (i, hits as f32 / total))
                    }),
                    k,
                )
            }
        };

        tracing::debug!(k, hits = results.len(), "Index search");
        Ok(results)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Lowercased alphanumeric words of at least two characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(|w| w.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_documents, ChunkParams};
    use crate::models::Document;

    /// Two-dimensional embedding: (mentions payment, mentions termination).
    struct TopicEmbedder;

    #[async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        fn model_name(&self) -> &str {
            "topic"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("pay") { 1.0 } else { 0.0 },
                        if t.contains("terminat") { 1.0 } else { 0.0 },
                    ]
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    fn chunks() -> Vec<Chunk> {
        let docs = vec![
            Document::new("a.pdf", "Client shall pay all invoices within 30 days."),
            Document::new("b.pdf", "Either party may terminate on 60 days notice."),
            Document::new("c.pdf", "This agreement is governed by Delaware law."),
        ];
        chunk_documents(&docs, &ChunkParams::default())
    }

    #[tokio::test]
    async fn test_vector_search_best_first() {
        let index = InMemoryIndex::build(chunks(), Some(Arc::new(TopicEmbedder)), 2)
            .await
            .unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search("How do I terminate?", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.source, "b.pdf");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_keyword_search_ranks_by_overlap() {
        let index = InMemoryIndex::build(chunks(), None, 64).await.unwrap();
        let hits = index.search("When must the client pay invoices?", 5).await.unwrap();
        assert_eq!(hits[0].chunk.source, "a.pdf");
        assert!(hits.iter().all(|h| h.score > 0.0));
    }

    #[tokio::test]
    async fn test_keyword_search_no_overlap() {
        let index = InMemoryIndex::build(chunks(), None, 64).await.unwrap();
        assert!(index.search("xyzzy", 5).await.unwrap().is_empty());
        assert!(index.search("?!", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_k_bounds_results() {
        let index = InMemoryIndex::build(chunks(), Some(Arc::new(TopicEmbedder)), 64)
            .await
            .unwrap();
        assert_eq!(index.search("pay", 10).await.unwrap().len(), 3);
        assert!(index.search("pay", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_index() {
        let index = InMemoryIndex::build(Vec::new(), None, 64).await.unwrap();
        assert!(index.is_empty());
        assert!(index.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_is_error() {
        let err = InMemoryIndex::build(chunks(), Some(Arc::new(ShortEmbedder)), 64)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("returned 1 vectors for 3 chunks"));
    }
}
