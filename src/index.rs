//! In-memory document index.
//!
//! Holds the embedded chunks of one upload and answers nearest-neighbour
//! queries by brute-force cosine similarity. An index is immutable once
//! built: a new upload builds a new index which the caller swaps in whole.

use anyhow::{bail, Result};

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{Chunk, ScoredChunk};

struct IndexEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

pub struct DocumentIndex {
    entries: Vec<IndexEntry>,
    model: String,
    dims: usize,
}

impl DocumentIndex {
    /// Embed every chunk and build a fresh index.
    ///
    /// Texts are sent to the embedder `batch_size` at a time. Fails if the
    /// embedder fails, returns the wrong number of vectors, or returns
    /// vectors of differing dimension.
    pub async fn build(
        embedder: &dyn Embedder,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self> {
        if chunks.is_empty() {
            bail!("cannot build an index from zero chunks");
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                bail!(
                    "embedder returned {} vectors for {} chunks",
                    embedded.len(),
                    texts.len()
                );
            }
            vectors.extend(embedded);
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dims == 0 {
            bail!("embedder returned empty vectors");
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "inconsistent embedding dimensions: expected {}, got {}",
                dims,
                bad.len()
            );
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { vector, chunk })
            .collect();

        Ok(Self {
            entries,
            model: embedder.model_name().to_string(),
            dims,
        })
    }

    /// Embed `text` and return the `k` most similar chunks, best first.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let vector = embed_query(embedder, text).await?;
        if vector.len() != self.dims {
            bail!(
                "query embedding has {} dimensions, index has {}",
                vector.len(),
                self.dims
            );
        }
        Ok(self.search(&vector, k))
    }

    /// Nearest-neighbour search over already-embedded `vector`.
    pub fn search(&self, vector: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding model the index was built with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Source filename of the indexed document.
    pub fn source(&self) -> Option<&str> {
        self.entries.first().map(|e| e.chunk.source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Embeds text as letter counts for a fixed alphabet subset.
    struct LetterEmbedder {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    fn letters(text: &str) -> Vec<f32> {
        "aeioupst"
            .chars()
            .map(|c| text.to_lowercase().matches(c).count() as f32)
            .collect()
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().push(texts.to_vec());
            Ok(texts.iter().map(|t| letters(t)).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "missing"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("connection refused")
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", index),
            source: "doc.txt".to_string(),
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn build_batches_embedding_calls() {
        let embedder = LetterEmbedder::new();
        let chunks = (0..5).map(|i| chunk(i, "some text")).collect();
        let index = DocumentIndex::build(&embedder, chunks, 2).await.unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.model(), "letters");
        assert_eq!(index.dims(), 8);
        assert_eq!(index.source(), Some("doc.txt"));
        let sizes: Vec<usize> = embedder.calls.lock().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn query_ranks_most_similar_first() {
        let embedder = LetterEmbedder::new();
        let chunks = vec![
            chunk(0, "zzz"),
            chunk(1, "Paris is the capital"),
            chunk(2, "aaaa"),
        ];
        let index = DocumentIndex::build(&embedder, chunks, 8).await.unwrap();
        let hits = index
            .query(&embedder, "Paris is the capital", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_index, 1);
        assert!(hits[0].score > hits[1].score);
        // the query itself went through the embedder
        let last_call = embedder.calls.lock().last().cloned().unwrap();
        assert_eq!(last_call, vec!["Paris is the capital".to_string()]);
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_everything() {
        let embedder = LetterEmbedder::new();
        let index = DocumentIndex::build(&embedder, vec![chunk(0, "pie")], 8)
            .await
            .unwrap();
        assert_eq!(index.search(&letters("pie"), 10).len(), 1);
    }

    #[tokio::test]
    async fn build_propagates_embedder_failure() {
        let err = DocumentIndex::build(&FailingEmbedder, vec![chunk(0, "x")], 8)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn build_rejects_empty_input() {
        let embedder = LetterEmbedder::new();
        assert!(DocumentIndex::build(&embedder, Vec::new(), 8).await.is_err());
    }
}
