//! Nearest-neighbor retrieval over historical ticket embeddings

use std::sync::Arc;

use crate::model::HistoricalTicket;
use crate::service::error::PipelineError;
use crate::service::llm::EmbeddingCapability;

/// A retrieved ticket with its cosine similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredTicket {
    pub ticket: Arc<HistoricalTicket>,
    pub similarity: f64,
}

/// Vector index over the corpus
///
/// Implementations must return results ordered by non-increasing similarity,
/// keeping corpus order among equal scores.
pub trait NeighborIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding length every indexed ticket has
    fn dimension(&self) -> Option<usize>;

    fn nearest(&self, query: &[f64], k: usize) -> Vec<ScoredTicket>;
}

/// Exact O(n·d) scan
pub struct BruteForceIndex {
    tickets: Vec<Arc<HistoricalTicket>>,
    dimension: Option<usize>,
}

impl BruteForceIndex {
    /// Index the tickets, excluding any whose embedding is unusable
    ///
    /// The expected dimension is `expected_dimension` when given, otherwise
    /// the length of the first non-empty embedding in corpus order.
    pub fn build(tickets: Vec<HistoricalTicket>, expected_dimension: Option<usize>) -> Self {
        let dimension = expected_dimension.or_else(|| {
            tickets
                .iter()
                .map(|t| t.embedding.len())
                .find(|len| *len > 0)
        });

        let total = tickets.len();
        let mut indexed = Vec::with_capacity(total);
        for ticket in tickets {
            if Some(ticket.embedding.len()) != dimension {
                tracing::warn!(
                    ticket_id = %ticket.ticket_id,
                    expected = ?dimension,
                    actual = ticket.embedding.len(),
                    "Excluding ticket with mismatched embedding dimension"
                );
                continue;
            }
            if ticket.embedding.iter().any(|x| !x.is_finite()) {
                tracing::warn!(
                    ticket_id = %ticket.ticket_id,
                    "Excluding ticket with non-finite embedding values"
                );
                continue;
            }
            indexed.push(Arc::new(ticket));
        }

        tracing::info!(
            total = total,
            indexed = indexed.len(),
            dimension = ?dimension,
            "Built brute-force neighbor index"
        );

        Self {
            tickets: indexed,
            dimension,
        }
    }
}

impl NeighborIndex for BruteForceIndex {
    fn len(&self) -> usize {
        self.tickets.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn nearest(&self, query: &[f64], k: usize) -> Vec<ScoredTicket> {
        let mut scored: Vec<ScoredTicket> = self
            .tickets
            .iter()
            .map(|ticket| ScoredTicket {
                similarity: cosine_similarity(query, &ticket.embedding),
                ticket: Arc::clone(ticket),
            })
            .collect();

        // sort_by is stable, so ties keep corpus order
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity in [-1, 1]; zero for zero-norm or mismatched vectors
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Embeds query text and searches the neighbor index
pub struct EmbeddingStore {
    embedder: Arc<dyn EmbeddingCapability>,
    index: Arc<dyn NeighborIndex>,
}

impl EmbeddingStore {
    pub fn new(embedder: Arc<dyn EmbeddingCapability>, index: Arc<dyn NeighborIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The `k` most similar tickets, most similar first
    ///
    /// Returns every ticket when `k` exceeds the corpus size, and an empty
    /// list without calling the embedder when the store is empty or `k` is 0.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredTicket>, PipelineError> {
        if k == 0 || self.index.is_empty() {
            tracing::debug!(k = k, corpus_size = self.index.len(), "Skipping neighbor query");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(text).await?;
        self.query_vector(&vector, k)
    }

    /// Same as [`EmbeddingStore::query`] for an already computed vector
    pub fn query_vector(&self, vector: &[f64], k: usize) -> Result<Vec<ScoredTicket>, PipelineError> {
        if let Some(dimension) = self.index.dimension()
            && vector.len() != dimension
        {
            return Err(PipelineError::DataIntegrity(format!(
                "Query embedding has {} dimensions, corpus has {}",
                vector.len(),
                dimension
            )));
        }

        let neighbors = self.index.nearest(vector, k);

        tracing::debug!(
            k = k,
            returned = neighbors.len(),
            top_similarity = neighbors.first().map(|n| n.similarity),
            "Neighbor query complete"
        );

        Ok(neighbors)
    }
}
