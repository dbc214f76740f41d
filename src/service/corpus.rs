//! Bulk ingestion of the historical ticket corpus

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use crate::db::{DbError, TicketRepository};
use crate::model::{CorpusRecord, HistoricalTicket};
use crate::service::llm::{CapabilityError, EMBEDDING_BATCH_SIZE, EmbeddingCapability};

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus file is not a JSON array of ticket records: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid corpus record: {0}")]
    InvalidRecord(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] CapabilityError),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

/// Load, embed and store every record in a JSON corpus file
///
/// Returns the number of tickets inserted.
pub async fn load_corpus(
    path: &Path,
    embedder: &dyn EmbeddingCapability,
    repository: &dyn TicketRepository,
) -> Result<usize, CorpusError> {
    let contents = tokio::fs::read_to_string(path).await?;
    let records: Vec<CorpusRecord> = serde_json::from_str(&contents)?;

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Loading historical ticket corpus"
    );

    if records.is_empty() {
        tracing::warn!(path = %path.display(), "Corpus file contains no records");
        return Ok(0);
    }

    validate_records(&records)?;

    let tickets = embed_records(records, embedder).await?;
    let inserted = repository.insert_tickets(&tickets).await?;

    tracing::info!(inserted = inserted, "Historical ticket corpus loaded");
    Ok(inserted)
}

fn validate_records(records: &[CorpusRecord]) -> Result<(), CorpusError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.ticket_id.trim().is_empty() {
            return Err(CorpusError::InvalidRecord(
                "record with empty ticket_id".to_string(),
            ));
        }
        if record.request_type.trim().is_empty() {
            return Err(CorpusError::InvalidRecord(format!(
                "{} has an empty request_type",
                record.ticket_id
            )));
        }
        if !seen.insert(record.ticket_id.as_str()) {
            return Err(CorpusError::InvalidRecord(format!(
                "duplicate ticket_id {}",
                record.ticket_id
            )));
        }
    }
    Ok(())
}

async fn embed_records(
    records: Vec<CorpusRecord>,
    embedder: &dyn EmbeddingCapability,
) -> Result<Vec<HistoricalTicket>, CorpusError> {
    let mut tickets = Vec::with_capacity(records.len());
    let mut dimension: Option<usize> = None;

    for batch in records.chunks(EMBEDDING_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(CorpusRecord::embedding_text).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(CorpusError::DataIntegrity(format!(
                "embedding backend returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        for (record, vector) in batch.iter().cloned().zip(vectors) {
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(CorpusError::DataIntegrity(format!(
                        "{} embedded to {} dimensions, expected {}",
                        record.ticket_id,
                        vector.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
            tickets.push(record.into_ticket(vector).map_err(CorpusError::InvalidRecord)?);
        }

        tracing::debug!(embedded = tickets.len(), "Embedded corpus batch");
    }

    Ok(tickets)
}
