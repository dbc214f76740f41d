//! Repository abstractions and their PostgreSQL implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::DbError;
use super::models::{AuditLogRow, DecisionRow, HistoricalTicketRow, MessageRow, ThreadRow};
use crate::model::{
    AuditLogEntry, Decision, DecisionUpdate, HistoricalTicket, Message, Role, Thread, TurnCommit,
};

/// Read access to the historical ticket corpus plus its one-time bulk load
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// All tickets in corpus order. Rows that cannot be decoded are skipped.
    async fn load_all_historical_tickets(&self) -> Result<Vec<HistoricalTicket>, DbError>;

    /// First ticket of the given type in corpus order
    async fn get_one_ticket_by_type(
        &self,
        request_type: &str,
    ) -> Result<Option<HistoricalTicket>, DbError>;

    /// Distinct request type labels, sorted
    async fn distinct_request_types(&self) -> Result<Vec<String>, DbError>;

    /// Insert tickets, returning how many were stored
    async fn insert_tickets(&self, tickets: &[HistoricalTicket]) -> Result<usize, DbError>;
}

/// Conversation threads, their decision record and the audit trail
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create_thread(&self, thread_id: &str) -> Result<Thread, DbError>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, DbError>;

    /// Messages in timestamp order, optionally restricted to one role
    async fn list_messages(
        &self,
        thread_id: &str,
        role: Option<Role>,
    ) -> Result<Vec<Message>, DbError>;

    async fn get_decision(&self, thread_id: &str) -> Result<Option<Decision>, DbError>;

    /// Decisions created at or after `since`
    async fn list_decisions_since(&self, since: DateTime<Utc>) -> Result<Vec<Decision>, DbError>;

    async fn list_audit_log(&self, thread_id: &str) -> Result<Vec<AuditLogEntry>, DbError>;

    /// Persist a turn as one unit: thread (created if absent) and its status,
    /// new messages, the upserted decision and one audit row.
    async fn commit_turn(&self, commit: TurnCommit) -> Result<Decision, DbError>;
}

const SELECT_TICKET_COLUMNS: &str = r#"
    SELECT ticket_id, request_type, request_summary, details, mandatory_fields,
           fields_provided, outcome, security_risk_score, embedding, created_at,
           requester_department, requester_title
    FROM historical_tickets
"#;

const SELECT_DECISION_COLUMNS: &str = r#"
    SELECT thread_id, request_type, extracted_fields, missing_fields, mandatory_fields,
           outcome, rationale, risk_score, confidence_score, created_at, resolved_at
    FROM decisions
"#;

/// PostgreSQL-backed store implementing both repositories
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for PgStore {
    async fn load_all_historical_tickets(&self) -> Result<Vec<HistoricalTicket>, DbError> {
        let rows: Vec<HistoricalTicketRow> =
            sqlx::query_as(&format!("{} ORDER BY seq", SELECT_TICKET_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        let total = rows.len();
        let tickets: Vec<HistoricalTicket> = rows
            .into_iter()
            .filter_map(|row| match row.into_domain() {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable historical ticket");
                    None
                }
            })
            .collect();

        tracing::debug!(
            total = total,
            loaded = tickets.len(),
            "Loaded historical tickets"
        );

        Ok(tickets)
    }

    async fn get_one_ticket_by_type(
        &self,
        request_type: &str,
    ) -> Result<Option<HistoricalTicket>, DbError> {
        let row: Option<HistoricalTicketRow> = sqlx::query_as(&format!(
            "{} WHERE request_type = $1 ORDER BY seq LIMIT 1",
            SELECT_TICKET_COLUMNS
        ))
        .bind(request_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain().map_err(DbError::Serialization))
            .transpose()
    }

    async fn distinct_request_types(&self) -> Result<Vec<String>, DbError> {
        let types: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT request_type FROM historical_tickets ORDER BY request_type",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    async fn insert_tickets(&self, tickets: &[HistoricalTicket]) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;

        for ticket in tickets {
            let mandatory_fields = serde_json::to_value(&ticket.mandatory_fields)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let fields_provided = serde_json::to_value(&ticket.fields_provided)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let embedding = serde_json::to_value(&ticket.embedding)
                .map_err(|e| DbError::Serialization(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO historical_tickets (
                    ticket_id, request_type, request_summary, details, mandatory_fields,
                    fields_provided, outcome, security_risk_score, embedding, created_at,
                    requester_department, requester_title
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&ticket.ticket_id)
            .bind(&ticket.request_type)
            .bind(&ticket.request_summary)
            .bind(&ticket.details)
            .bind(&mandatory_fields)
            .bind(&fields_provided)
            .bind(&ticket.outcome)
            .bind(ticket.security_risk_score)
            .bind(&embedding)
            .bind(ticket.metadata.created_at)
            .bind(&ticket.metadata.department)
            .bind(&ticket.metadata.title)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(count = tickets.len(), "Inserted historical tickets");
        Ok(tickets.len())
    }
}

#[async_trait]
impl ConversationRepository for PgStore {
    async fn create_thread(&self, thread_id: &str) -> Result<Thread, DbError> {
        let row: ThreadRow = sqlx::query_as(
            r#"
            INSERT INTO threads (thread_id, status, created_at, updated_at)
            VALUES ($1, 'intake', NOW(), NOW())
            RETURNING thread_id, status, created_at, updated_at
            "#,
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(thread_id = %thread_id, "Created thread");
        row.into_domain().map_err(DbError::Serialization)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, DbError> {
        let row: Option<ThreadRow> = sqlx::query_as(
            "SELECT thread_id, status, created_at, updated_at FROM threads WHERE thread_id = $1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain().map_err(DbError::Serialization))
            .transpose()
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        role: Option<Role>,
    ) -> Result<Vec<Message>, DbError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT thread_id, role, text, timestamp FROM messages
            WHERE thread_id = $1 AND ($2::TEXT IS NULL OR role = $2)
            ORDER BY timestamp, id
            "#,
        )
        .bind(thread_id)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| r.into_domain().map_err(DbError::Serialization))
            .collect()
    }

    async fn get_decision(&self, thread_id: &str) -> Result<Option<Decision>, DbError> {
        let row: Option<DecisionRow> = sqlx::query_as(&format!(
            "{} WHERE thread_id = $1",
            SELECT_DECISION_COLUMNS
        ))
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain().map_err(DbError::Serialization))
            .transpose()
    }

    async fn list_decisions_since(&self, since: DateTime<Utc>) -> Result<Vec<Decision>, DbError> {
        let rows: Vec<DecisionRow> = sqlx::query_as(&format!(
            "{} WHERE created_at >= $1 ORDER BY created_at",
            SELECT_DECISION_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| r.into_domain().map_err(DbError::Serialization))
            .collect()
    }

    async fn list_audit_log(&self, thread_id: &str) -> Result<Vec<AuditLogEntry>, DbError> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(
            r#"
            SELECT thread_id, action, input_data, output_data, timestamp FROM audit_log
            WHERE thread_id = $1
            ORDER BY timestamp, id
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditLogRow::into_domain).collect())
    }

    async fn commit_turn(&self, commit: TurnCommit) -> Result<Decision, DbError> {
        let mut tx = self.pool.begin().await?;

        upsert_thread_status(&mut tx, &commit).await?;

        for message in &commit.messages {
            append_message(&mut tx, message).await?;
        }

        let decision = upsert_decision(
            &mut tx,
            &commit.thread_id,
            commit.decision,
            commit.committed_at,
        )
        .await?;

        append_audit_log(&mut tx, &commit.audit).await?;

        tx.commit().await?;

        tracing::debug!(
            thread_id = %commit.thread_id,
            status = %commit.status,
            outcome = ?decision.outcome,
            "Committed turn"
        );

        Ok(decision)
    }
}

async fn upsert_thread_status(
    tx: &mut Transaction<'_, Postgres>,
    commit: &TurnCommit,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO threads (thread_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, $3)
        ON CONFLICT (thread_id) DO UPDATE SET
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&commit.thread_id)
    .bind(commit.status.as_str())
    .bind(commit.committed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn append_message(
    tx: &mut Transaction<'_, Postgres>,
    message: &Message,
) -> Result<(), DbError> {
    sqlx::query("INSERT INTO messages (thread_id, role, text, timestamp) VALUES ($1, $2, $3, $4)")
        .bind(&message.thread_id)
        .bind(message.role.as_str())
        .bind(&message.text)
        .bind(message.timestamp)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Find-or-create the thread's decision row under a row lock
async fn upsert_decision(
    tx: &mut Transaction<'_, Postgres>,
    thread_id: &str,
    update: DecisionUpdate,
    now: DateTime<Utc>,
) -> Result<Decision, DbError> {
    let existing: Option<DecisionRow> = sqlx::query_as(&format!(
        "{} WHERE thread_id = $1 FOR UPDATE",
        SELECT_DECISION_COLUMNS
    ))
    .bind(thread_id)
    .fetch_optional(&mut **tx)
    .await?;

    let existing = existing
        .map(|r| r.into_domain().map_err(DbError::Serialization))
        .transpose()?;

    let decision = Decision::apply_update(thread_id, existing, update, now);

    let extracted_fields = serde_json::to_value(&decision.extracted_fields)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let missing_fields = serde_json::to_value(&decision.missing_fields)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let mandatory_fields = serde_json::to_value(&decision.mandatory_fields)
        .map_err(|e| DbError::Serialization(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO decisions (
            thread_id, request_type, extracted_fields, missing_fields, mandatory_fields,
            outcome, rationale, risk_score, confidence_score, created_at, resolved_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (thread_id) DO UPDATE SET
            request_type = EXCLUDED.request_type,
            extracted_fields = EXCLUDED.extracted_fields,
            missing_fields = EXCLUDED.missing_fields,
            mandatory_fields = EXCLUDED.mandatory_fields,
            outcome = EXCLUDED.outcome,
            rationale = EXCLUDED.rationale,
            risk_score = EXCLUDED.risk_score,
            confidence_score = EXCLUDED.confidence_score,
            resolved_at = EXCLUDED.resolved_at
        "#,
    )
    .bind(&decision.thread_id)
    .bind(&decision.request_type)
    .bind(&extracted_fields)
    .bind(&missing_fields)
    .bind(&mandatory_fields)
    .bind(decision.outcome.map(|o| o.as_str()))
    .bind(&decision.rationale)
    .bind(decision.risk_score.map(i32::from))
    .bind(decision.confidence_score)
    .bind(decision.created_at)
    .bind(decision.resolved_at)
    .execute(&mut **tx)
    .await?;

    Ok(decision)
}

async fn append_audit_log(
    tx: &mut Transaction<'_, Postgres>,
    entry: &AuditLogEntry,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (thread_id, action, input_data, output_data, timestamp)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&entry.thread_id)
    .bind(&entry.action)
    .bind(&entry.input_data)
    .bind(&entry.output_data)
    .bind(entry.timestamp)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
