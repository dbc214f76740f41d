//! Database module for PostgreSQL persistence

pub mod memory;
pub mod models;
pub mod repository;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::env;

pub use memory::MemoryStore;
pub use repository::{ConversationRepository, PgStore, TicketRepository};

// Environment variable names
const ENV_POSTGRES_HOST: &str = "INTAKE_POSTGRES_HOST";
const ENV_POSTGRES_PORT: &str = "INTAKE_POSTGRES_PORT";
const ENV_POSTGRES_USER: &str = "INTAKE_POSTGRES_USER";
const ENV_POSTGRES_PASSWORD: &str = "INTAKE_POSTGRES_PASSWORD";
const ENV_POSTGRES_DB: &str = "INTAKE_POSTGRES_DB";

/// Width of every `thread_id` column
pub const MAX_THREAD_ID_LEN: usize = 64;

// Default values
const DEFAULT_POSTGRES_HOST: &str = "127.0.0.1";
const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POSTGRES_USER: &str = "intake";
const DEFAULT_POSTGRES_PASSWORD: &str = "intake";
const DEFAULT_POSTGRES_DB: &str = "intake";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Create a new database connection pool
pub async fn create_pool() -> Result<PgPool, DbError> {
    let host = env::var(ENV_POSTGRES_HOST).unwrap_or_else(|_| DEFAULT_POSTGRES_HOST.to_string());
    let port = env::var(ENV_POSTGRES_PORT).unwrap_or_else(|_| DEFAULT_POSTGRES_PORT.to_string());
    let user = env::var(ENV_POSTGRES_USER).unwrap_or_else(|_| DEFAULT_POSTGRES_USER.to_string());
    let password =
        env::var(ENV_POSTGRES_PASSWORD).unwrap_or_else(|_| DEFAULT_POSTGRES_PASSWORD.to_string());
    let database = env::var(ENV_POSTGRES_DB).unwrap_or_else(|_| DEFAULT_POSTGRES_DB.to_string());

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    );

    tracing::debug!(host = %host, port = %port, database = %database, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!(host = %host, port = %port, "PostgreSQL connection established");

    Ok(pool)
}

/// Initialize database schema
pub async fn init_schema(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS historical_tickets (
            seq BIGSERIAL UNIQUE,
            ticket_id VARCHAR(64) PRIMARY KEY,
            request_type TEXT NOT NULL,
            request_summary TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '',
            mandatory_fields JSONB NOT NULL DEFAULT '[]',
            fields_provided JSONB NOT NULL DEFAULT '[]',
            outcome TEXT NOT NULL,
            security_risk_score INTEGER NOT NULL,
            embedding JSONB NOT NULL,
            created_at TIMESTAMPTZ,
            requester_department TEXT,
            requester_title TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS threads (
            thread_id VARCHAR(64) PRIMARY KEY,
            status VARCHAR(32) NOT NULL DEFAULT 'intake',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id BIGSERIAL PRIMARY KEY,
            thread_id VARCHAR(64) NOT NULL REFERENCES threads(thread_id),
            role VARCHAR(16) NOT NULL,
            text TEXT NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decisions (
            id BIGSERIAL PRIMARY KEY,
            thread_id VARCHAR(64) NOT NULL UNIQUE REFERENCES threads(thread_id),
            request_type TEXT NOT NULL,
            extracted_fields JSONB NOT NULL DEFAULT '{}',
            missing_fields JSONB NOT NULL DEFAULT '[]',
            mandatory_fields JSONB NOT NULL DEFAULT '[]',
            outcome VARCHAR(16),
            rationale TEXT,
            risk_score INTEGER CHECK (risk_score BETWEEN 0 AND 100),
            confidence_score DOUBLE PRECISION CHECK (confidence_score BETWEEN 0.0 AND 1.0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            resolved_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id BIGSERIAL PRIMARY KEY,
            thread_id VARCHAR(64) NOT NULL,
            action VARCHAR(64) NOT NULL,
            input_data JSONB NOT NULL,
            output_data JSONB NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes separately
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_historical_tickets_request_type ON historical_tickets(request_type)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_thread_id ON messages(thread_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_created_at ON decisions(created_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_thread_id ON audit_log(thread_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database schema initialized");

    Ok(())
}
