//! PostgreSQL decision ledger for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use crate::types::{
    ChangeLocation, DecisionLedgerEntry, DocumentId, LayerId, LedgerEntryId, Offset, UserAction, UserId,
};
use super::DecisionLedger;

/// SQL schema for the decision ledger table.
///
/// `seq` preserves append order; reads sort on it.
pub const DECISION_LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS active_query_decisions (
    id UUID PRIMARY KEY,
    seq BIGSERIAL NOT NULL,
    user_id TEXT NOT NULL,
    document_id BIGINT NOT NULL,
    layer_id BIGINT NOT NULL,
    begin_char INTEGER NOT NULL,
    end_char INTEGER NOT NULL,
    begin_token INTEGER NOT NULL,
    end_token INTEGER NOT NULL,
    label TEXT NOT NULL,
    action TEXT NOT NULL,
    change_location TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL,

    CONSTRAINT decision_action_check CHECK (action IN ('shown', 'accepted', 'rejected', 'skipped'))
);

CREATE INDEX IF NOT EXISTS idx_decisions_scope
    ON active_query_decisions(user_id, document_id, layer_id, seq);
"#;

/// Configuration for PostgreSQL connection pool.
///
/// Production defaults favor failing fast over queueing:
/// - Timeouts are short
/// - Idle timeout releases unused connections
/// - Max lifetime forces periodic reconnection
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/active_query".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for the PostgreSQL ledger.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row could not be mapped back to an entry.
    #[error("Corrupt ledger row {id}: {reason}")]
    CorruptRow {
        /// Row id.
        id: Uuid,
        /// What was wrong.
        reason: String,
    },
}

/// PostgreSQL decision ledger.
pub struct PostgresDecisionLedger {
    pool: PgPool,
}

impl PostgresDecisionLedger {
    /// Create a new ledger with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a ledger from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create the ledger table and its index if missing.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        // Plain string execution allows several statements.
        sqlx::Executor::execute(&self.pool, DECISION_LEDGER_SCHEMA).await?;
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    /// Parse an entry from a database row.
    fn parse_entry_row(row: &sqlx::postgres::PgRow) -> Result<DecisionLedgerEntry, PostgresError> {
        let id: Uuid = row.try_get("id")?;
        let user: String = row.try_get("user_id")?;
        let document: i64 = row.try_get("document_id")?;
        let layer: i64 = row.try_get("layer_id")?;
        let begin_char: i32 = row.try_get("begin_char")?;
        let end_char: i32 = row.try_get("end_char")?;
        let begin_token: i32 = row.try_get("begin_token")?;
        let end_token: i32 = row.try_get("end_token")?;
        let label: String = row.try_get("label")?;
        let action: String = row.try_get("action")?;
        let location: String = row.try_get("change_location")?;
        let timestamp: DateTime<Utc> = row.try_get("recorded_at")?;

        let corrupt = |reason: String| PostgresError::CorruptRow { id, reason };
        let action = UserAction::from_str(&action).ok_or_else(|| corrupt(format!("unknown action {action:?}")))?;
        // Older rows may lack a known location; the sidebar is the default.
        let change_location = ChangeLocation::from_str(&location).unwrap_or_default();

        Ok(DecisionLedgerEntry {
            id: LedgerEntryId::new(id),
            user: UserId::new(user),
            document: DocumentId(document as u64),
            layer: LayerId(layer as u64),
            // Validated by the adjudication index, not here.
            offset: Offset::unchecked(begin_char as u32, end_char as u32, begin_token as u32, end_token as u32),
            label,
            action,
            change_location,
            timestamp,
        })
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

#[async_trait]
impl DecisionLedger for PostgresDecisionLedger {
    type Error = PostgresError;

    async fn entries_for(
        &self,
        user: &UserId,
        document: DocumentId,
        layer: LayerId,
    ) -> Result<Vec<DecisionLedgerEntry>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, document_id, layer_id, begin_char, end_char,
                   begin_token, end_token, label, action, change_location, recorded_at
            FROM active_query_decisions
            WHERE user_id = $1 AND document_id = $2 AND layer_id = $3
            ORDER BY seq
            "#
        )
        .bind(user.as_str())
        .bind(document.0 as i64)
        .bind(layer.0 as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_entry_row).collect()
    }

    async fn append(&self, entry: DecisionLedgerEntry) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO active_query_decisions
                (id, user_id, document_id, layer_id, begin_char, end_char,
                 begin_token, end_token, label, action, change_location, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#
        )
        .bind(entry.id.as_uuid())
        .bind(entry.user.as_str())
        .bind(entry.document.0 as i64)
        .bind(entry.layer.0 as i64)
        .bind(entry.offset.begin_char as i32)
        .bind(entry.offset.end_char as i32)
        .bind(entry.offset.begin_token as i32)
        .bind(entry.offset.end_token as i32)
        .bind(&entry.label)
        .bind(entry.action.as_str())
        .bind(entry.change_location.as_str())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::trace!(entry_id = %entry.id, "Decision appended");
        Ok(())
    }

    async fn delete(&self, id: LedgerEntryId) -> Result<bool, Self::Error> {
        let result = sqlx::query("DELETE FROM active_query_decisions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
