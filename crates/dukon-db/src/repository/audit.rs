//! # Audit Repository
//!
//! Append-only log of domain events. Every inventory or ledger
//! mutation writes one row in the same transaction as the mutation
//! itself, so the log is exactly as durable as the change it records.
//!
//! Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::DbResult;
use dukon_core::DomainEvent;

// =============================================================================
// Row Operations
// =============================================================================

/// Records a domain event.
///
/// `created_by` is the staff identity attributed to the change. The
/// full event is kept as JSON alongside the indexed columns so later
/// tooling can reconstruct details the columns do not carry.
pub async fn record<'e, E>(ex: E, event: &DomainEvent, created_by: &str) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(event)?;

    sqlx::query(
        r#"
        INSERT INTO audit_log (id, entity_type, entity_id, action, note, payload, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(event.entity_type())
    .bind(event.entity_id())
    .bind(event.action())
    .bind(event.note())
    .bind(payload)
    .bind(created_by)
    .bind(Utc::now())
    .execute(ex)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// One recorded audit entry, as read back from the log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub note: String,
    pub payload: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

const AUDIT_COLUMNS: &str =
    "id, entity_type, entity_id, action, note, payload, created_by, created_at";

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// History of one entity, newest first.
    pub async fn for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        limit: i64,
    ) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log \
             WHERE entity_type = ?1 AND entity_id = ?2 \
             ORDER BY created_at DESC, id LIMIT ?3"
        ))
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// The most recent entries across all entities.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY created_at DESC, id LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
