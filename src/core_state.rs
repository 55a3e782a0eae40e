//! Shared service state.
//!
//! `CoreState` is built once at startup and shared by every request handler
//! behind an `Arc`. It holds configuration, the audit buffer and the reset
//! link delivery. Database connections are opened per request.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use uuid::Uuid;

use crate::auth::{LogDelivery, ResetDelivery};
use crate::config::ClinicConfig;
use crate::db;
use crate::db::repository::{ts_to_sql, AuditRow};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: ClinicConfig,
    audit: AuditLogger,
    reset_delivery: Arc<dyn ResetDelivery>,
}

impl CoreState {
    pub fn new(config: ClinicConfig) -> Self {
        Self {
            config,
            audit: AuditLogger::new(),
            reset_delivery: Arc::new(LogDelivery),
        }
    }

    /// Replace the default (log-only) reset link delivery.
    pub fn with_reset_delivery(mut self, delivery: Arc<dyn ResetDelivery>) -> Self {
        self.reset_delivery = delivery;
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.database_path()
    }

    /// Open a connection to the clinic database. Migrations run on open.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_database(&self.db_path())?)
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.config.utc_offset
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.config.session_ttl_hours)
    }

    pub fn reset_delivery(&self) -> &dyn ResetDelivery {
        self.reset_delivery.as_ref()
    }

    // ── Audit logging ───────────────────────────────────────

    /// Log an access event. Auto-flushes to DB when buffer is full.
    pub fn log_access(&self, user_id: Option<Uuid>, action: &str, entity: &str) {
        let needs_flush = self.audit.log(user_id, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush audit buffer to DB and prune entries older than 90 days.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        let cutoff = Utc::now() - Duration::days(AUDIT_RETENTION_DAYS);
        if let Err(e) = db::repository::prune_audit_log(&conn, &cutoff) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(())
    }

    /// Periodic housekeeping: flush the audit buffer and drop expired
    /// sessions. Returns the number of sessions removed.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        self.flush_and_prune_audit()?;
        let conn = self.open_db()?;
        Ok(db::repository::purge_expired_sessions(&conn, &now)?)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// `None` for unauthenticated requests.
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, user_id: Option<Uuid>, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: Utc::now(),
                user_id,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Drain all buffered entries (for flush to SQLite).
    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let rows: Vec<AuditRow> = entries
            .iter()
            .map(|e| {
                (
                    ts_to_sql(&e.timestamp),
                    e.user_id.map(|id| id.to_string()),
                    e.action.clone(),
                    e.entity.clone(),
                )
            })
            .collect();

        let count = rows.len();
        db::repository::insert_audit_entries(conn, &rows)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
