//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Engines call store methods; they never execute SQL directly.

use crate::{error::EngineResult, event::EventLogEntry, types::LoanId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection};

mod esg;
mod loan;
mod pricing;
mod risk;
mod sfdr;

pub use loan::{LoanPricingUpdate, LoanRiskUpdate};

pub struct LoanStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl LoanStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> EngineResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_loan_book.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_ledgers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_event_log.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> EngineResult<i64> {
        self.conn.execute(
            "INSERT INTO event_log (request_id, loan_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.request_id,
                entry.loan_id,
                entry.event_type,
                entry.payload,
                ts(&entry.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn events_for_loan(&self, loan_id: LoanId) -> EngineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, request_id, loan_id, event_type, payload, created_at
             FROM event_log WHERE loan_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![loan_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    request_id: row.get(1)?,
                    loan_id:    row.get(2)?,
                    event_type: row.get(3)?,
                    payload:    row.get(4)?,
                    created_at: parse_ts(5, row.get(5)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self) -> EngineResult<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ── Column codecs ─────────────────────────────────────────────────

/// Timestamps are stored as fixed-width RFC 3339 text so that
/// lexical ORDER BY matches chronological order.
pub(crate) fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn opt_ts(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(ts)
}

pub(crate) fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(idx, r)).transpose()
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: String,
) -> rusqlite::Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
