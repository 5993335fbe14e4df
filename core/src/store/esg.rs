//! Store methods for the engine's inputs: KPIs, covenants, verifications.

use super::{opt_ts, parse_opt_ts, parse_ts, ts, LoanStore};
use crate::{
    error::EngineResult,
    model::{Covenant, EsgKpi, NewCovenant, NewKpi, Verification},
    types::{LoanId, RecordId},
};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl LoanStore {
    // ── ESG KPIs ──────────────────────────────────────────────────

    pub fn insert_kpi(&self, loan_id: LoanId, kpi: &NewKpi) -> EngineResult<RecordId> {
        self.conn.execute(
            "INSERT INTO esg_kpi (
                loan_id, kpi_name, kpi_category, baseline_value, target_value,
                current_value, unit, target_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                loan_id,
                &kpi.kpi_name,
                &kpi.kpi_category,
                kpi.baseline_value,
                kpi.target_value,
                kpi.current_value,
                &kpi.unit,
                opt_ts(&kpi.target_date),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All KPIs of a loan in insertion order.
    pub fn kpis_for_loan(&self, loan_id: LoanId) -> EngineResult<Vec<EsgKpi>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, kpi_name, kpi_category, baseline_value, target_value,
                    current_value, unit, target_date
             FROM esg_kpi WHERE loan_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![loan_id], |row| {
            Ok(EsgKpi {
                id:             row.get(0)?,
                loan_id:        row.get(1)?,
                kpi_name:       row.get(2)?,
                kpi_category:   row.get(3)?,
                baseline_value: row.get(4)?,
                target_value:   row.get(5)?,
                current_value:  row.get(6)?,
                unit:           row.get(7)?,
                target_date:    parse_opt_ts(8, row.get(8)?)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Record a new measurement on a KPI (CRUD layer / tests).
    pub fn update_kpi_current_value(
        &self,
        kpi_id: RecordId,
        current_value: Option<f64>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE esg_kpi SET current_value = ?1 WHERE id = ?2",
            params![current_value, kpi_id],
        )?;
        Ok(())
    }

    // ── Covenants ─────────────────────────────────────────────────

    pub fn insert_covenant(
        &self,
        loan_id: LoanId,
        covenant: &NewCovenant,
    ) -> EngineResult<RecordId> {
        self.conn.execute(
            "INSERT INTO covenant (loan_id, covenant_type, threshold, current_value, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                loan_id,
                &covenant.covenant_type,
                covenant.threshold,
                covenant.current_value,
                &covenant.status,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Covenants of a loan that are not terminated.
    pub fn active_covenants(&self, loan_id: LoanId) -> EngineResult<Vec<Covenant>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, covenant_type, threshold, current_value, status
             FROM covenant WHERE loan_id = ?1 AND status != 'terminated'
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![loan_id], |row| {
            Ok(Covenant {
                id:            row.get(0)?,
                loan_id:       row.get(1)?,
                covenant_type: row.get(2)?,
                threshold:     row.get(3)?,
                current_value: row.get(4)?,
                status:        row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Verifications ─────────────────────────────────────────────

    pub fn insert_verification(
        &self,
        loan_id: LoanId,
        verification_type: &str,
        verification_date: DateTime<Utc>,
        status: &str,
        confidence_score: Option<f64>,
    ) -> EngineResult<RecordId> {
        self.conn.execute(
            "INSERT INTO verification (
                loan_id, verification_type, verification_date, status, confidence_score
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                loan_id,
                verification_type,
                ts(&verification_date),
                status,
                confidence_score,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent verifications first.
    pub fn recent_verifications(
        &self,
        loan_id: LoanId,
        limit: usize,
    ) -> EngineResult<Vec<Verification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, verification_type, verification_date, status, confidence_score
             FROM verification WHERE loan_id = ?1
             ORDER BY verification_date DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![loan_id, limit as i64], |row| {
            Ok(Verification {
                id:                row.get(0)?,
                loan_id:           row.get(1)?,
                verification_type: row.get(2)?,
                verification_date: parse_ts(3, row.get(3)?)?,
                status:            row.get(4)?,
                confidence_score:  row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every verification on file, oldest first.
    pub fn verifications_for_loan(&self, loan_id: LoanId) -> EngineResult<Vec<Verification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, verification_type, verification_date, status, confidence_score
             FROM verification WHERE loan_id = ?1
             ORDER BY verification_date ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![loan_id], |row| {
            Ok(Verification {
                id:                row.get(0)?,
                loan_id:           row.get(1)?,
                verification_type: row.get(2)?,
                verification_date: parse_ts(3, row.get(3)?)?,
                status:            row.get(4)?,
                confidence_score:  row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
