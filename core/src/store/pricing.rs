//! Store methods for the pricing ledger.

use super::{parse_ts, ts, LoanPricingUpdate, LoanStore};
use crate::{
    error::EngineResult,
    ledger::PricingHistoryEntry,
    types::{LoanId, RecordId},
};
use rusqlite::params;

impl LoanStore {
    /// Write the loan's derived pricing fields and append the history
    /// row in one transaction. Returns the new history id.
    pub fn record_pricing(
        &self,
        update: &LoanPricingUpdate,
        entry: &PricingHistoryEntry,
    ) -> EngineResult<RecordId> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_loan_pricing(&tx, entry.loan_id, update)?;
        tx.execute(
            "INSERT INTO pricing_history (
                loan_id, effective_date, base_rate, margin, total_rate,
                esg_performance_score, pricing_tier, adjustment_reason,
                adjustment_amount, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.loan_id,
                ts(&entry.effective_date),
                entry.base_rate,
                entry.margin,
                entry.total_rate,
                entry.esg_performance_score,
                &entry.pricing_tier,
                &entry.adjustment_reason,
                entry.adjustment_amount,
                entry.created_by,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Pricing history, most recent first.
    pub fn pricing_history(
        &self,
        loan_id: LoanId,
        limit: usize,
    ) -> EngineResult<Vec<PricingHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, effective_date, base_rate, margin, total_rate,
                    esg_performance_score, pricing_tier, adjustment_reason,
                    adjustment_amount, created_by
             FROM pricing_history WHERE loan_id = ?1
             ORDER BY effective_date DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![loan_id, limit as i64], |row| {
            Ok(PricingHistoryEntry {
                id:                    Some(row.get(0)?),
                loan_id:               row.get(1)?,
                effective_date:        parse_ts(2, row.get(2)?)?,
                base_rate:             row.get(3)?,
                margin:                row.get(4)?,
                total_rate:            row.get(5)?,
                esg_performance_score: row.get(6)?,
                pricing_tier:          row.get(7)?,
                adjustment_reason:     row.get(8)?,
                adjustment_amount:     row.get(9)?,
                created_by:            row.get(10)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn pricing_history_count(&self, loan_id: LoanId) -> EngineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pricing_history WHERE loan_id = ?1",
            params![loan_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
