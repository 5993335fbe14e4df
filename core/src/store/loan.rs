use super::{opt_ts, parse_opt_ts, LoanStore};
use crate::{
    error::EngineResult,
    model::{Borrower, Loan, NewLoan},
    types::{LoanId, RecordId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

/// Derived pricing fields written back after a recalculation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanPricingUpdate {
    pub esg_performance_score: f64,
    pub pricing_tier:          String,
    pub current_margin:        f64,
    pub margin_adjustment:     f64,
    pub last_pricing_update:   DateTime<Utc>,
}

/// Derived risk fields written back after an assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanRiskUpdate {
    pub risk_score:    f64,
    pub risk_category: String,
}

const LOAN_COLUMNS: &str = "id, loan_number, borrower_id, loan_type, amount, currency,
    interest_rate, base_margin, current_margin, maturity_date, status,
    sustainability_linked, esg_performance_score, pricing_tier, margin_adjustment,
    last_pricing_update, risk_score, risk_category";

fn loan_from_row(row: &Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id:                    row.get(0)?,
        loan_number:           row.get(1)?,
        borrower_id:           row.get(2)?,
        loan_type:             row.get(3)?,
        amount:                row.get(4)?,
        currency:              row.get(5)?,
        interest_rate:         row.get(6)?,
        base_margin:           row.get(7)?,
        current_margin:        row.get(8)?,
        maturity_date:         parse_opt_ts(9, row.get(9)?)?,
        status:                row.get(10)?,
        sustainability_linked: row.get::<_, i32>(11)? != 0,
        esg_performance_score: row.get(12)?,
        pricing_tier:          row.get(13)?,
        margin_adjustment:     row.get(14)?,
        last_pricing_update:   parse_opt_ts(15, row.get(15)?)?,
        risk_score:            row.get(16)?,
        risk_category:         row.get(17)?,
    })
}

impl LoanStore {
    // ── Borrower ──────────────────────────────────────────────────

    pub fn insert_borrower(
        &self,
        name: &str,
        industry: Option<&str>,
        country: Option<&str>,
    ) -> EngineResult<RecordId> {
        self.conn.execute(
            "INSERT INTO borrower (name, industry, country) VALUES (?1, ?2, ?3)",
            params![name, industry, country],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn borrower(&self, borrower_id: RecordId) -> EngineResult<Option<Borrower>> {
        let borrower = self
            .conn
            .query_row(
                "SELECT id, name, industry, country FROM borrower WHERE id = ?1",
                params![borrower_id],
                |row| {
                    Ok(Borrower {
                        id:       row.get(0)?,
                        name:     row.get(1)?,
                        industry: row.get(2)?,
                        country:  row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(borrower)
    }

    // ── Loan ──────────────────────────────────────────────────────

    pub fn insert_loan(&self, loan: &NewLoan) -> EngineResult<LoanId> {
        self.conn.execute(
            "INSERT INTO loan (
                loan_number, borrower_id, loan_type, amount, currency, interest_rate,
                base_margin, current_margin, maturity_date, status, sustainability_linked
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10)",
            params![
                &loan.loan_number,
                loan.borrower_id,
                &loan.loan_type,
                loan.amount,
                &loan.currency,
                loan.interest_rate,
                loan.base_margin,
                opt_ts(&loan.maturity_date),
                &loan.status,
                loan.sustainability_linked as i32,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn loan(&self, loan_id: LoanId) -> EngineResult<Option<Loan>> {
        let loan = self
            .conn
            .query_row(
                &format!("SELECT {LOAN_COLUMNS} FROM loan WHERE id = ?1"),
                params![loan_id],
                loan_from_row,
            )
            .optional()?;
        Ok(loan)
    }

    pub fn all_loans(&self) -> EngineResult<Vec<Loan>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {LOAN_COLUMNS} FROM loan ORDER BY id ASC"))?;
        let rows = stmt.query_map([], loan_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn loan_count(&self) -> EngineResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM loan", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Upstream status change (CRUD layer / tests).
    pub fn set_loan_status(&self, loan_id: LoanId, status: &str) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE loan SET status = ?1 WHERE id = ?2",
            params![status, loan_id],
        )?;
        Ok(())
    }

    pub(super) fn write_loan_pricing(
        conn: &rusqlite::Connection,
        loan_id: LoanId,
        update: &LoanPricingUpdate,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE loan SET esg_performance_score = ?1, pricing_tier = ?2,
                 current_margin = ?3, margin_adjustment = ?4, last_pricing_update = ?5
             WHERE id = ?6",
            params![
                update.esg_performance_score,
                &update.pricing_tier,
                update.current_margin,
                update.margin_adjustment,
                super::ts(&update.last_pricing_update),
                loan_id,
            ],
        )?;
        Ok(())
    }

    pub(super) fn write_loan_risk(
        conn: &rusqlite::Connection,
        loan_id: LoanId,
        update: &LoanRiskUpdate,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE loan SET risk_score = ?1, risk_category = ?2 WHERE id = ?3",
            params![update.risk_score, &update.risk_category, loan_id],
        )?;
        Ok(())
    }
}
