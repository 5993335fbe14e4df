//! Store methods for the risk-assessment ledger.

use super::{opt_ts, parse_json, parse_opt_ts, parse_ts, ts, LoanRiskUpdate, LoanStore};
use crate::{
    error::EngineResult,
    ledger::RiskAssessmentRecord,
    types::{LoanId, RecordId},
};
use rusqlite::{params, Row};

const ASSESSMENT_COLUMNS: &str = "id, loan_id, assessment_date, risk_score, risk_category,
    covenant_breach_probability, esg_risk_score, financial_risk_score,
    predicted_breach_date, confidence_level, risk_factors, recommendations";

fn assessment_from_row(row: &Row<'_>) -> rusqlite::Result<RiskAssessmentRecord> {
    Ok(RiskAssessmentRecord {
        id:                          Some(row.get(0)?),
        loan_id:                     row.get(1)?,
        assessment_date:             parse_ts(2, row.get(2)?)?,
        risk_score:                  row.get(3)?,
        risk_category:               row.get(4)?,
        covenant_breach_probability: row.get(5)?,
        esg_risk_score:              row.get(6)?,
        financial_risk_score:        row.get(7)?,
        predicted_breach_date:       parse_opt_ts(8, row.get(8)?)?,
        confidence_level:            row.get(9)?,
        risk_factors:                parse_json(10, row.get(10)?)?,
        recommendations:             parse_json(11, row.get(11)?)?,
    })
}

impl LoanStore {
    /// Write the loan's risk fields and append the assessment in one
    /// transaction. Returns the new assessment id.
    pub fn record_risk_assessment(
        &self,
        update: &LoanRiskUpdate,
        record: &RiskAssessmentRecord,
    ) -> EngineResult<RecordId> {
        let risk_factors = serde_json::to_string(&record.risk_factors)?;
        let recommendations = serde_json::to_string(&record.recommendations)?;

        let tx = self.conn.unchecked_transaction()?;
        Self::write_loan_risk(&tx, record.loan_id, update)?;
        tx.execute(
            "INSERT INTO risk_assessment (
                loan_id, assessment_date, risk_score, risk_category,
                covenant_breach_probability, esg_risk_score, financial_risk_score,
                predicted_breach_date, confidence_level, risk_factors, recommendations
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.loan_id,
                ts(&record.assessment_date),
                record.risk_score,
                &record.risk_category,
                record.covenant_breach_probability,
                record.esg_risk_score,
                record.financial_risk_score,
                opt_ts(&record.predicted_breach_date),
                record.confidence_level,
                risk_factors,
                recommendations,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Assessments for one loan, most recent first.
    pub fn risk_assessments(
        &self,
        loan_id: LoanId,
        limit: usize,
    ) -> EngineResult<Vec<RiskAssessmentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM risk_assessment WHERE loan_id = ?1
             ORDER BY assessment_date DESC, id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![loan_id, limit as i64], assessment_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Most recent assessments across the whole portfolio.
    pub fn recent_risk_assessments(&self, limit: usize) -> EngineResult<Vec<RiskAssessmentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM risk_assessment
             ORDER BY assessment_date DESC, id DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], assessment_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn risk_assessment_count(&self, loan_id: LoanId) -> EngineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM risk_assessment WHERE loan_id = ?1",
            params![loan_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
