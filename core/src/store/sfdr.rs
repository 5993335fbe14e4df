//! Store methods for SFDR disclosure reports.

use super::{parse_json, parse_ts, ts, LoanStore};
use crate::{
    error::EngineResult,
    ledger::{SfdrArticle, SfdrReportRecord},
    types::{LoanId, RecordId},
};
use rusqlite::{params, types::Type, OptionalExtension, Row};

const REPORT_COLUMNS: &str = "id, loan_id, report_period, sfdr_classification,
    principal_adverse_impacts, sustainable_investment_percentage, taxonomy_alignment,
    do_no_significant_harm_assessment, social_safeguards, generated_date, status,
    report_data";

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<SfdrReportRecord> {
    let label: String = row.get(3)?;
    let sfdr_classification = SfdrArticle::from_label(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown SFDR classification: {label}").into(),
        )
    })?;
    Ok(SfdrReportRecord {
        id:                                Some(row.get(0)?),
        loan_id:                           row.get(1)?,
        report_period:                     row.get(2)?,
        sfdr_classification,
        principal_adverse_impacts:         parse_json(4, row.get(4)?)?,
        sustainable_investment_percentage: row.get(5)?,
        taxonomy_alignment:                parse_json(6, row.get(6)?)?,
        do_no_significant_harm_assessment: parse_json(7, row.get(7)?)?,
        social_safeguards:                 parse_json(8, row.get(8)?)?,
        generated_date:                    parse_ts(9, row.get(9)?)?,
        status:                            row.get(10)?,
        report_data:                       parse_json(11, row.get(11)?)?,
    })
}

impl LoanStore {
    pub fn insert_sfdr_report(&self, report: &SfdrReportRecord) -> EngineResult<RecordId> {
        self.conn.execute(
            "INSERT INTO sfdr_report (
                loan_id, report_period, sfdr_classification, principal_adverse_impacts,
                sustainable_investment_percentage, taxonomy_alignment,
                do_no_significant_harm_assessment, social_safeguards, generated_date,
                status, report_data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                report.loan_id,
                &report.report_period,
                report.sfdr_classification.as_str(),
                serde_json::to_string(&report.principal_adverse_impacts)?,
                report.sustainable_investment_percentage,
                serde_json::to_string(&report.taxonomy_alignment)?,
                serde_json::to_string(&report.do_no_significant_harm_assessment)?,
                serde_json::to_string(&report.social_safeguards)?,
                ts(&report.generated_date),
                &report.status,
                serde_json::to_string(&report.report_data)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Reports for one loan, most recent first.
    pub fn sfdr_reports(&self, loan_id: LoanId) -> EngineResult<Vec<SfdrReportRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM sfdr_report WHERE loan_id = ?1
             ORDER BY generated_date DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![loan_id], report_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn sfdr_report(&self, report_id: RecordId) -> EngineResult<Option<SfdrReportRecord>> {
        let report = self
            .conn
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM sfdr_report WHERE id = ?1"),
                params![report_id],
                report_from_row,
            )
            .optional()?;
        Ok(report)
    }
}
