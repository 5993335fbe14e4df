use crate::types::{LoanId, RecordId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Loan with ID {loan_id} not found")]
    LoanNotFound { loan_id: LoanId },

    #[error("SFDR report with ID {report_id} not found")]
    ReportNotFound { report_id: RecordId },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// True for the conditions a caller should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::LoanNotFound { .. } | EngineError::ReportNotFound { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
