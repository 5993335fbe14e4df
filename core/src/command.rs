use crate::types::{LoanId, RecordId, RequestId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All commands the assessment engine accepts.
/// Variants are only ever appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineCommand {
    // ── Writes (one ledger row + one event each) ──────────────────
    Price {
        loan_id: LoanId,
        #[serde(default)]
        user_id: Option<UserId>,
        #[serde(default)]
        reason:  Option<String>,
    },
    AssessRisk {
        loan_id: LoanId,
    },
    SfdrReport {
        loan_id: LoanId,
        period:  String,
    },
    BulkAssess {
        loan_ids: Vec<LoanId>,
    },

    // ── Reads ─────────────────────────────────────────────────────
    PricingHistory {
        loan_id: LoanId,
        #[serde(default = "default_limit")]
        limit:   usize,
    },
    PricingScenarios {
        loan_id: LoanId,
    },
    PricingSummary {
        loan_id: LoanId,
    },
    PricingTiers,
    RiskHistory {
        loan_id: LoanId,
        #[serde(default = "default_limit")]
        limit:   usize,
    },
    BreachPrediction {
        loan_id: LoanId,
    },
    Dashboard,
    SfdrReports {
        loan_id: LoanId,
    },
    FetchSfdrReport {
        report_id: RecordId,
    },
    RiskFactors {
        loan_id: LoanId,
    },
    ComplianceHistory {
        loan_id: LoanId,
    },
}

fn default_limit() -> usize {
    10
}

impl EngineCommand {
    /// True for commands that append to a ledger.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Price { .. } | Self::AssessRisk { .. } | Self::SfdrReport { .. } | Self::BulkAssess { .. }
        )
    }
}

/// A command stamped with its correlation id and arrival time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub request_id:  RequestId,
    pub received_at: DateTime<Utc>,
    pub command:     EngineCommand,
}

impl CommandEnvelope {
    pub fn new(command: EngineCommand, received_at: DateTime<Utc>) -> Self {
        Self {
            request_id: new_request_id(),
            received_at,
            command,
        }
    }
}

pub fn new_request_id() -> RequestId {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_commands() {
        let price: EngineCommand = serde_json::from_str(r#"{"type":"price","loan_id":1}"#).unwrap();
        assert_eq!(price, EngineCommand::Price { loan_id: 1, user_id: None, reason: None });
        assert!(price.is_write());

        let report: EngineCommand =
            serde_json::from_str(r#"{"type":"sfdr_report","loan_id":3,"period":"2024-Q4"}"#).unwrap();
        assert_eq!(report, EngineCommand::SfdrReport { loan_id: 3, period: "2024-Q4".into() });

        let history: EngineCommand =
            serde_json::from_str(r#"{"type":"risk_history","loan_id":2}"#).unwrap();
        assert_eq!(history, EngineCommand::RiskHistory { loan_id: 2, limit: 10 });
        assert!(!history.is_write());

        let dashboard: EngineCommand = serde_json::from_str(r#"{"type":"dashboard"}"#).unwrap();
        assert_eq!(dashboard, EngineCommand::Dashboard);

        let factors: EngineCommand =
            serde_json::from_str(r#"{"type":"risk_factors","loan_id":5}"#).unwrap();
        assert_eq!(factors, EngineCommand::RiskFactors { loan_id: 5 });
        assert!(!factors.is_write());

        let compliance: EngineCommand =
            serde_json::from_str(r#"{"type":"compliance_history","loan_id":5}"#).unwrap();
        assert_eq!(compliance, EngineCommand::ComplianceHistory { loan_id: 5 });
    }

    #[test]
    fn request_ids_are_unique() {
        let at = Utc::now();
        let a = CommandEnvelope::new(EngineCommand::Dashboard, at);
        let b = CommandEnvelope::new(EngineCommand::Dashboard, at);
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.request_id.len(), 36);
    }
}
