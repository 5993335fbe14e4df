//! Engine event log: the audit trail of every command.
//!
//! RULE: every ledger row the engine writes is followed by exactly one event.
//! Variants are only ever appended, never removed or reordered.

use crate::types::{LoanId, RecordId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PricingRecalculated {
        loan_id: LoanId,
        history_id: RecordId,
        esg_performance_score: f64,
        pricing_tier: String,
        margin_adjustment: f64,
    },
    RiskAssessed {
        loan_id: LoanId,
        assessment_id: RecordId,
        risk_score: f64,
        risk_category: String,
        trend: String,
    },
    SfdrReportGenerated {
        loan_id: LoanId,
        report_id: RecordId,
        period: String,
        sfdr_classification: String,
    },
}

impl EngineEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PricingRecalculated { .. } => "pricing_recalculated",
            Self::RiskAssessed { .. }        => "risk_assessed",
            Self::SfdrReportGenerated { .. } => "sfdr_report_generated",
        }
    }

    pub fn loan_id(&self) -> LoanId {
        match self {
            Self::PricingRecalculated { loan_id, .. }
            | Self::RiskAssessed { loan_id, .. }
            | Self::SfdrReportGenerated { loan_id, .. } => *loan_id,
        }
    }
}

/// A persisted event, as stored in event_log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub request_id: RequestId,
    pub loan_id:    Option<LoanId>,
    pub event_type: String,
    pub payload:    String, // JSON-serialized EngineEvent
    pub created_at: DateTime<Utc>,
}

impl EventLogEntry {
    pub fn from_event(
        request_id: &str,
        event: &EngineEvent,
        at: DateTime<Utc>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            request_id: request_id.to_string(),
            loan_id:    Some(event.loan_id()),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
            created_at: at,
        })
    }

    pub fn decode(&self) -> serde_json::Result<EngineEvent> {
        serde_json::from_str(&self.payload)
    }
}
