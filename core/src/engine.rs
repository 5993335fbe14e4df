//! The assessment engine: entry point for every computation.
//!
//! RULES:
//!   - The engine owns exactly one store, one config and one clock.
//!   - Sub-engines borrow them per call; they hold no state of their own.
//!   - Every ledger row written is followed by one event-log entry
//!     carrying the request id of the command that produced it.
//!   - The ledger row is the record of truth. An event that cannot be
//!     appended is logged as a warning and the command still succeeds.
//!   - Reads never write.

use crate::{
    clock::EngineClock,
    command::{new_request_id, CommandEnvelope, EngineCommand},
    config::{EngineConfig, PricingTier},
    error::{EngineError, EngineResult},
    event::{EngineEvent, EventLogEntry},
    ledger::SfdrReportRecord,
    pricing_engine::{PricingEngine, PricingHistory, PricingScenarios, PricingSummary, PricingUpdate},
    risk_scoring_engine::{
        BreachPrediction, BulkAssessment, BulkAssessmentOutcome, RiskAssessmentResult,
        RiskDashboard, RiskFactorBreakdown, RiskHistory, RiskScoringEngine,
    },
    sfdr_engine::{ComplianceHistory, SfdrEngine, SfdrReportResult},
    store::LoanStore,
    types::{LoanId, UserId},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of `AssessmentEngine::execute`, one variant per command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EngineResponse {
    Pricing(PricingUpdate),
    RiskAssessment(RiskAssessmentResult),
    SfdrReport(SfdrReportResult),
    BulkAssessment(BulkAssessment),
    PricingHistory(PricingHistory),
    PricingScenarios(PricingScenarios),
    PricingSummary(PricingSummary),
    PricingTiers(Vec<PricingTier>),
    RiskHistory(RiskHistory),
    BreachPrediction(BreachPrediction),
    Dashboard(RiskDashboard),
    SfdrReports(Vec<SfdrReportRecord>),
    StoredSfdrReport(SfdrReportRecord),
    RiskFactors(RiskFactorBreakdown),
    ComplianceHistory(ComplianceHistory),
}

pub struct AssessmentEngine {
    store:  LoanStore,
    config: EngineConfig,
    clock:  EngineClock,
}

impl AssessmentEngine {
    pub fn new(store: LoanStore, config: EngineConfig, clock: EngineClock) -> Self {
        Self { store, config, clock }
    }

    /// Engine over the standard grid and the system clock.
    pub fn with_defaults(store: LoanStore) -> Self {
        Self::new(store, EngineConfig::standard(), EngineClock::system())
    }

    /// In-memory, migrated engine on the standard grid with the clock
    /// pinned at `at`.
    pub fn build_test(at: DateTime<Utc>) -> EngineResult<Self> {
        let store = LoanStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, EngineConfig::standard(), EngineClock::fixed(at)))
    }

    pub fn store(&self) -> &LoanStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &EngineClock {
        &self.clock
    }

    pub fn set_clock(&mut self, clock: EngineClock) {
        self.clock = clock;
    }

    pub fn pricing(&self) -> PricingEngine<'_> {
        PricingEngine::new(&self.store, &self.config, &self.clock)
    }

    pub fn risk(&self) -> RiskScoringEngine<'_> {
        RiskScoringEngine::new(&self.store, &self.config, &self.clock)
    }

    pub fn sfdr(&self) -> SfdrEngine<'_> {
        SfdrEngine::new(&self.store, &self.clock)
    }

    // ── Writes ────────────────────────────────────────────────────

    pub fn update_loan_pricing(
        &self,
        loan_id: LoanId,
        user_id: Option<UserId>,
        reason: Option<&str>,
    ) -> EngineResult<PricingUpdate> {
        self.price(&new_request_id(), loan_id, user_id, reason)
    }

    pub fn create_risk_assessment(&self, loan_id: LoanId) -> EngineResult<RiskAssessmentResult> {
        self.assess(&new_request_id(), loan_id)
    }

    pub fn generate_sfdr_report(&self, loan_id: LoanId, period: &str) -> EngineResult<SfdrReportResult> {
        self.report(&new_request_id(), loan_id, period)
    }

    pub fn bulk_assess(&self, loan_ids: &[LoanId]) -> EngineResult<BulkAssessment> {
        self.bulk(&new_request_id(), loan_ids)
    }

    /// Dispatch a command. Write commands append their events under
    /// the envelope's request id.
    pub fn execute(&self, command: EngineCommand) -> EngineResult<EngineResponse> {
        let envelope = CommandEnvelope::new(command, self.clock.now());
        self.dispatch(envelope)
    }

    pub fn dispatch(&self, envelope: CommandEnvelope) -> EngineResult<EngineResponse> {
        let request_id = envelope.request_id.as_str();
        log::debug!("request={request_id} command: {:?}", envelope.command);

        let response = match envelope.command {
            EngineCommand::Price { loan_id, user_id, reason } => {
                EngineResponse::Pricing(self.price(request_id, loan_id, user_id, reason.as_deref())?)
            }
            EngineCommand::AssessRisk { loan_id } => {
                EngineResponse::RiskAssessment(self.assess(request_id, loan_id)?)
            }
            EngineCommand::SfdrReport { loan_id, period } => {
                EngineResponse::SfdrReport(self.report(request_id, loan_id, &period)?)
            }
            EngineCommand::BulkAssess { loan_ids } => {
                EngineResponse::BulkAssessment(self.bulk(request_id, &loan_ids)?)
            }
            EngineCommand::PricingHistory { loan_id, limit } => {
                EngineResponse::PricingHistory(self.pricing().pricing_history(loan_id, limit)?)
            }
            EngineCommand::PricingScenarios { loan_id } => {
                EngineResponse::PricingScenarios(self.pricing().simulate_pricing_scenarios(loan_id)?)
            }
            EngineCommand::PricingSummary { loan_id } => {
                EngineResponse::PricingSummary(self.pricing().pricing_summary(loan_id)?)
            }
            EngineCommand::PricingTiers => {
                EngineResponse::PricingTiers(self.pricing().pricing_tiers().to_vec())
            }
            EngineCommand::RiskHistory { loan_id, limit } => {
                EngineResponse::RiskHistory(self.risk().risk_history(loan_id, limit)?)
            }
            EngineCommand::BreachPrediction { loan_id } => {
                EngineResponse::BreachPrediction(self.risk().breach_prediction(loan_id)?)
            }
            EngineCommand::Dashboard => EngineResponse::Dashboard(self.risk().risk_dashboard()?),
            EngineCommand::SfdrReports { loan_id } => {
                EngineResponse::SfdrReports(self.sfdr().sfdr_reports(loan_id)?)
            }
            EngineCommand::FetchSfdrReport { report_id } => {
                EngineResponse::StoredSfdrReport(self.sfdr().sfdr_report(report_id)?)
            }
            EngineCommand::RiskFactors { loan_id } => {
                EngineResponse::RiskFactors(self.risk().risk_factor_breakdown(loan_id)?)
            }
            EngineCommand::ComplianceHistory { loan_id } => {
                EngineResponse::ComplianceHistory(self.sfdr().compliance_history(loan_id)?)
            }
        };
        Ok(response)
    }

    fn price(
        &self,
        request_id: &str,
        loan_id: LoanId,
        user_id: Option<UserId>,
        reason: Option<&str>,
    ) -> EngineResult<PricingUpdate> {
        let update = self.pricing().update_loan_pricing(loan_id, user_id, reason)?;
        self.record(
            request_id,
            &EngineEvent::PricingRecalculated {
                loan_id,
                history_id:            update.history_id,
                esg_performance_score: update.esg_performance_score,
                pricing_tier:          update.pricing_tier.clone(),
                margin_adjustment:     update.margin_adjustment,
            },
        );
        Ok(update)
    }

    fn assess(&self, request_id: &str, loan_id: LoanId) -> EngineResult<RiskAssessmentResult> {
        let result = self.risk().create_risk_assessment(loan_id)?;
        self.record(
            request_id,
            &EngineEvent::RiskAssessed {
                loan_id,
                assessment_id: result.assessment_id,
                risk_score:    result.overall_risk_score,
                risk_category: result.risk_category.as_str().to_string(),
                trend:         result.trend.as_str().to_string(),
            },
        );
        Ok(result)
    }

    fn report(&self, request_id: &str, loan_id: LoanId, period: &str) -> EngineResult<SfdrReportResult> {
        let result = self.sfdr().generate_sfdr_report(loan_id, period)?;
        self.record(
            request_id,
            &EngineEvent::SfdrReportGenerated {
                loan_id,
                report_id:           result.report_id,
                period:              result.period.clone(),
                sfdr_classification: result.sfdr_classification.as_str().to_string(),
            },
        );
        Ok(result)
    }

    fn bulk(&self, request_id: &str, loan_ids: &[LoanId]) -> EngineResult<BulkAssessment> {
        let mut results = Vec::with_capacity(loan_ids.len());
        let mut errors = 0;
        for &loan_id in loan_ids {
            match self.assess(request_id, loan_id) {
                Ok(a) => results.push(BulkAssessmentOutcome::Success {
                    loan_id,
                    risk_score:    a.overall_risk_score,
                    risk_category: a.risk_category,
                }),
                Err(e) if e.is_not_found() => {
                    log::warn!("loan={loan_id} risk: bulk assessment skipped: {e}");
                    errors += 1;
                    results.push(BulkAssessmentOutcome::Error { loan_id, error: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(BulkAssessment {
            total_assessed: results.len() - errors,
            total_errors: errors,
            results,
            assessment_date: self.clock.now(),
        })
    }

    /// Append the event for a committed ledger row. A failed append is
    /// logged and does not fail the command.
    fn record(&self, request_id: &str, event: &EngineEvent) {
        let appended = EventLogEntry::from_event(request_id, event, self.clock.now())
            .map_err(EngineError::from)
            .and_then(|entry| self.store.append_event(&entry));
        if let Err(e) = appended {
            log::warn!(
                "loan={} request={request_id} event log: {} not recorded: {e}",
                event.loan_id(),
                event.type_name()
            );
        }
    }
}
