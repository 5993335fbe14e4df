//! Risk scoring engine: covenant, ESG and financial sub-scores, the
//! weighted composite, a linear breach-date projection and the
//! assessment ledger.
//!
//! Every sub-score is computed from one snapshot of the loan's inputs
//! fetched at the start of an assessment. Nothing here is random.

use crate::{
    clock::EngineClock,
    config::{EngineConfig, RiskWeights},
    error::{EngineError, EngineResult},
    ledger::{RiskAssessmentRecord, RiskFactor, RiskFactors, Severity},
    model::{Covenant, CovenantDirection, EsgKpi, Loan, Verification},
    store::{LoanRiskUpdate, LoanStore},
    types::{round2, LoanId, RecordId},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Verifications considered for the failure ratio.
const VERIFICATION_WINDOW: usize = 5;

/// Difference between consecutive assessments treated as a real move.
const TREND_BAND: f64 = 5.0;

const DASHBOARD_LIST_LIMIT: usize = 10;
const DASHBOARD_ALERT_WINDOW: usize = 5;

pub const BREACH_METHODOLOGY: &str = "Linear covenant deterioration projection";

/// KPIs below this share of target count as a risk driver.
const KPI_DRIVER_ACHIEVEMENT: f64 = 75.0;
const FINANCIAL_DRIVER_SCORE: f64 = 70.0;

// ── Categories ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::Low,
        RiskCategory::Moderate,
        RiskCategory::Elevated,
        RiskCategory::High,
    ];

    /// Half-open bands [0,25) [25,50) [50,75) [75,100]. Anything at or
    /// above 75 is high, anything below 0 is low.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Elevated
        } else if score >= 25.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low      => "low",
            Self::Moderate => "moderate",
            Self::Elevated => "elevated",
            Self::High     => "high",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Low      => "green",
            Self::Moderate => "yellow",
            Self::Elevated => "orange",
            Self::High     => "red",
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Elevated | Self::High)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl RiskTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable     => "stable",
        }
    }

    /// Compare the two most recent scores, newest first.
    pub fn from_scores(newest_first: &[f64]) -> Self {
        match newest_first {
            [recent, previous, ..] if *recent > previous + TREND_BAND => Self::Increasing,
            [recent, previous, ..] if *recent < previous - TREND_BAND => Self::Decreasing,
            _ => Self::Stable,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityLevel {
    VeryHigh,
    High,
    Moderate,
    Low,
}

impl ProbabilityLevel {
    /// Level of a breach probability. The probability is on the 0–100
    /// scale while the cut-offs are 0.75, 0.50 and 0.25, so any
    /// probability above 0.75 reads as very high.
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.75 {
            Self::VeryHigh
        } else if probability > 0.50 {
            Self::High
        } else if probability > 0.25 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

// ── Sub-scores ──────────────────────────────────────────────────────

/// Signed headroom of a covenant relative to its threshold; negative
/// means already breached. None when the covenant cannot be measured.
pub fn covenant_headroom(covenant: &Covenant) -> Option<f64> {
    if covenant.is_terminated() {
        return None;
    }
    let (current, threshold) = (covenant.current_value?, covenant.threshold?);
    if threshold == 0.0 {
        return None;
    }
    Some(match covenant.direction() {
        CovenantDirection::Minimum => (current - threshold) / threshold,
        CovenantDirection::Maximum => (threshold - current) / threshold,
    })
}

fn breach_indicator(headroom: f64) -> f64 {
    if headroom < 0.0 {
        1.0
    } else if headroom < 0.1 {
        0.8
    } else if headroom < 0.2 {
        0.5
    } else {
        0.1
    }
}

/// Covenant breach probability in [0, 100]; 0 when nothing is measurable.
pub fn covenant_breach_probability(covenants: &[Covenant]) -> f64 {
    let indicators: Vec<f64> = covenants
        .iter()
        .filter_map(covenant_headroom)
        .map(breach_indicator)
        .collect();
    if indicators.is_empty() {
        return 0.0;
    }
    round2(indicators.iter().sum::<f64>() / indicators.len() as f64 * 100.0)
}

/// ESG risk in [20, 80]; 50 when no KPI has a measurable trajectory.
/// Slow progress maps to high risk.
pub fn esg_risk_score(kpis: &[EsgKpi]) -> f64 {
    let buckets: Vec<f64> = kpis
        .iter()
        .filter_map(EsgKpi::progress_ratio)
        .map(|progress| {
            if progress < 0.25 {
                80.0
            } else if progress < 0.5 {
                60.0
            } else if progress < 0.75 {
                40.0
            } else {
                20.0
            }
        })
        .collect();
    if buckets.is_empty() {
        return 50.0;
    }
    round2(buckets.iter().sum::<f64>() / buckets.len() as f64)
}

/// Financial risk from loan status, recent verification failures and
/// maturity proximity. Indicators without data are omitted.
pub fn financial_risk_score(
    loan: &Loan,
    recent_verifications: &[Verification],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> f64 {
    let mut indicators = vec![config.status_risk_for(&loan.status)];

    if !recent_verifications.is_empty() {
        let failed = recent_verifications.iter().filter(|v| v.is_failed()).count();
        indicators.push(failed as f64 / recent_verifications.len() as f64 * 100.0);
    }

    if let Some(maturity) = loan.maturity_date {
        let days = (maturity - now).num_days();
        indicators.push(if days < 30 {
            80.0
        } else if days < 90 {
            50.0
        } else {
            20.0
        });
    }

    round2(indicators.iter().sum::<f64>() / indicators.len() as f64)
}

pub fn composite_risk_score(covenant: f64, esg: f64, financial: f64, weights: &RiskWeights) -> f64 {
    round2(covenant * weights.covenant + esg * weights.esg + financial * weights.financial)
}

/// Earliest projected breach across minimum-style covenants within
/// 10% of their threshold, assuming 5% deterioration a month. Only
/// projections inside the next twelve months are kept.
pub fn predict_breach_date(covenants: &[Covenant], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    covenants
        .iter()
        .filter(|c| !c.is_terminated() && c.is_minimum_type())
        .filter_map(|c| {
            let (current, threshold) = (c.current_value?, c.threshold?);
            if threshold == 0.0 || current >= threshold * 1.1 {
                return None;
            }
            let months = (current - threshold) / (threshold * 0.05);
            (months > 0.0 && months < 12.0)
                .then(|| now + Duration::days((months * 30.0).floor() as i64))
        })
        .min()
}

fn severity(score: f64, high_above: f64, moderate_above: f64) -> Severity {
    if score > high_above {
        Severity::High
    } else if score > moderate_above {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

pub fn risk_factors(covenant: f64, esg: f64, financial: f64) -> RiskFactors {
    RiskFactors {
        covenant_risk: RiskFactor {
            score:       covenant,
            severity:    severity(covenant, 50.0, 25.0),
            description: format!("Covenant breach probability: {covenant:.1}%"),
        },
        esg_risk: RiskFactor {
            score:       esg,
            severity:    severity(esg, 60.0, 40.0),
            description: format!("ESG performance score: {esg:.1}"),
        },
        financial_risk: RiskFactor {
            score:       financial,
            severity:    severity(financial, 60.0, 40.0),
            description: format!("Financial stability score: {financial:.1}"),
        },
    }
}

pub fn recommendations(category: RiskCategory, covenant: f64, esg: f64) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();
    if category.needs_attention() {
        out.extend([
            "Schedule immediate stakeholder meeting to address risk factors",
            "Increase monitoring frequency to weekly reviews",
            "Develop detailed risk mitigation action plan",
        ]);
    }
    if covenant > 50.0 {
        out.push("Consider covenant amendment or waiver negotiations");
    }
    if esg > 60.0 {
        out.extend([
            "Engage with borrower on ESG improvement roadmap",
            "Consider requiring third-party ESG audit",
        ]);
    }
    if category == RiskCategory::Low {
        out.extend([
            "Maintain current monitoring schedule",
            "Continue positive engagement with borrower",
        ]);
    }
    out.into_iter().map(String::from).collect()
}

/// More KPIs on file means more data behind the assessment.
pub fn confidence_level(kpi_count: usize) -> f64 {
    (50.0 + 5.0 * kpi_count as f64).min(95.0)
}

/// Per-covenant and per-KPI detail behind the three sub-scores.
pub fn covenant_factor_details(covenants: &[Covenant]) -> Vec<CovenantFactorDetail> {
    covenants
        .iter()
        .map(|c| {
            let compliance = c.status == "compliant";
            CovenantFactorDetail {
                covenant_type:     c.covenant_type.clone(),
                status:            c.status.clone(),
                threshold:         c.threshold,
                current_value:     c.current_value,
                compliance,
                risk_contribution: if compliance { 0.0 } else { 10.0 },
            }
        })
        .collect()
}

/// Achievement here is the plain current/target ratio; KPIs without a
/// positive target are left out.
pub fn kpi_factor_details(kpis: &[EsgKpi]) -> Vec<KpiFactorDetail> {
    kpis.iter()
        .filter_map(|k| {
            let target = k.target_value.filter(|t| *t > 0.0)?;
            let achievement_rate = k.current_value.unwrap_or(0.0) / target * 100.0;
            Some(KpiFactorDetail {
                kpi_name:          k.kpi_name.clone(),
                category:          k.kpi_category.clone(),
                current_value:     k.current_value,
                target_value:      target,
                achievement_rate:  round2(achievement_rate),
                risk_contribution: round2((100.0 - achievement_rate).max(0.0) * 0.3),
            })
        })
        .collect()
}

pub fn key_risk_drivers(
    covenants: &[CovenantFactorDetail],
    kpis: &[KpiFactorDetail],
    financial: f64,
) -> Vec<String> {
    let mut drivers = Vec::new();
    let breached = covenants.iter().filter(|c| !c.compliance).count();
    if breached > 0 {
        drivers.push(format!("{breached} covenant(s) at risk or breached"));
    }
    let lagging = kpis.iter().filter(|k| k.achievement_rate < KPI_DRIVER_ACHIEVEMENT).count();
    if lagging > 0 {
        drivers.push(format!("{lagging} ESG KPI(s) below target"));
    }
    if financial > FINANCIAL_DRIVER_SCORE {
        drivers.push("Elevated financial risk indicators".to_string());
    }
    if drivers.is_empty() {
        drivers.push("No significant risk drivers identified".to_string());
    }
    drivers
}

// ── Payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessmentResult {
    pub loan_id:                     LoanId,
    pub loan_number:                 String,
    pub assessment_id:               RecordId,
    pub assessment_date:             DateTime<Utc>,
    pub overall_risk_score:          f64,
    pub risk_category:               RiskCategory,
    pub risk_category_color:         String,
    pub covenant_breach_probability: f64,
    pub esg_risk_score:              f64,
    pub financial_risk_score:        f64,
    pub predicted_breach_date:       Option<DateTime<Utc>>,
    pub days_to_predicted_breach:    Option<i64>,
    pub confidence_level:            f64,
    pub risk_factors:                RiskFactors,
    pub recommendations:             Vec<String>,
    pub trend:                       RiskTrend,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskHistory {
    pub loan_id:          LoanId,
    pub loan_number:      String,
    pub risk_assessments: Vec<RiskAssessmentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreachPrediction {
    pub loan_id:                LoanId,
    pub loan_number:            String,
    pub breach_probability:     f64,
    pub probability_level:      ProbabilityLevel,
    pub predicted_breach_date:  Option<DateTime<Utc>>,
    pub days_until_breach:      Option<i64>,
    pub prediction_methodology: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskDistribution {
    pub low:      usize,
    pub moderate: usize,
    pub elevated: usize,
    pub high:     usize,
}

impl RiskDistribution {
    fn bump(&mut self, category: RiskCategory) {
        match category {
            RiskCategory::Low      => self.low += 1,
            RiskCategory::Moderate => self.moderate += 1,
            RiskCategory::Elevated => self.elevated += 1,
            RiskCategory::High     => self.high += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.moderate + self.elevated + self.high
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighRiskLoan {
    pub loan_id:       LoanId,
    pub loan_number:   String,
    pub borrower:      String,
    pub risk_score:    f64,
    pub risk_category: RiskCategory,
    pub amount:        f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentAssessment {
    pub loan_id:         LoanId,
    pub loan_number:     Option<String>,
    pub assessment_date: DateTime<Utc>,
    pub risk_score:      f64,
    pub risk_category:   String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAlert {
    pub alert_id:        String,
    pub severity:        Severity,
    pub loan_id:         LoanId,
    pub loan_number:     String,
    pub message:         String,
    pub action_required: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskDashboard {
    pub total_loans:        usize,
    pub risk_distribution:  RiskDistribution,
    pub high_risk_loans:    Vec<HighRiskLoan>,
    pub recent_assessments: Vec<RecentAssessment>,
    pub alerts:             Vec<RiskAlert>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkAssessmentOutcome {
    Success {
        loan_id:       LoanId,
        risk_score:    f64,
        risk_category: RiskCategory,
    },
    Error {
        loan_id: LoanId,
        error:   String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkAssessment {
    pub total_assessed:  usize,
    pub total_errors:    usize,
    pub results:         Vec<BulkAssessmentOutcome>,
    pub assessment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CovenantFactorDetail {
    pub covenant_type:     String,
    pub status:            String,
    pub threshold:         Option<f64>,
    pub current_value:     Option<f64>,
    pub compliance:        bool,
    pub risk_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiFactorDetail {
    pub kpi_name:          String,
    pub category:          Option<String>,
    pub current_value:     Option<f64>,
    pub target_value:      f64,
    pub achievement_rate:  f64,
    pub risk_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialFactorDetail {
    pub loan_status:          String,
    pub status_risk:          f64,
    pub recent_verifications: usize,
    pub failed_verifications: usize,
    pub maturity_date:        Option<DateTime<Utc>>,
}

/// One sub-score with its composite weight and the detail behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorComponent<D> {
    pub score:        f64,
    pub weight:       f64,
    pub contribution: f64,
    pub details:      D,
}

impl<D> FactorComponent<D> {
    fn new(score: f64, weight: f64, details: D) -> Self {
        Self { score, weight, contribution: round2(score * weight), details }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskBreakdown {
    pub covenant_risk:  FactorComponent<Vec<CovenantFactorDetail>>,
    pub esg_risk:       FactorComponent<Vec<KpiFactorDetail>>,
    pub financial_risk: FactorComponent<FinancialFactorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactorBreakdown {
    pub loan_id:            LoanId,
    pub loan_number:        String,
    /// Score of the last stored assessment, 0 when never assessed.
    pub overall_risk_score: f64,
    pub risk_breakdown:     RiskBreakdown,
    pub key_risk_drivers:   Vec<String>,
    pub assessment_date:    DateTime<Utc>,
}

// ── Engine ──────────────────────────────────────────────────────────

/// One snapshot of the inputs an assessment reads.
struct RiskInputs {
    loan:          Loan,
    kpis:          Vec<EsgKpi>,
    covenants:     Vec<Covenant>,
    verifications: Vec<Verification>,
}

pub struct RiskScoringEngine<'a> {
    store:  &'a LoanStore,
    config: &'a EngineConfig,
    clock:  &'a EngineClock,
}

impl<'a> RiskScoringEngine<'a> {
    pub fn new(store: &'a LoanStore, config: &'a EngineConfig, clock: &'a EngineClock) -> Self {
        Self { store, config, clock }
    }

    fn load_loan(&self, loan_id: LoanId) -> EngineResult<Loan> {
        self.store
            .loan(loan_id)?
            .ok_or(EngineError::LoanNotFound { loan_id })
    }

    fn load_inputs(&self, loan_id: LoanId) -> EngineResult<RiskInputs> {
        let loan = self.load_loan(loan_id)?;
        Ok(RiskInputs {
            loan,
            kpis:          self.store.kpis_for_loan(loan_id)?,
            covenants:     self.store.active_covenants(loan_id)?,
            verifications: self.store.recent_verifications(loan_id, VERIFICATION_WINDOW)?,
        })
    }

    pub fn covenant_breach_probability(&self, loan_id: LoanId) -> EngineResult<f64> {
        self.load_loan(loan_id)?;
        Ok(covenant_breach_probability(&self.store.active_covenants(loan_id)?))
    }

    pub fn esg_risk_score(&self, loan_id: LoanId) -> EngineResult<f64> {
        self.load_loan(loan_id)?;
        Ok(esg_risk_score(&self.store.kpis_for_loan(loan_id)?))
    }

    pub fn financial_risk_score(&self, loan_id: LoanId) -> EngineResult<f64> {
        let loan = self.load_loan(loan_id)?;
        let verifications = self.store.recent_verifications(loan_id, VERIFICATION_WINDOW)?;
        Ok(financial_risk_score(&loan, &verifications, self.config, self.clock.now()))
    }

    pub fn create_risk_assessment(&self, loan_id: LoanId) -> EngineResult<RiskAssessmentResult> {
        let inputs = self.load_inputs(loan_id)?;
        let now = self.clock.now();

        let covenant = covenant_breach_probability(&inputs.covenants);
        let esg = esg_risk_score(&inputs.kpis);
        let financial = financial_risk_score(&inputs.loan, &inputs.verifications, self.config, now);
        let overall = composite_risk_score(covenant, esg, financial, &self.config.risk_weights);
        let category = RiskCategory::from_score(overall);
        let predicted_breach_date = predict_breach_date(&inputs.covenants, now);
        let factors = risk_factors(covenant, esg, financial);
        let actions = recommendations(category, covenant, esg);
        let confidence = confidence_level(inputs.kpis.len());

        let record = RiskAssessmentRecord {
            id:                          None,
            loan_id,
            assessment_date:             now,
            risk_score:                  overall,
            risk_category:               category.as_str().to_string(),
            covenant_breach_probability: covenant,
            esg_risk_score:              esg,
            financial_risk_score:        financial,
            predicted_breach_date,
            confidence_level:            confidence,
            risk_factors:                factors.clone(),
            recommendations:             actions.clone(),
        };
        let update = LoanRiskUpdate {
            risk_score:    overall,
            risk_category: category.as_str().to_string(),
        };
        let assessment_id = self.store.record_risk_assessment(&update, &record)?;

        // Trend includes the row just written.
        let trend = self.risk_trend(loan_id)?;

        log::info!(
            "loan={loan_id} risk: score={overall:.2} category={} covenant={covenant:.2} esg={esg:.2} financial={financial:.2} trend={}",
            category.as_str(),
            trend.as_str()
        );
        if predicted_breach_date.is_some() {
            log::warn!("loan={loan_id} risk: covenant breach projected within twelve months");
        }

        Ok(RiskAssessmentResult {
            loan_id,
            loan_number: inputs.loan.loan_number,
            assessment_id,
            assessment_date: now,
            overall_risk_score: overall,
            risk_category: category,
            risk_category_color: category.color().to_string(),
            covenant_breach_probability: covenant,
            esg_risk_score: esg,
            financial_risk_score: financial,
            predicted_breach_date,
            days_to_predicted_breach: predicted_breach_date.map(|d| (d - now).num_days()),
            confidence_level: confidence,
            risk_factors: factors,
            recommendations: actions,
            trend,
        })
    }

    pub fn risk_trend(&self, loan_id: LoanId) -> EngineResult<RiskTrend> {
        let recent = self.store.risk_assessments(loan_id, 2)?;
        let scores: Vec<f64> = recent.iter().map(|a| a.risk_score).collect();
        Ok(RiskTrend::from_scores(&scores))
    }

    pub fn risk_history(&self, loan_id: LoanId, limit: usize) -> EngineResult<RiskHistory> {
        let loan = self.load_loan(loan_id)?;
        Ok(RiskHistory {
            loan_id,
            loan_number:      loan.loan_number,
            risk_assessments: self.store.risk_assessments(loan_id, limit)?,
        })
    }

    pub fn breach_prediction(&self, loan_id: LoanId) -> EngineResult<BreachPrediction> {
        let loan = self.load_loan(loan_id)?;
        let covenants = self.store.active_covenants(loan_id)?;
        let now = self.clock.now();
        let probability = covenant_breach_probability(&covenants);
        let predicted = predict_breach_date(&covenants, now);

        Ok(BreachPrediction {
            loan_id,
            loan_number:            loan.loan_number,
            breach_probability:     probability,
            probability_level:      ProbabilityLevel::from_probability(probability),
            predicted_breach_date:  predicted,
            days_until_breach:      predicted
                .map(|d| (d.date_naive() - now.date_naive()).num_days()),
            prediction_methodology: BREACH_METHODOLOGY.to_string(),
        })
    }

    /// Breakdown of the current sub-scores with the covenant, KPI and
    /// status detail behind each. Reads only; nothing is stored.
    pub fn risk_factor_breakdown(&self, loan_id: LoanId) -> EngineResult<RiskFactorBreakdown> {
        let inputs = self.load_inputs(loan_id)?;
        let now = self.clock.now();
        let weights = &self.config.risk_weights;

        let covenant = covenant_breach_probability(&inputs.covenants);
        let esg = esg_risk_score(&inputs.kpis);
        let financial = financial_risk_score(&inputs.loan, &inputs.verifications, self.config, now);

        let covenant_details = covenant_factor_details(&inputs.covenants);
        let kpi_details = kpi_factor_details(&inputs.kpis);
        let key_risk_drivers = key_risk_drivers(&covenant_details, &kpi_details, financial);

        let financial_details = FinancialFactorDetail {
            status_risk:          self.config.status_risk_for(&inputs.loan.status),
            loan_status:          inputs.loan.status.clone(),
            recent_verifications: inputs.verifications.len(),
            failed_verifications: inputs.verifications.iter().filter(|v| v.is_failed()).count(),
            maturity_date:        inputs.loan.maturity_date,
        };

        Ok(RiskFactorBreakdown {
            loan_id,
            loan_number:        inputs.loan.loan_number,
            overall_risk_score: inputs.loan.risk_score.unwrap_or(0.0),
            risk_breakdown: RiskBreakdown {
                covenant_risk:  FactorComponent::new(covenant, weights.covenant, covenant_details),
                esg_risk:       FactorComponent::new(esg, weights.esg, kpi_details),
                financial_risk: FactorComponent::new(financial, weights.financial, financial_details),
            },
            key_risk_drivers,
            assessment_date: now,
        })
    }

    /// Portfolio view over the derived risk fields of every loan.
    /// Loans never assessed count as moderate.
    pub fn risk_dashboard(&self) -> EngineResult<RiskDashboard> {
        let loans = self.store.all_loans()?;
        let mut distribution = RiskDistribution { low: 0, moderate: 0, elevated: 0, high: 0 };
        let mut high_risk_loans = Vec::new();

        for loan in &loans {
            let category = loan
                .risk_category
                .as_deref()
                .and_then(RiskCategory::from_label)
                .unwrap_or(RiskCategory::Moderate);
            distribution.bump(category);

            if category.needs_attention() {
                let borrower = match loan.borrower_id {
                    Some(id) => self.store.borrower(id)?.map(|b| b.name),
                    None => None,
                };
                high_risk_loans.push(HighRiskLoan {
                    loan_id:       loan.id,
                    loan_number:   loan.loan_number.clone(),
                    borrower:      borrower.unwrap_or_else(|| "Unknown".to_string()),
                    risk_score:    loan.risk_score.unwrap_or(50.0),
                    risk_category: category,
                    amount:        loan.amount,
                });
            }
        }

        let recent_assessments = self
            .store
            .recent_risk_assessments(DASHBOARD_LIST_LIMIT)?
            .into_iter()
            .map(|a| RecentAssessment {
                loan_number:     loans
                    .iter()
                    .find(|l| l.id == a.loan_id)
                    .map(|l| l.loan_number.clone()),
                loan_id:         a.loan_id,
                assessment_date: a.assessment_date,
                risk_score:      a.risk_score,
                risk_category:   a.risk_category,
            })
            .collect();

        let alerts = high_risk_loans
            .iter()
            .take(DASHBOARD_ALERT_WINDOW)
            .filter(|l| l.risk_category == RiskCategory::High)
            .map(|l| RiskAlert {
                alert_id:        format!("RISK-{}", l.loan_id),
                severity:        Severity::High,
                loan_id:         l.loan_id,
                loan_number:     l.loan_number.clone(),
                message:         format!("High risk detected for loan {}", l.loan_number),
                action_required: "Review covenant compliance and ESG performance".to_string(),
            })
            .collect();

        high_risk_loans.truncate(DASHBOARD_LIST_LIMIT);

        Ok(RiskDashboard {
            total_loans: loans.len(),
            risk_distribution: distribution,
            high_risk_loans,
            recent_assessments,
            alerts,
        })
    }
}
