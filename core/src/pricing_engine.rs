//! Pricing tier engine. Maps a loan's ESG performance score onto the
//! margin grid and records every recalculation in the pricing ledger.
//!
//! RULES:
//!   - Tiers are scanned highest threshold first; the first match wins.
//!   - The loan's derived pricing fields and the ledger row are
//!     written together or not at all.
//!   - A recalculation with unchanged inputs yields identical values;
//!     only the ledger grows.

use crate::{
    clock::EngineClock,
    config::{EngineConfig, PricingTier},
    error::{EngineError, EngineResult},
    esg_scoring::{score_kpis, EsgScore},
    ledger::PricingHistoryEntry,
    model::Loan,
    store::{LoanPricingUpdate, LoanStore},
    types::{round2, round4, LoanId, RecordId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default page size for pricing history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Rows inspected when computing the performance trend.
const TREND_WINDOW: usize = 5;

/// Rows shown as "recent changes" in the pricing summary.
const SUMMARY_RECENT: usize = 3;

/// Pick the tier for a score. Scores below every threshold fall into
/// the lowest tier.
pub fn select_tier(tiers: &[PricingTier], esg_score: f64) -> Option<&PricingTier> {
    tiers
        .iter()
        .find(|t| esg_score >= t.threshold)
        .or_else(|| tiers.last())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingUpdate {
    pub loan_id:               LoanId,
    pub loan_number:           String,
    pub history_id:            RecordId,
    pub esg_performance_score: f64,
    pub pricing_tier:          String,
    pub base_rate:             f64,
    pub base_margin:           f64,
    pub margin_adjustment:     f64,
    pub new_margin:            f64,
    pub new_total_rate:        f64,
    pub previous_total_rate:   f64,
    pub rate_change:           f64,
    pub annual_savings:        f64,
    pub annual_cost:           f64,
    pub currency:              String,
    pub effective_date:        DateTime<Utc>,
    pub impact_description:    String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingHistory {
    pub loan_id:     LoanId,
    pub loan_number: String,
    pub history:     Vec<PricingHistoryEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpactType {
    Savings,
    Cost,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingScenario {
    pub tier:              String,
    pub threshold:         f64,
    pub margin_adjustment: f64,
    pub new_margin:        f64,
    pub new_total_rate:    f64,
    pub annual_impact:     f64,
    pub impact_type:       ImpactType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingScenarios {
    pub loan_id:           LoanId,
    pub loan_number:       String,
    pub loan_amount:       f64,
    pub currency:          String,
    pub current_esg_score: Option<f64>,
    pub current_tier:      Option<String>,
    /// One scenario per tier, highest threshold first.
    pub scenarios:         Vec<PricingScenario>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTrend {
    Improving,
    Declining,
    Stable,
}

impl PerformanceTrend {
    /// Compare the newest and oldest score of a newest-first window.
    pub fn from_scores(newest_first: &[f64]) -> Self {
        match (newest_first.first(), newest_first.last()) {
            (Some(newest), Some(oldest)) if newest_first.len() >= 2 => {
                if newest > oldest {
                    Self::Improving
                } else if newest < oldest {
                    Self::Declining
                } else {
                    Self::Stable
                }
            }
            _ => Self::Stable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingSummary {
    pub loan_id:               LoanId,
    pub loan_number:           String,
    pub currency:              String,
    pub esg_performance_score: Option<f64>,
    pub pricing_tier:          Option<String>,
    pub base_rate:             f64,
    pub base_margin:           f64,
    pub current_margin:        Option<f64>,
    pub margin_adjustment:     Option<f64>,
    pub last_pricing_update:   Option<DateTime<Utc>>,
    pub recent_changes:        Vec<PricingHistoryEntry>,
    pub performance_trend:     PerformanceTrend,
}

pub struct PricingEngine<'a> {
    store:  &'a LoanStore,
    config: &'a EngineConfig,
    clock:  &'a EngineClock,
}

impl<'a> PricingEngine<'a> {
    pub fn new(store: &'a LoanStore, config: &'a EngineConfig, clock: &'a EngineClock) -> Self {
        Self { store, config, clock }
    }

    fn load_loan(&self, loan_id: LoanId) -> EngineResult<Loan> {
        self.store
            .loan(loan_id)?
            .ok_or(EngineError::LoanNotFound { loan_id })
    }

    /// ESG performance score of a loan from its current KPIs.
    pub fn esg_performance_score(&self, loan_id: LoanId) -> EngineResult<EsgScore> {
        let kpis = self.store.kpis_for_loan(loan_id)?;
        Ok(score_kpis(&kpis, &self.config.category_weights))
    }

    pub fn determine_tier(&self, esg_score: f64) -> Option<&'a PricingTier> {
        select_tier(&self.config.pricing_tiers, esg_score)
    }

    pub fn update_loan_pricing(
        &self,
        loan_id: LoanId,
        user_id: Option<UserId>,
        reason: Option<&str>,
    ) -> EngineResult<PricingUpdate> {
        let loan = self.load_loan(loan_id)?;
        let score = self.esg_performance_score(loan_id)?;
        let tier = self.determine_tier(score.score).ok_or_else(|| {
            EngineError::Config("pricing grid has no tiers".into())
        })?;

        let adjustment = tier.adjustment;
        let base_margin = loan.effective_base_margin();
        let base_rate = loan.base_rate();
        let new_margin = base_margin + adjustment;
        let new_total_rate = base_rate + new_margin;

        let annual_savings = if adjustment < 0.0 { loan.amount * adjustment.abs() / 100.0 } else { 0.0 };
        let annual_cost = if adjustment > 0.0 { loan.amount * adjustment / 100.0 } else { 0.0 };

        let now = self.clock.now();
        let update = LoanPricingUpdate {
            esg_performance_score: score.score,
            pricing_tier:          tier.tier.clone(),
            current_margin:        new_margin,
            margin_adjustment:     adjustment,
            last_pricing_update:   now,
        };
        let entry = PricingHistoryEntry {
            id:                    None,
            loan_id,
            effective_date:        now,
            base_rate,
            margin:                new_margin,
            total_rate:            new_total_rate,
            esg_performance_score: score.score,
            pricing_tier:          tier.tier.clone(),
            adjustment_reason:     reason
                .map(str::to_string)
                .unwrap_or_else(|| format!("ESG performance tier: {}", tier.tier)),
            adjustment_amount:     adjustment,
            created_by:            user_id,
        };
        let history_id = self.store.record_pricing(&update, &entry)?;

        log::info!(
            "loan={loan_id} pricing: score={:.2} tier={} adjustment={:+.2} margin={:.2}",
            score.score,
            tier.tier,
            adjustment,
            new_margin
        );

        Ok(PricingUpdate {
            loan_id,
            loan_number:           loan.loan_number,
            history_id,
            esg_performance_score: score.score,
            pricing_tier:          tier.tier.clone(),
            base_rate,
            base_margin,
            margin_adjustment:     adjustment,
            new_margin,
            new_total_rate:        round4(new_total_rate),
            previous_total_rate:   round4(base_rate + base_margin),
            rate_change:           round4(adjustment),
            annual_savings:        round2(annual_savings),
            annual_cost:           round2(annual_cost),
            impact_description:    impact_description(
                adjustment,
                annual_savings,
                annual_cost,
                &loan.currency,
            ),
            currency:              loan.currency,
            effective_date:        now,
        })
    }

    pub fn pricing_history(&self, loan_id: LoanId, limit: usize) -> EngineResult<PricingHistory> {
        let loan = self.load_loan(loan_id)?;
        let history = self.store.pricing_history(loan_id, limit)?;
        Ok(PricingHistory {
            loan_id,
            loan_number: loan.loan_number,
            history,
        })
    }

    /// What the loan would pay in every tier of the grid.
    pub fn simulate_pricing_scenarios(&self, loan_id: LoanId) -> EngineResult<PricingScenarios> {
        let loan = self.load_loan(loan_id)?;
        let base_rate = loan.base_rate();
        let base_margin = loan.effective_base_margin();

        let scenarios = self
            .config
            .pricing_tiers
            .iter()
            .map(|tier| {
                let new_margin = base_margin + tier.adjustment;
                let annual_impact = loan.amount * tier.adjustment / 100.0;
                let impact_type = if annual_impact < 0.0 {
                    ImpactType::Savings
                } else if annual_impact > 0.0 {
                    ImpactType::Cost
                } else {
                    ImpactType::Neutral
                };
                PricingScenario {
                    tier: tier.tier.clone(),
                    threshold: tier.threshold,
                    margin_adjustment: tier.adjustment,
                    new_margin,
                    new_total_rate: round4(base_rate + new_margin),
                    annual_impact: round2(annual_impact),
                    impact_type,
                }
            })
            .collect();

        Ok(PricingScenarios {
            loan_id,
            loan_number:       loan.loan_number,
            loan_amount:       loan.amount,
            currency:          loan.currency,
            current_esg_score: loan.esg_performance_score,
            current_tier:      loan.pricing_tier,
            scenarios,
        })
    }

    pub fn pricing_summary(&self, loan_id: LoanId) -> EngineResult<PricingSummary> {
        let loan = self.load_loan(loan_id)?;
        let window = self.store.pricing_history(loan_id, TREND_WINDOW)?;
        let scores: Vec<f64> = window.iter().map(|h| h.esg_performance_score).collect();
        let performance_trend = PerformanceTrend::from_scores(&scores);
        let recent_changes = window.into_iter().take(SUMMARY_RECENT).collect();

        Ok(PricingSummary {
            loan_id,
            base_rate:             loan.base_rate(),
            base_margin:           loan.effective_base_margin(),
            loan_number:           loan.loan_number,
            currency:              loan.currency,
            esg_performance_score: loan.esg_performance_score,
            pricing_tier:          loan.pricing_tier,
            current_margin:        loan.current_margin,
            margin_adjustment:     loan.margin_adjustment,
            last_pricing_update:   loan.last_pricing_update,
            recent_changes,
            performance_trend,
        })
    }

    pub fn pricing_tiers(&self) -> &'a [PricingTier] {
        &self.config.pricing_tiers
    }
}

fn impact_description(adjustment: f64, savings: f64, cost: f64, currency: &str) -> String {
    if adjustment < 0.0 {
        format!(
            "Rate reduced by {:.2}% due to excellent ESG performance. Annual savings: {currency} {}",
            adjustment.abs(),
            format_amount(savings)
        )
    } else if adjustment > 0.0 {
        format!(
            "Rate increased by {adjustment:.2}% due to underperformance. Annual additional cost: {currency} {}",
            format_amount(cost)
        )
    } else {
        "Rate unchanged. ESG performance meets expectations.".to_string()
    }
}

/// Two decimals with thousands separators: 1234567.5 → "1,234,567.50".
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive() {
        let cfg = EngineConfig::standard();
        let tier = |s: f64| select_tier(&cfg.pricing_tiers, s).unwrap().tier.clone();
        assert_eq!(tier(100.0), "excellent");
        assert_eq!(tier(90.0), "excellent");
        assert_eq!(tier(89.99), "good");
        assert_eq!(tier(75.0), "good");
        assert_eq!(tier(60.0), "fair");
        assert_eq!(tier(40.0), "poor");
        assert_eq!(tier(39.99), "critical");
        assert_eq!(tier(0.0), "critical");
        assert_eq!(tier(-5.0), "critical");
    }

    #[test]
    fn adjustment_is_monotone_in_score() {
        let cfg = EngineConfig::standard();
        let mut previous = f64::INFINITY;
        for step in 0..=200 {
            let score = step as f64 * 0.5;
            let adj = select_tier(&cfg.pricing_tiers, score).unwrap().adjustment;
            assert!(adj <= previous, "adjustment rose at score {score}");
            previous = adj;
        }
    }

    #[test]
    fn trend_compares_newest_to_oldest() {
        assert_eq!(PerformanceTrend::from_scores(&[]), PerformanceTrend::Stable);
        assert_eq!(PerformanceTrend::from_scores(&[70.0]), PerformanceTrend::Stable);
        assert_eq!(PerformanceTrend::from_scores(&[80.0, 10.0, 60.0]), PerformanceTrend::Improving);
        assert_eq!(PerformanceTrend::from_scores(&[50.0, 60.0]), PerformanceTrend::Declining);
        assert_eq!(PerformanceTrend::from_scores(&[55.0, 90.0, 55.0]), PerformanceTrend::Stable);
    }

    #[test]
    fn impact_description_wording() {
        assert_eq!(
            impact_description(-0.5, 50_000.0, 0.0, "EUR"),
            "Rate reduced by 0.50% due to excellent ESG performance. Annual savings: EUR 50,000.00"
        );
        assert_eq!(
            impact_description(0.25, 0.0, 2_500.0, "USD"),
            "Rate increased by 0.25% due to underperformance. Annual additional cost: USD 2,500.00"
        );
        assert_eq!(
            impact_description(0.0, 0.0, 0.0, "USD"),
            "Rate unchanged. ESG performance meets expectations."
        );
    }

    #[test]
    fn amounts_are_grouped_by_thousands() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.999), "1,000.00");
        assert_eq!(format_amount(1_234_567.5), "1,234,567.50");
        assert_eq!(format_amount(-12_345.0), "-12,345.00");
    }
}
