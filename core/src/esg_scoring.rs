//! ESG performance scorer.
//!
//! Weighted average of per-category mean achievement. Categories with
//! no contributing KPI are skipped and the weights actually used are
//! renormalised, so a governance-only loan is scored purely on its
//! governance average.

use crate::{
    config::CategoryWeights,
    model::{EsgKpi, KpiCategory},
    types::round2,
};
use serde::{Deserialize, Serialize};

/// Score returned when no KPI contributes an achievement.
pub const NEUTRAL_ESG_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EsgScore {
    /// Composite in [0, 100], rounded to two decimals.
    pub score: f64,
    /// Mean achievement per category; None when the category had no
    /// contributing KPI.
    pub environmental: Option<f64>,
    pub social: Option<f64>,
    pub governance: Option<f64>,
    /// KPIs whose achievement was defined.
    pub contributing_kpis: usize,
}

impl EsgScore {
    pub fn category_average(&self, category: KpiCategory) -> Option<f64> {
        match category {
            KpiCategory::Environmental => self.environmental,
            KpiCategory::Social => self.social,
            KpiCategory::Governance => self.governance,
        }
    }

    pub fn is_neutral_default(&self) -> bool {
        self.contributing_kpis == 0
    }
}

pub fn score_kpis(kpis: &[EsgKpi], weights: &CategoryWeights) -> EsgScore {
    let mut sums = [0.0_f64; 3];
    let mut counts = [0_usize; 3];

    for kpi in kpis {
        let Some(achievement) = kpi.achievement() else { continue };
        let Some(category) = kpi.category() else { continue };
        let idx = category_index(category);
        sums[idx] += achievement;
        counts[idx] += 1;
    }

    let averages: Vec<Option<f64>> = (0..3)
        .map(|i| (counts[i] > 0).then(|| sums[i] / counts[i] as f64))
        .collect();

    let mut total_score = 0.0;
    let mut total_weight = 0.0;
    for category in KpiCategory::ALL {
        if let Some(avg) = averages[category_index(category)] {
            let weight = weights.weight(category);
            total_score += avg * weight;
            total_weight += weight;
        }
    }

    let score = if total_weight > 0.0 {
        round2(total_score / total_weight)
    } else {
        NEUTRAL_ESG_SCORE
    };

    EsgScore {
        score,
        environmental: averages[0],
        social: averages[1],
        governance: averages[2],
        contributing_kpis: counts.iter().sum(),
    }
}

fn category_index(category: KpiCategory) -> usize {
    match category {
        KpiCategory::Environmental => 0,
        KpiCategory::Social => 1,
        KpiCategory::Governance => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn kpi(category: &str, baseline: f64, target: f64, current: f64) -> EsgKpi {
        EsgKpi {
            id: 0,
            loan_id: 1,
            kpi_name: format!("{category} kpi"),
            kpi_category: Some(category.into()),
            baseline_value: Some(baseline),
            target_value: Some(target),
            current_value: Some(current),
            unit: None,
            target_date: None,
        }
    }

    fn weights() -> CategoryWeights {
        EngineConfig::standard().category_weights
    }

    #[test]
    fn no_kpis_is_neutral() {
        let s = score_kpis(&[], &weights());
        assert_eq!(s.score, NEUTRAL_ESG_SCORE);
        assert!(s.is_neutral_default());
    }

    #[test]
    fn undefined_achievements_are_excluded_not_zeroed() {
        // The flat KPI would drag the average to 50 if counted as 0.
        let kpis = vec![
            kpi("environmental", 100.0, 30.0, 30.0),
            kpi("environmental", 10.0, 10.0, 5.0),
        ];
        let s = score_kpis(&kpis, &weights());
        assert_eq!(s.score, 100.0);
        assert_eq!(s.contributing_kpis, 1);
    }

    #[test]
    fn governance_only_is_renormalised() {
        let kpis = vec![
            kpi("governance", 0.5, 1.0, 0.75),  // 50
            kpi("governance", 10.0, 20.0, 19.0), // 90
        ];
        let s = score_kpis(&kpis, &weights());
        assert_eq!(s.score, 70.0);
        assert_eq!(s.governance, Some(70.0));
        assert_eq!(s.environmental, None);
    }

    #[test]
    fn weights_applied_across_categories() {
        let kpis = vec![
            kpi("environmental", 100.0, 0.5, 0.5), // 100
            kpi("social", 10.0, 20.0, 10.0),       // 0
            kpi("governance", 1.0, 3.0, 2.0),      // 50
        ];
        let s = score_kpis(&kpis, &weights());
        // (100*0.4 + 0*0.3 + 50*0.3) / 1.0
        assert_eq!(s.score, 55.0);
    }

    #[test]
    fn unknown_category_is_ignored() {
        let kpis = vec![kpi("biodiversity", 10.0, 20.0, 15.0)];
        let s = score_kpis(&kpis, &weights());
        assert_eq!(s.score, NEUTRAL_ESG_SCORE);
    }
}
