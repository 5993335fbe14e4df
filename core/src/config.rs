use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::KpiCategory;

/// One row of the ESG pricing grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingTier {
    pub tier: String,
    /// Minimum ESG score (inclusive) for this tier.
    pub threshold: f64,
    /// Margin adjustment in percentage points (−0.50 = 50 bps discount).
    pub adjustment: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct PricingTiersFile {
    tiers: Vec<PricingTier>,
}

/// ESG category weights. Only categories with at least one
/// contributing KPI take part in the weighted average.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CategoryWeights {
    pub environmental: f64,
    pub social: f64,
    pub governance: f64,
}

impl CategoryWeights {
    pub fn weight(&self, category: KpiCategory) -> f64 {
        match category {
            KpiCategory::Environmental => self.environmental,
            KpiCategory::Social => self.social,
            KpiCategory::Governance => self.governance,
        }
    }
}

/// Weights of the three risk sub-scores in the composite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskWeights {
    pub covenant: f64,
    pub esg: f64,
    pub financial: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RiskModelFile {
    category_weights: CategoryWeights,
    risk_weights: RiskWeights,
    status_risk: HashMap<String, f64>,
    #[serde(default = "default_unknown_status_risk")]
    unknown_status_risk: f64,
}

fn default_unknown_status_risk() -> f64 {
    50.0
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sorted by threshold, highest first.
    pub pricing_tiers: Vec<PricingTier>,
    pub category_weights: CategoryWeights,
    pub risk_weights: RiskWeights,
    /// Financial-risk contribution per loan status.
    pub status_risk: HashMap<String, f64>,
    pub unknown_status_risk: f64,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::standard().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let tiers_path = format!("{data_dir}/pricing/pricing_tiers.json");
        let tiers_content = std::fs::read_to_string(&tiers_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tiers_path}: {e}"))?;
        let tiers_file: PricingTiersFile = serde_json::from_str(&tiers_content)?;

        let risk_path = format!("{data_dir}/risk/risk_model.json");
        let risk_content = std::fs::read_to_string(&risk_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {risk_path}: {e}"))?;
        let risk_file: RiskModelFile = serde_json::from_str(&risk_content)?;

        let config = Self::from_parts(
            tiers_file.tiers,
            risk_file.category_weights,
            risk_file.risk_weights,
            risk_file.status_risk,
            risk_file.unknown_status_risk,
        )?;
        log::info!(
            "config: loaded {} pricing tiers and {} status risk entries from {data_dir}",
            config.pricing_tiers.len(),
            config.status_risk.len()
        );
        Ok(config)
    }

    /// The standard sustainability-linked loan grid.
    pub fn standard() -> Self {
        let tier = |name: &str, threshold: f64, adjustment: f64| PricingTier {
            tier: name.into(),
            threshold,
            adjustment,
        };
        let status_risk = [
            ("active", 20.0),
            ("under_review", 40.0),
            ("at_risk", 70.0),
            ("defaulted", 100.0),
            ("restructured", 60.0),
        ]
        .into_iter()
        .map(|(s, r)| (s.to_string(), r))
        .collect();

        Self {
            pricing_tiers: vec![
                tier("excellent", 90.0, -0.50),
                tier("good", 75.0, -0.25),
                tier("fair", 60.0, 0.0),
                tier("poor", 40.0, 0.25),
                tier("critical", 0.0, 0.50),
            ],
            category_weights: CategoryWeights {
                environmental: 0.40,
                social: 0.30,
                governance: 0.30,
            },
            risk_weights: RiskWeights {
                covenant: 0.4,
                esg: 0.3,
                financial: 0.3,
            },
            status_risk,
            unknown_status_risk: 50.0,
        }
    }

    fn from_parts(
        mut pricing_tiers: Vec<PricingTier>,
        category_weights: CategoryWeights,
        risk_weights: RiskWeights,
        status_risk: HashMap<String, f64>,
        unknown_status_risk: f64,
    ) -> anyhow::Result<Self> {
        if pricing_tiers.is_empty() {
            anyhow::bail!("pricing grid has no tiers");
        }
        pricing_tiers.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        let floor = pricing_tiers.last().map(|t| t.threshold).unwrap_or(f64::NAN);
        if floor > 0.0 || floor.is_nan() {
            anyhow::bail!("pricing grid must include a tier with threshold 0 (lowest is {floor})");
        }

        let weights = [
            category_weights.environmental,
            category_weights.social,
            category_weights.governance,
            risk_weights.covenant,
            risk_weights.esg,
            risk_weights.financial,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            anyhow::bail!("all category and risk weights must be positive");
        }

        Ok(Self {
            pricing_tiers,
            category_weights,
            risk_weights,
            status_risk,
            unknown_status_risk,
        })
    }

    /// Financial-risk contribution of a loan status.
    pub fn status_risk_for(&self, status: &str) -> f64 {
        self.status_risk
            .get(status)
            .copied()
            .unwrap_or(self.unknown_status_risk)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}
