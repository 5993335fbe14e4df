//! Append-only ledger records written by the engine.
//!
//! RULE: ledger rows are never updated. History is rebuilt by reading
//! every row for a loan, newest first. `id` is None until the store
//! has inserted the row.

use crate::{
    pai::PaiIndicators,
    types::{LoanId, RecordId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Pricing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingHistoryEntry {
    pub id:                    Option<RecordId>,
    pub loan_id:               LoanId,
    pub effective_date:        DateTime<Utc>,
    pub base_rate:             f64,
    pub margin:                f64,
    pub total_rate:            f64,
    pub esg_performance_score: f64,
    pub pricing_tier:          String,
    pub adjustment_reason:     String,
    pub adjustment_amount:     f64,
    pub created_by:            Option<UserId>,
}

// ── Risk ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub score:       f64,
    pub severity:    Severity,
    pub description: String,
}

/// Breakdown stored with every assessment. Key names match the
/// `risk_factors` JSON column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactors {
    pub covenant_risk:  RiskFactor,
    pub esg_risk:       RiskFactor,
    pub financial_risk: RiskFactor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessmentRecord {
    pub id:                          Option<RecordId>,
    pub loan_id:                     LoanId,
    pub assessment_date:             DateTime<Utc>,
    pub risk_score:                  f64,
    pub risk_category:               String,
    pub covenant_breach_probability: f64,
    pub esg_risk_score:              f64,
    pub financial_risk_score:        f64,
    pub predicted_breach_date:       Option<DateTime<Utc>>,
    pub confidence_level:            f64,
    pub risk_factors:                RiskFactors,
    pub recommendations:             Vec<String>,
}

// ── SFDR ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SfdrArticle {
    #[serde(rename = "article_6")]
    Article6,
    #[serde(rename = "article_8")]
    Article8,
    #[serde(rename = "article_9")]
    Article9,
}

impl SfdrArticle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article6 => "article_6",
            Self::Article8 => "article_8",
            Self::Article9 => "article_9",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "article_6" => Some(Self::Article6),
            "article_8" => Some(Self::Article8),
            "article_9" => Some(Self::Article9),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Article6 => {
                "Financial products that do not promote environmental or social characteristics"
            }
            Self::Article8 => "Financial products promoting environmental or social characteristics",
            Self::Article9 => "Financial products with sustainable investment as their objective",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectiveAlignment {
    pub aligned:                  bool,
    pub substantial_contribution: bool,
    pub dnsh_compliance:          bool,
    pub minimum_safeguards:       bool,
    pub alignment_percentage:     f64,
}

impl ObjectiveAlignment {
    pub fn unaligned() -> Self {
        Self {
            aligned:                  false,
            substantial_contribution: false,
            dnsh_compliance:          false,
            minimum_safeguards:       false,
            alignment_percentage:     0.0,
        }
    }
}

/// The six EU Taxonomy environmental objectives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxonomyAlignment {
    pub climate_change_mitigation: ObjectiveAlignment,
    pub climate_change_adaptation: ObjectiveAlignment,
    pub sustainable_use_water:     ObjectiveAlignment,
    pub circular_economy:          ObjectiveAlignment,
    pub pollution_prevention:      ObjectiveAlignment,
    pub biodiversity_ecosystems:   ObjectiveAlignment,
}

impl TaxonomyAlignment {
    pub fn unaligned() -> Self {
        Self {
            climate_change_mitigation: ObjectiveAlignment::unaligned(),
            climate_change_adaptation: ObjectiveAlignment::unaligned(),
            sustainable_use_water:     ObjectiveAlignment::unaligned(),
            circular_economy:          ObjectiveAlignment::unaligned(),
            pollution_prevention:      ObjectiveAlignment::unaligned(),
            biodiversity_ecosystems:   ObjectiveAlignment::unaligned(),
        }
    }

    pub fn objectives(&self) -> [(&'static str, &ObjectiveAlignment); 6] {
        [
            ("climate_change_mitigation", &self.climate_change_mitigation),
            ("climate_change_adaptation", &self.climate_change_adaptation),
            ("sustainable_use_water", &self.sustainable_use_water),
            ("circular_economy", &self.circular_economy),
            ("pollution_prevention", &self.pollution_prevention),
            ("biodiversity_ecosystems", &self.biodiversity_ecosystems),
        ]
    }

    pub fn any_aligned(&self) -> bool {
        self.objectives().iter().any(|(_, o)| o.aligned)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AreaCompliance {
    pub compliant: bool,
    pub issues:    Vec<String>,
}

impl AreaCompliance {
    pub fn clean() -> Self {
        Self { compliant: true, issues: Vec::new() }
    }

    pub fn flag(&mut self, issue: String) {
        self.compliant = false;
        self.issues.push(issue);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentalHarm {
    pub climate_mitigation: AreaCompliance,
    pub climate_adaptation: AreaCompliance,
    pub water_marine:       AreaCompliance,
    pub circular_economy:   AreaCompliance,
    pub pollution:          AreaCompliance,
    pub biodiversity:       AreaCompliance,
}

impl EnvironmentalHarm {
    pub fn areas(&self) -> [&AreaCompliance; 6] {
        [
            &self.climate_mitigation,
            &self.climate_adaptation,
            &self.water_marine,
            &self.circular_economy,
            &self.pollution,
            &self.biodiversity,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnshAssessment {
    pub overall_compliant:  bool,
    pub environmental_harm: EnvironmentalHarm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafeguardEvidence {
    pub compliant: bool,
    pub evidence:  Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialSafeguards {
    pub oecd_guidelines:           SafeguardEvidence,
    pub un_guiding_principles:     SafeguardEvidence,
    pub ilo_conventions:           SafeguardEvidence,
    pub international_bill_rights: SafeguardEvidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutiveSummary {
    pub loan_number:                String,
    pub borrower:                   String,
    pub report_period:              String,
    pub sfdr_classification:        SfdrArticle,
    pub classification_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SustainableInvestmentAnalysis {
    pub percentage_sustainable:  f64,
    pub calculation_methodology: String,
    pub qualifying_activities:   Vec<String>,
}

/// Full report body, stored in the `report_data` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SfdrReportData {
    pub executive_summary:               ExecutiveSummary,
    pub sustainable_investment_analysis: SustainableInvestmentAnalysis,
    pub principal_adverse_impacts:       PaiIndicators,
    pub taxonomy_alignment:              TaxonomyAlignment,
    pub dnsh_assessment:                 DnshAssessment,
    pub social_safeguards:               SocialSafeguards,
    pub disclosure_statement:            String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SfdrReportRecord {
    pub id:                                 Option<RecordId>,
    pub loan_id:                            LoanId,
    pub report_period:                      String,
    pub sfdr_classification:                SfdrArticle,
    pub principal_adverse_impacts:          PaiIndicators,
    pub sustainable_investment_percentage:  f64,
    pub taxonomy_alignment:                 TaxonomyAlignment,
    pub do_no_significant_harm_assessment:  DnshAssessment,
    pub social_safeguards:                  SocialSafeguards,
    pub generated_date:                     DateTime<Utc>,
    pub status:                             String,
    pub report_data:                        SfdrReportData,
}
