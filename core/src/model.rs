//! Loan-book entities the engine reads.
//!
//! RULE: the engine never edits these rows except for the derived
//! loan fields (pricing and risk), which only the engine writes.
//! Everything else is owned by the CRUD layer upstream.

use crate::types::{LoanId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base interest rate assumed when a loan has none recorded.
pub const DEFAULT_BASE_RATE: f64 = 4.0;
/// Base margin assumed when a loan has none recorded.
pub const DEFAULT_BASE_MARGIN: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Borrower {
    pub id:       RecordId,
    pub name:     String,
    pub industry: Option<String>,
    pub country:  Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Loan {
    pub id:                    LoanId,
    pub loan_number:           String,
    pub borrower_id:           Option<RecordId>,
    pub loan_type:             Option<String>,
    pub amount:                f64,
    pub currency:              String,
    pub interest_rate:         Option<f64>,
    pub base_margin:           Option<f64>,
    pub current_margin:        Option<f64>,
    pub maturity_date:         Option<DateTime<Utc>>,
    pub status:                String,
    pub sustainability_linked: bool,
    // Derived fields, written by the engine only.
    pub esg_performance_score: Option<f64>,
    pub pricing_tier:          Option<String>,
    pub margin_adjustment:     Option<f64>,
    pub last_pricing_update:   Option<DateTime<Utc>>,
    pub risk_score:            Option<f64>,
    pub risk_category:         Option<String>,
}

impl Loan {
    pub fn base_rate(&self) -> f64 {
        self.interest_rate.unwrap_or(DEFAULT_BASE_RATE)
    }

    pub fn effective_base_margin(&self) -> f64 {
        self.base_margin.unwrap_or(DEFAULT_BASE_MARGIN)
    }
}

/// Insert payload for a loan. Derived fields start empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoan {
    pub loan_number:           String,
    pub borrower_id:           Option<RecordId>,
    pub loan_type:             Option<String>,
    pub amount:                f64,
    pub currency:              String,
    pub interest_rate:         Option<f64>,
    pub base_margin:           Option<f64>,
    pub maturity_date:         Option<DateTime<Utc>>,
    pub status:                String,
    pub sustainability_linked: bool,
}

impl NewLoan {
    pub fn new(loan_number: impl Into<String>, amount: f64) -> Self {
        Self {
            loan_number:           loan_number.into(),
            borrower_id:           None,
            loan_type:             Some("term_loan".into()),
            amount,
            currency:              "USD".into(),
            interest_rate:         Some(DEFAULT_BASE_RATE),
            base_margin:           Some(DEFAULT_BASE_MARGIN),
            maturity_date:         None,
            status:                "active".into(),
            sustainability_linked: true,
        }
    }
}

// ── ESG KPIs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KpiCategory {
    Environmental,
    Social,
    Governance,
}

impl KpiCategory {
    pub const ALL: [KpiCategory; 3] = [
        KpiCategory::Environmental,
        KpiCategory::Social,
        KpiCategory::Governance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environmental => "environmental",
            Self::Social        => "social",
            Self::Governance    => "governance",
        }
    }

    /// Case-insensitive parse. Unknown labels yield None.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "environmental" => Some(Self::Environmental),
            "social"        => Some(Self::Social),
            "governance"    => Some(Self::Governance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EsgKpi {
    pub id:             RecordId,
    pub loan_id:        LoanId,
    pub kpi_name:       String,
    pub kpi_category:   Option<String>,
    pub baseline_value: Option<f64>,
    pub target_value:   Option<f64>,
    pub current_value:  Option<f64>,
    pub unit:           Option<String>,
    pub target_date:    Option<DateTime<Utc>>,
}

impl EsgKpi {
    /// Category used for ESG weighting. A missing label counts as
    /// environmental; an unrecognised label is None and is not weighted.
    pub fn category(&self) -> Option<KpiCategory> {
        match &self.kpi_category {
            None => Some(KpiCategory::Environmental),
            Some(label) if label.is_empty() => Some(KpiCategory::Environmental),
            Some(label) => KpiCategory::from_label(label),
        }
    }

    pub fn is_social(&self) -> bool {
        self.category() == Some(KpiCategory::Social)
    }

    pub fn name_lower(&self) -> String {
        self.kpi_name.to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKpi {
    pub kpi_name:       String,
    pub kpi_category:   Option<String>,
    pub baseline_value: Option<f64>,
    pub target_value:   Option<f64>,
    pub current_value:  Option<f64>,
    pub unit:           Option<String>,
    pub target_date:    Option<DateTime<Utc>>,
}

impl NewKpi {
    pub fn new(
        kpi_name: impl Into<String>,
        category: KpiCategory,
        baseline: Option<f64>,
        target: Option<f64>,
        current: Option<f64>,
    ) -> Self {
        Self {
            kpi_name:       kpi_name.into(),
            kpi_category:   Some(category.as_str().to_string()),
            baseline_value: baseline,
            target_value:   target,
            current_value:  current,
            unit:           None,
            target_date:    None,
        }
    }
}

// ── Covenants ───────────────────────────────────────────────────────

/// Which side of the threshold a covenant must stay on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovenantDirection {
    /// current must stay at or above the threshold (`minimum_*`).
    Minimum,
    /// current must stay at or below the threshold (`maximum_*`).
    Maximum,
}

impl CovenantDirection {
    /// Direction from the covenant type prefix. Unrecognised types
    /// are treated as minimum-style.
    pub fn of(covenant_type: &str) -> Self {
        if covenant_type.starts_with("maximum_") {
            Self::Maximum
        } else {
            Self::Minimum
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Covenant {
    pub id:            RecordId,
    pub loan_id:       LoanId,
    pub covenant_type: String,
    pub threshold:     Option<f64>,
    pub current_value: Option<f64>,
    pub status:        String, // compliant | at_risk | breached | terminated
}

impl Covenant {
    pub fn direction(&self) -> CovenantDirection {
        CovenantDirection::of(&self.covenant_type)
    }

    /// Explicitly declared minimum covenant. Only these are projected
    /// forward for a breach date.
    pub fn is_minimum_type(&self) -> bool {
        self.covenant_type.starts_with("minimum_")
    }

    pub fn is_terminated(&self) -> bool {
        self.status == "terminated"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCovenant {
    pub covenant_type: String,
    pub threshold:     Option<f64>,
    pub current_value: Option<f64>,
    pub status:        String,
}

impl NewCovenant {
    pub fn new(covenant_type: impl Into<String>, threshold: f64, current: f64) -> Self {
        Self {
            covenant_type: covenant_type.into(),
            threshold:     Some(threshold),
            current_value: Some(current),
            status:        "compliant".into(),
        }
    }
}

// ── Verifications ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verification {
    pub id:                RecordId,
    pub loan_id:           LoanId,
    pub verification_type: String,
    pub verification_date: DateTime<Utc>,
    pub status:            String, // completed | failed | pending
    pub confidence_score:  Option<f64>,
}

impl Verification {
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covenant_direction_follows_prefix() {
        assert_eq!(CovenantDirection::of("minimum_ebitda"), CovenantDirection::Minimum);
        assert_eq!(CovenantDirection::of("maximum_leverage"), CovenantDirection::Maximum);
        assert_eq!(CovenantDirection::of("interest_cover"), CovenantDirection::Minimum);
    }

    #[test]
    fn missing_category_counts_as_environmental() {
        let kpi = EsgKpi {
            id: 1,
            loan_id: 1,
            kpi_name: "Scope 1 emissions".into(),
            kpi_category: None,
            baseline_value: None,
            target_value: None,
            current_value: None,
            unit: None,
            target_date: None,
        };
        assert_eq!(kpi.category(), Some(KpiCategory::Environmental));

        let odd = EsgKpi { kpi_category: Some("Other".into()), ..kpi.clone() };
        assert_eq!(odd.category(), None);

        let social = EsgKpi { kpi_category: Some("SOCIAL".into()), ..kpi };
        assert_eq!(social.category(), Some(KpiCategory::Social));
        assert!(social.is_social());

        let padded = EsgKpi { kpi_category: Some(" Social ".into()), ..social };
        assert_eq!(padded.category(), Some(KpiCategory::Social));
        assert!(padded.is_social());
    }
}
