//! Deterministic synthetic portfolio generator.
//!
//! Builds borrowers, sustainability-linked loans, ESG KPIs, covenants
//! and verification history from a master seed. Same seed and anchor
//! date, same portfolio. Used by the runner and by tests that need a
//! realistic book rather than a hand-built loan.

use crate::{
    error::EngineResult,
    model::{KpiCategory, NewCovenant, NewKpi, NewLoan},
    rng::{PortfolioRng, SeedStream},
    store::LoanStore,
    types::{round2, LoanId, RecordId},
};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct PortfolioSpec {
    pub seed:   u64,
    pub loans:  usize,
    /// "Today" for maturity and verification dates.
    pub anchor: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeededPortfolio {
    pub borrower_ids:       Vec<RecordId>,
    pub loan_ids:           Vec<LoanId>,
    pub kpi_count:          usize,
    pub covenant_count:     usize,
    pub verification_count: usize,
}

struct KpiTemplate {
    name:     &'static str,
    category: KpiCategory,
    baseline: f64,
    target:   f64,
    unit:     &'static str,
}

const KPI_TEMPLATES: &[KpiTemplate] = &[
    KpiTemplate { name: "Scope 1 and 2 carbon emissions", category: KpiCategory::Environmental, baseline: 10_000.0, target: 7_000.0, unit: "tCO2e" },
    KpiTemplate { name: "Renewable energy share", category: KpiCategory::Environmental, baseline: 20.0, target: 60.0, unit: "percentage" },
    KpiTemplate { name: "Water withdrawal intensity", category: KpiCategory::Environmental, baseline: 500.0, target: 400.0, unit: "m3 per tonne" },
    KpiTemplate { name: "Hazardous waste generated", category: KpiCategory::Environmental, baseline: 800.0, target: 500.0, unit: "tonnes" },
    KpiTemplate { name: "Soil contamination incidents", category: KpiCategory::Environmental, baseline: 12.0, target: 4.0, unit: "number" },
    KpiTemplate { name: "Lost-time injury rate", category: KpiCategory::Social, baseline: 2.5, target: 1.0, unit: "per 200k hours" },
    KpiTemplate { name: "Living wage coverage", category: KpiCategory::Social, baseline: 70.0, target: 100.0, unit: "percentage" },
    KpiTemplate { name: "Board gender diversity", category: KpiCategory::Governance, baseline: 20.0, target: 40.0, unit: "percentage" },
    KpiTemplate { name: "Supplier ESG audit coverage", category: KpiCategory::Governance, baseline: 30.0, target: 90.0, unit: "percentage" },
];

/// (covenant type, threshold)
const COVENANT_TEMPLATES: &[(&str, f64)] = &[
    ("minimum_ebitda", 5_000_000.0),
    ("minimum_equity", 20_000_000.0),
    ("minimum_coverage", 2.0),
    ("maximum_leverage", 4.0),
    ("maximum_debt", 50_000_000.0),
];

const STATUSES: &[(&str, f64)] = &[
    ("active", 0.75),
    ("under_review", 0.10),
    ("at_risk", 0.08),
    ("restructured", 0.05),
    ("defaulted", 0.02),
];

const NAME_PREFIXES: &[&str] = &[
    "Northwind", "Bluewater", "Summit", "Evergreen", "Ironbridge", "Solaris", "Harbor",
    "Granite", "Meridian", "Cedar", "Atlas", "Riverside",
];

const INDUSTRIES: &[&str] = &[
    "Energy", "Logistics", "Manufacturing", "Agriculture", "Real Estate", "Chemicals",
    "Utilities", "Retail", "Mining", "Shipping",
];

const NAME_SUFFIXES: &[&str] = &["Holdings", "Group", "plc", "AG", "SA", "Industries", "Partners"];

const COUNTRIES: &[&str] = &["DE", "FR", "NL", "GB", "ES", "IT", "SE", "US"];

const CURRENCIES: &[&str] = &["EUR", "USD", "GBP"];

/// Insert a synthetic portfolio into the store.
pub fn seed_portfolio(store: &LoanStore, portfolio: &PortfolioSpec) -> EngineResult<SeededPortfolio> {
    let mut borrower_rng = PortfolioRng::new(portfolio.seed, SeedStream::Borrowers);
    let mut loan_rng = PortfolioRng::new(portfolio.seed, SeedStream::Loans);
    let mut kpi_rng = PortfolioRng::new(portfolio.seed, SeedStream::Kpis);
    let mut covenant_rng = PortfolioRng::new(portfolio.seed, SeedStream::Covenants);
    let mut verification_rng = PortfolioRng::new(portfolio.seed, SeedStream::Verifications);

    let offset = store.loan_count()?;
    let mut seeded = SeededPortfolio::default();

    for i in 0..portfolio.loans {
        let (name, industry) = borrower_name(&mut borrower_rng);
        let country = borrower_rng.pick(COUNTRIES).copied();
        let borrower_id = store.insert_borrower(&name, Some(industry), country)?;
        seeded.borrower_ids.push(borrower_id);

        let loan = new_loan(&mut loan_rng, offset + i as i64 + 1, borrower_id, portfolio.anchor);
        let loan_id = store.insert_loan(&loan)?;
        seeded.loan_ids.push(loan_id);

        for kpi in new_kpis(&mut kpi_rng) {
            store.insert_kpi(loan_id, &kpi)?;
            seeded.kpi_count += 1;
        }

        for covenant in new_covenants(&mut covenant_rng) {
            store.insert_covenant(loan_id, &covenant)?;
            seeded.covenant_count += 1;
        }

        let verifications = verification_rng.next_u64_below(5);
        for k in 0..verifications {
            let date = portfolio.anchor - Duration::days(30 * (k as i64 + 1));
            let status = if verification_rng.chance(0.15) { "failed" } else { "completed" };
            let confidence = round2(verification_rng.range(0.6, 0.99));
            store.insert_verification(loan_id, "kpi_measurement", date, status, Some(confidence))?;
            seeded.verification_count += 1;
        }
    }

    log::info!(
        "seed={} portfolio: {} loans, {} kpis, {} covenants, {} verifications",
        portfolio.seed,
        seeded.loan_ids.len(),
        seeded.kpi_count,
        seeded.covenant_count,
        seeded.verification_count
    );
    Ok(seeded)
}

fn borrower_name(rng: &mut PortfolioRng) -> (String, &'static str) {
    let prefix = rng.pick(NAME_PREFIXES).copied().unwrap_or("Northwind");
    let industry = rng.pick(INDUSTRIES).copied().unwrap_or("Energy");
    let suffix = rng.pick(NAME_SUFFIXES).copied().unwrap_or("Group");
    (format!("{prefix} {industry} {suffix}"), industry)
}

fn new_loan(rng: &mut PortfolioRng, number: i64, borrower_id: RecordId, anchor: DateTime<Utc>) -> NewLoan {
    // principal in 100k steps between 5m and 100m
    let amount = (50 + rng.next_u64_below(951)) as f64 * 100_000.0;
    let mut loan = NewLoan::new(format!("SLL-{number:05}"), amount);
    loan.borrower_id = Some(borrower_id);
    let loan_type = if rng.chance(0.3) { "revolving_credit" } else { "term_loan" };
    loan.loan_type = Some(loan_type.to_string());
    loan.currency = rng.pick(CURRENCIES).copied().unwrap_or("EUR").to_string();
    loan.interest_rate = Some(round2(rng.range(3.0, 5.5)));
    loan.base_margin = Some(round2(rng.range(1.5, 3.0)));
    loan.maturity_date = Some(anchor + Duration::days(20 + rng.next_u64_below(2000) as i64));
    loan.status = weighted_status(rng).to_string();
    loan.sustainability_linked = rng.chance(0.9);
    loan
}

fn weighted_status(rng: &mut PortfolioRng) -> &'static str {
    let mut roll = rng.next_f64();
    for (status, weight) in STATUSES {
        if roll < *weight {
            return *status;
        }
        roll -= weight;
    }
    "active"
}

fn new_kpis(rng: &mut PortfolioRng) -> Vec<NewKpi> {
    let mut kpis = Vec::new();
    for template in KPI_TEMPLATES {
        if rng.chance(0.5) {
            kpis.push(kpi_from_template(rng, template));
        }
    }
    if kpis.is_empty() {
        if let Some(t) = rng.pick(KPI_TEMPLATES) {
            kpis.push(kpi_from_template(rng, t));
        }
    }
    kpis
}

fn kpi_from_template(rng: &mut PortfolioRng, t: &KpiTemplate) -> NewKpi {
    // progress from slight regression to overshoot; some KPIs not yet measured
    let current = (!rng.chance(0.1)).then(|| {
        let progress = rng.range(-0.1, 1.25);
        round2(t.baseline + (t.target - t.baseline) * progress)
    });
    let mut kpi = NewKpi::new(t.name, t.category, Some(t.baseline), Some(t.target), current);
    kpi.unit = Some(t.unit.to_string());
    kpi
}

fn new_covenants(rng: &mut PortfolioRng) -> Vec<NewCovenant> {
    let count = rng.next_u64_below(4) as usize;
    let start = rng.next_u64_below(COVENANT_TEMPLATES.len() as u64) as usize;
    (0..count)
        .map(|k| {
            let (kind, threshold) = COVENANT_TEMPLATES[(start + k) % COVENANT_TEMPLATES.len()];
            let factor = if kind.starts_with("maximum_") {
                rng.range(0.6, 1.1)
            } else {
                rng.range(0.9, 1.6)
            };
            let current = round2(threshold * factor);
            let mut covenant = NewCovenant::new(kind, threshold, current);
            let breached = if kind.starts_with("maximum_") { current > threshold } else { current < threshold };
            if breached {
                covenant.status = "breached".to_string();
            }
            covenant
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-12-31T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn statuses_cover_the_unit_interval() {
        let total: f64 = STATUSES.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn every_loan_gets_at_least_one_kpi() {
        let mut rng = PortfolioRng::new(3, SeedStream::Kpis);
        for _ in 0..200 {
            assert!(!new_kpis(&mut rng).is_empty());
        }
    }

    #[test]
    fn seeding_is_deterministic() {
        let portfolio = PortfolioSpec { seed: 11, loans: 6, anchor: anchor() };
        let a = LoanStore::in_memory().unwrap();
        a.migrate().unwrap();
        let b = LoanStore::in_memory().unwrap();
        b.migrate().unwrap();

        let sa = seed_portfolio(&a, &portfolio).unwrap();
        let sb = seed_portfolio(&b, &portfolio).unwrap();
        assert_eq!(sa, sb);
        assert_eq!(a.all_loans().unwrap(), b.all_loans().unwrap());
        for id in &sa.loan_ids {
            assert_eq!(a.kpis_for_loan(*id).unwrap(), b.kpis_for_loan(*id).unwrap());
        }
    }
}
