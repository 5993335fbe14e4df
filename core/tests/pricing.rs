use chrono::{DateTime, Utc};
use slla_core::{
    engine::AssessmentEngine,
    error::EngineError,
    event::EngineEvent,
    model::{KpiCategory, NewKpi, NewLoan},
    pricing_engine::{ImpactType, PerformanceTrend},
    types::LoanId,
};

mod common;

fn at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-12-31T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn engine_with_loan(amount: f64) -> (AssessmentEngine, LoanId) {
    common::init_logging();
    let engine = AssessmentEngine::build_test(at()).unwrap();
    let loan_id = engine
        .store()
        .insert_loan(&NewLoan::new("SLL-00001", amount))
        .unwrap();
    (engine, loan_id)
}

#[test]
fn loan_without_kpis_prices_into_poor_tier() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);

    let update = engine.update_loan_pricing(loan_id, None, None).unwrap();

    // No measurable KPI: neutral score of 50
    assert_eq!(update.esg_performance_score, 50.0);
    assert_eq!(update.pricing_tier, "poor");
    assert_eq!(update.margin_adjustment, 0.25);
    assert_eq!(update.new_margin, 2.25);
    assert_eq!(update.new_total_rate, 6.25);
    assert_eq!(update.previous_total_rate, 6.0);
    assert_eq!(update.annual_cost, 2_500.0);
    assert_eq!(update.annual_savings, 0.0);
    assert_eq!(
        update.impact_description,
        "Rate increased by 0.25% due to underperformance. Annual additional cost: USD 2,500.00"
    );

    let loan = engine.store().loan(loan_id).unwrap().unwrap();
    assert_eq!(loan.esg_performance_score, Some(50.0));
    assert_eq!(loan.pricing_tier.as_deref(), Some("poor"));
    assert_eq!(loan.current_margin, Some(2.25));
    assert_eq!(loan.margin_adjustment, Some(0.25));
    assert_eq!(loan.last_pricing_update, Some(at()));
}

#[test]
fn half_way_reduction_kpi_prices_into_poor_tier() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);
    // 100 -> 30 target, now at 65: half the reduction achieved
    engine
        .store()
        .insert_kpi(
            loan_id,
            &NewKpi::new("Carbon emissions", KpiCategory::Environmental, Some(100.0), Some(30.0), Some(65.0)),
        )
        .unwrap();

    let update = engine.update_loan_pricing(loan_id, None, None).unwrap();
    assert_eq!(update.esg_performance_score, 50.0);
    assert_eq!(update.pricing_tier, "poor");
    assert_eq!(update.margin_adjustment, 0.25);

    let rows = engine.pricing().pricing_history(loan_id, 10).unwrap().history;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].esg_performance_score, 50.0);
    assert_eq!(rows[0].pricing_tier, "poor");
}

#[test]
fn overachieving_kpi_earns_excellent_discount() {
    let (engine, loan_id) = engine_with_loan(10_000_000.0);
    // emissions cut past target: achievement capped at 100
    engine
        .store()
        .insert_kpi(
            loan_id,
            &NewKpi::new("Carbon emissions", KpiCategory::Environmental, Some(100.0), Some(50.0), Some(40.0)),
        )
        .unwrap();

    let update = engine.update_loan_pricing(loan_id, None, None).unwrap();
    assert_eq!(update.esg_performance_score, 100.0);
    assert_eq!(update.pricing_tier, "excellent");
    assert_eq!(update.margin_adjustment, -0.5);
    assert_eq!(update.new_margin, 1.5);
    assert_eq!(update.annual_savings, 50_000.0);
    assert_eq!(update.annual_cost, 0.0);
    assert!(update.impact_description.starts_with("Rate reduced by 0.50%"));
}

#[test]
fn category_weights_renormalise_over_present_categories() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);
    let store = engine.store();
    store
        .insert_kpi(
            loan_id,
            &NewKpi::new("Carbon emissions", KpiCategory::Environmental, Some(100.0), Some(50.0), Some(50.0)),
        )
        .unwrap();
    store
        .insert_kpi(
            loan_id,
            &NewKpi::new("Living wage coverage", KpiCategory::Social, Some(0.0), Some(100.0), Some(50.0)),
        )
        .unwrap();

    // (100 * 0.4 + 50 * 0.3) / 0.7
    let score = engine.pricing().esg_performance_score(loan_id).unwrap();
    assert_eq!(score.score, 78.57);
    assert_eq!(score.governance, None);
    assert_eq!(score.contributing_kpis, 2);

    let update = engine.update_loan_pricing(loan_id, None, None).unwrap();
    assert_eq!(update.pricing_tier, "good");
    assert_eq!(update.margin_adjustment, -0.25);
}

#[test]
fn every_recalculation_appends_history() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);

    let first = engine.update_loan_pricing(loan_id, None, None).unwrap();
    let second = engine.update_loan_pricing(loan_id, Some(7), Some("annual review")).unwrap();

    // same inputs, same numbers; only the ledger grows
    assert_eq!(first.new_margin, second.new_margin);
    assert_ne!(first.history_id, second.history_id);
    assert_eq!(engine.store().pricing_history_count(loan_id).unwrap(), 2);

    let history = engine.pricing().pricing_history(loan_id, 10).unwrap();
    assert_eq!(history.loan_number, "SLL-00001");
    assert_eq!(history.history.len(), 2);
    assert_eq!(history.history[0].id, Some(second.history_id));
    assert_eq!(history.history[0].created_by, Some(7));
    assert_eq!(history.history[0].adjustment_reason, "annual review");
    assert_eq!(history.history[1].adjustment_reason, "ESG performance tier: poor");
    assert_eq!(history.history[1].margin, 2.25);
    assert_eq!(history.history[1].total_rate, 6.25);

    let limited = engine.pricing().pricing_history(loan_id, 1).unwrap();
    assert_eq!(limited.history.len(), 1);
}

#[test]
fn pricing_emits_one_event_per_ledger_row() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);
    let update = engine.update_loan_pricing(loan_id, None, None).unwrap();

    let events = engine.store().events_for_loan(loan_id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "pricing_recalculated");
    match events[0].decode().unwrap() {
        EngineEvent::PricingRecalculated { history_id, pricing_tier, .. } => {
            assert_eq!(history_id, update.history_id);
            assert_eq!(pricing_tier, "poor");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn scenarios_cover_every_tier() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);

    let scenarios = engine.pricing().simulate_pricing_scenarios(loan_id).unwrap();
    assert_eq!(scenarios.current_esg_score, None);
    assert_eq!(scenarios.current_tier, None);

    let tiers: Vec<&str> = scenarios.scenarios.iter().map(|s| s.tier.as_str()).collect();
    assert_eq!(tiers, ["excellent", "good", "fair", "poor", "critical"]);

    let excellent = &scenarios.scenarios[0];
    assert_eq!(excellent.annual_impact, -5_000.0);
    assert_eq!(excellent.impact_type, ImpactType::Savings);
    assert_eq!(excellent.new_total_rate, 5.5);

    assert_eq!(scenarios.scenarios[2].impact_type, ImpactType::Neutral);

    let critical = &scenarios.scenarios[4];
    assert_eq!(critical.annual_impact, 5_000.0);
    assert_eq!(critical.impact_type, ImpactType::Cost);

    // simulation never writes
    assert_eq!(engine.store().pricing_history_count(loan_id).unwrap(), 0);
}

#[test]
fn summary_reports_improving_trend() {
    let (engine, loan_id) = engine_with_loan(1_000_000.0);
    engine.update_loan_pricing(loan_id, None, None).unwrap();

    let kpi_id = engine
        .store()
        .insert_kpi(
            loan_id,
            &NewKpi::new("Renewable energy share", KpiCategory::Environmental, Some(20.0), Some(60.0), Some(20.0)),
        )
        .unwrap();
    engine.update_loan_pricing(loan_id, None, None).unwrap();
    engine.store().update_kpi_current_value(kpi_id, Some(60.0)).unwrap();
    engine.update_loan_pricing(loan_id, None, None).unwrap();

    let summary = engine.pricing().pricing_summary(loan_id).unwrap();
    assert_eq!(summary.esg_performance_score, Some(100.0));
    assert_eq!(summary.pricing_tier.as_deref(), Some("excellent"));
    assert_eq!(summary.current_margin, Some(1.5));
    assert_eq!(summary.recent_changes.len(), 3);
    assert_eq!(summary.recent_changes[0].esg_performance_score, 100.0);
    assert_eq!(summary.recent_changes[1].esg_performance_score, 0.0);
    assert_eq!(summary.performance_trend, PerformanceTrend::Improving);
}

#[test]
fn unknown_loan_is_not_found() {
    let (engine, _) = engine_with_loan(1_000_000.0);

    let err = engine.update_loan_pricing(999, None, None).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, EngineError::LoanNotFound { loan_id: 999 }));
    assert!(engine.pricing().pricing_summary(999).is_err());
    assert!(engine.pricing().simulate_pricing_scenarios(999).is_err());
    assert_eq!(engine.store().event_count().unwrap(), 0);
}
