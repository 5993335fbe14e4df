use chrono::{DateTime, Duration, Utc};
use slla_core::{
    engine::AssessmentEngine,
    error::EngineError,
    ledger::SfdrArticle,
    model::{KpiCategory, NewKpi, NewLoan},
    pai::DataQuality,
    sfdr_engine::ComplianceSource,
    types::LoanId,
};

mod common;

fn at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn engine() -> AssessmentEngine {
    common::init_logging();
    AssessmentEngine::build_test(at()).unwrap()
}

fn kpi(name: &str, category: KpiCategory, baseline: f64, target: f64, current: f64) -> NewKpi {
    NewKpi::new(name, category, Some(baseline), Some(target), Some(current))
}

/// Five fully specified KPIs, each at target.
fn article_9_loan(engine: &AssessmentEngine) -> LoanId {
    let store = engine.store();
    let borrower = store.insert_borrower("Solaris Energy AG", Some("Energy"), Some("DE")).unwrap();
    let mut loan = NewLoan::new("SLL-00009", 20_000_000.0);
    loan.borrower_id = Some(borrower);
    let loan_id = store.insert_loan(&loan).unwrap();
    for k in [
        kpi("Scope 1 and 2 carbon emissions", KpiCategory::Environmental, 10_000.0, 7_000.0, 7_000.0),
        kpi("Renewable energy share", KpiCategory::Environmental, 20.0, 60.0, 60.0),
        kpi("Water withdrawal intensity", KpiCategory::Environmental, 500.0, 400.0, 400.0),
        kpi("Hazardous waste generated", KpiCategory::Environmental, 800.0, 500.0, 500.0),
        kpi("Board gender diversity", KpiCategory::Governance, 20.0, 40.0, 40.0),
    ] {
        store.insert_kpi(loan_id, &k).unwrap();
    }
    loan_id
}

#[test]
fn loan_not_sustainability_linked_is_article_6() {
    let engine = engine();
    let mut loan = NewLoan::new("SLL-00001", 1_000_000.0);
    loan.sustainability_linked = false;
    let loan_id = engine.store().insert_loan(&loan).unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Carbon emissions", KpiCategory::Environmental, 100.0, 50.0, 40.0))
        .unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Board gender diversity", KpiCategory::Governance, 20.0, 40.0, 40.0))
        .unwrap();

    let sfdr = engine.sfdr();
    assert_eq!(sfdr.classify_loan_sfdr_article(loan_id).unwrap(), SfdrArticle::Article6);
    assert_eq!(sfdr.sustainable_investment_percentage(loan_id).unwrap(), 0.0);

    let report = engine.generate_sfdr_report(loan_id, "2024-Q4").unwrap();
    assert_eq!(report.sfdr_classification, SfdrArticle::Article6);
    assert_eq!(
        report.report_data.disclosure_statement,
        "This financial product does not promote environmental or social characteristics \
         and does not have sustainable investment as its objective."
    );
}

#[test]
fn two_meaningful_targets_make_article_8() {
    let engine = engine();
    let loan_id = engine.store().insert_loan(&NewLoan::new("SLL-00002", 1_000_000.0)).unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Carbon emissions", KpiCategory::Environmental, 100.0, 50.0, 90.0))
        .unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Living wage coverage", KpiCategory::Social, 70.0, 100.0, 100.0))
        .unwrap();
    // no baseline: not a meaningful target
    engine
        .store()
        .insert_kpi(
            loan_id,
            &NewKpi::new("Supplier audits", KpiCategory::Governance, None, Some(90.0), Some(30.0)),
        )
        .unwrap();

    assert_eq!(
        engine.sfdr().classify_loan_sfdr_article(loan_id).unwrap(),
        SfdrArticle::Article8
    );
    // 2 of 3 measured KPIs at 80% of target
    assert_eq!(engine.sfdr().sustainable_investment_percentage(loan_id).unwrap(), 50.0);
}

#[test]
fn pai_indicators_follow_kpi_names() {
    let engine = engine();
    let loan_id = article_9_loan(&engine);

    let pai = engine.sfdr().calculate_pai_indicators(loan_id).unwrap();
    assert_eq!(pai.len(), 14);
    assert_eq!(pai.populated_count(), 5);

    let ghg = pai.get(1).unwrap();
    assert_eq!(ghg.value, Some(7_000.0));
    assert_eq!(ghg.data_quality, DataQuality::Reported);

    // renewable share 60% => 40% non-renewable
    let energy = pai.get(5).unwrap();
    assert_eq!(energy.value, Some(40.0));
    assert_eq!(energy.data_quality, DataQuality::Calculated);

    assert_eq!(pai.get(8).unwrap().value, Some(400.0));
    assert_eq!(pai.get(9).unwrap().value, Some(500.0));
    assert_eq!(pai.get(13).unwrap().value, Some(40.0));

    let weapons = pai.get(14).unwrap();
    assert_eq!(weapons.value, None);
    assert_eq!(weapons.data_quality, DataQuality::Estimated);
}

#[test]
fn article_9_report_is_persisted() {
    let engine = engine();
    let loan_id = article_9_loan(&engine);

    let report = engine.generate_sfdr_report(loan_id, "2024-Q4").unwrap();
    assert_eq!(report.sfdr_classification, SfdrArticle::Article9);
    assert_eq!(report.sustainable_investment_percentage, 100.0);
    assert!(report.taxonomy_aligned);
    assert!(report.dnsh_compliant);
    assert_eq!(report.period, "2024-Q4");
    assert_eq!(report.generated_date, at());
    assert_eq!(report.report_data.executive_summary.borrower, "Solaris Energy AG");
    assert!(report
        .report_data
        .disclosure_statement
        .contains("100.0% of the loan meets the criteria for sustainable investment"));
    assert!(report.report_data.disclosure_statement.contains("complies with Do No Significant Harm"));
    assert!(report.regulatory_compliance.disclosure_requirements_met);

    let stored = engine.sfdr().sfdr_report(report.report_id).unwrap();
    assert_eq!(stored.id, Some(report.report_id));
    assert_eq!(stored.loan_id, loan_id);
    assert_eq!(stored.report_period, "2024-Q4");
    assert_eq!(stored.sfdr_classification, SfdrArticle::Article9);
    assert_eq!(stored.status, "completed");
    assert_eq!(stored.principal_adverse_impacts.populated_count(), 5);
    assert!(stored.taxonomy_alignment.climate_change_mitigation.aligned);
    assert!(!stored.taxonomy_alignment.pollution_prevention.aligned);

    let events = engine.store().events_for_loan(loan_id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "sfdr_report_generated");
}

#[test]
fn reports_are_listed_newest_first() {
    let engine = engine();
    let loan_id = article_9_loan(&engine);

    let q3 = engine.generate_sfdr_report(loan_id, "2024-Q3").unwrap();
    let q4 = engine.generate_sfdr_report(loan_id, "2024-Q4").unwrap();

    let reports = engine.sfdr().sfdr_reports(loan_id).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].id, Some(q4.report_id));
    assert_eq!(reports[1].id, Some(q3.report_id));
}

#[test]
fn taxonomy_average_counts_every_climate_kpi() {
    let engine = engine();
    let loan_id = engine.store().insert_loan(&NewLoan::new("SLL-00003", 1_000_000.0)).unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Carbon emissions", KpiCategory::Environmental, 100.0, 50.0, 50.0))
        .unwrap();
    engine
        .store()
        .insert_kpi(
            loan_id,
            &NewKpi::new("Methane emission rate", KpiCategory::Environmental, Some(10.0), None, Some(8.0)),
        )
        .unwrap();

    let taxonomy = engine.sfdr().assess_eu_taxonomy_alignment(loan_id).unwrap();
    let mitigation = &taxonomy.climate_change_mitigation;
    assert_eq!(mitigation.alignment_percentage, 50.0);
    assert!(!mitigation.aligned);
    assert!(!taxonomy.any_aligned());
}

#[test]
fn dnsh_flags_water_and_pollution_harm() {
    let engine = engine();
    let loan_id = engine.store().insert_loan(&NewLoan::new("SLL-00004", 1_000_000.0)).unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Water withdrawal intensity", KpiCategory::Environmental, 500.0, 400.0, 600.0))
        .unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Soil contamination incidents", KpiCategory::Environmental, 12.0, 4.0, 10.0))
        .unwrap();
    // within 20% of target: no harm
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Air pollution index", KpiCategory::Environmental, 50.0, 40.0, 44.0))
        .unwrap();

    let dnsh = engine.sfdr().assess_dnsh_compliance(loan_id).unwrap();
    assert!(!dnsh.overall_compliant);
    assert_eq!(
        dnsh.environmental_harm.water_marine.issues,
        ["Water withdrawal intensity indicates potential water stress"]
    );
    assert_eq!(
        dnsh.environmental_harm.pollution.issues,
        ["Soil contamination incidents exceeds acceptable threshold"]
    );
    assert!(dnsh.environmental_harm.biodiversity.compliant);

    let report = engine.generate_sfdr_report(loan_id, "2024-Q4").unwrap();
    assert!(!report.dnsh_compliant);
}

#[test]
fn social_safeguards_collect_social_kpis() {
    let engine = engine();
    let loan_id = engine.store().insert_loan(&NewLoan::new("SLL-00005", 1_000_000.0)).unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Living wage coverage", KpiCategory::Social, 70.0, 100.0, 85.0))
        .unwrap();
    engine
        .store()
        .insert_kpi(loan_id, &kpi("Carbon emissions", KpiCategory::Environmental, 100.0, 50.0, 70.0))
        .unwrap();

    let safeguards = engine.sfdr().assess_social_safeguards(loan_id).unwrap();
    assert!(safeguards.ilo_conventions.compliant);
    assert_eq!(
        safeguards.ilo_conventions.evidence,
        ["Social KPI tracked: Living wage coverage"]
    );
    assert!(safeguards.oecd_guidelines.evidence.is_empty());
}

#[test]
fn missing_report_and_loan_are_not_found() {
    let engine = engine();

    let err = engine.sfdr().sfdr_report(77).unwrap_err();
    assert!(matches!(err, EngineError::ReportNotFound { report_id: 77 }));
    assert!(err.is_not_found());

    assert!(engine.generate_sfdr_report(5, "2024-Q4").unwrap_err().is_not_found());
    assert!(engine.sfdr().sfdr_reports(5).unwrap_err().is_not_found());
}

#[test]
fn compliance_history_merges_reports_and_verifications() {
    let engine = engine();
    let loan_id = article_9_loan(&engine);
    let store = engine.store();
    store
        .insert_verification(loan_id, "kpi_measurement", at() - Duration::days(40), "completed", Some(90.0))
        .unwrap();
    store
        .insert_verification(loan_id, "site_visit", at() - Duration::days(100), "completed", None)
        .unwrap();
    engine.generate_sfdr_report(loan_id, "2024-Q4").unwrap();

    let compliance = engine.sfdr().compliance_history(loan_id).unwrap();
    assert_eq!(compliance.loan_number, "SLL-00009");
    assert_eq!(compliance.total_records, 3);

    let sources: Vec<ComplianceSource> = compliance.history.iter().map(|p| p.source).collect();
    assert_eq!(
        sources,
        [ComplianceSource::Verification, ComplianceSource::Verification, ComplianceSource::SfdrReport]
    );

    // no confidence on file: 70
    let oldest = &compliance.history[0];
    assert_eq!(oldest.period, "2024-Q4");
    assert_eq!(oldest.compliance_score, 70.0);
    assert_eq!(oldest.pai_score, 73.5);
    assert_eq!(oldest.taxonomy_alignment, 63.0);

    let measured = &compliance.history[1];
    assert_eq!(measured.compliance_score, 90.0);
    assert_eq!(measured.pai_score, 94.5);
    assert_eq!(measured.taxonomy_alignment, 81.0);

    // 5 of 14 PAI indicators populated
    let report = &compliance.history[2];
    assert_eq!(report.date, at());
    assert_eq!(report.compliance_score, 100.0);
    assert_eq!(report.pai_score, 35.71);
    assert_eq!(report.taxonomy_alignment, 100.0);
}

#[test]
fn compliance_history_falls_back_to_esg_baseline() {
    let engine = engine();
    let loan_id = engine.store().insert_loan(&NewLoan::new("SLL-00006", 1_000_000.0)).unwrap();

    assert!(engine.sfdr().compliance_history(loan_id).unwrap().history.is_empty());

    // no KPIs: neutral score of 50
    engine.update_loan_pricing(loan_id, None, None).unwrap();
    let compliance = engine.sfdr().compliance_history(loan_id).unwrap();
    assert_eq!(compliance.total_records, 4);
    assert!(compliance.history.iter().all(|p| p.source == ComplianceSource::Baseline));

    let periods: Vec<&str> = compliance.history.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, ["2024-Q2", "2024-Q3", "2024-Q4", "2025-Q1"]);

    let oldest = &compliance.history[0];
    assert_eq!(oldest.date, at() - Duration::days(270));
    assert_eq!(oldest.compliance_score, 56.0);
    assert_eq!(oldest.pai_score, 61.0);
    assert_eq!(oldest.taxonomy_alignment, 51.0);

    let latest = &compliance.history[3];
    assert_eq!(latest.date, at());
    assert_eq!(latest.compliance_score, 50.0);

    assert!(engine.sfdr().compliance_history(404).unwrap_err().is_not_found());
}
