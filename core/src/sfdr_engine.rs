//! SFDR compliance classifier: article classification, sustainable
//! investment share, PAI indicators, EU Taxonomy alignment, DNSH and
//! minimum social safeguards, assembled into a persisted report.
//!
//! Only climate change mitigation is evaluated for the taxonomy; the
//! other five objectives are reported unaligned. Social safeguards are
//! reported compliant and only collect evidence.

use crate::{
    clock::EngineClock,
    error::{EngineError, EngineResult},
    ledger::{
        AreaCompliance, DnshAssessment, EnvironmentalHarm, ExecutiveSummary,
        ObjectiveAlignment, SafeguardEvidence, SfdrArticle, SfdrReportData, SfdrReportRecord,
        SocialSafeguards, SustainableInvestmentAnalysis, TaxonomyAlignment,
    },
    model::{EsgKpi, Loan, Verification},
    pai::PaiIndicators,
    store::LoanStore,
    types::{round2, LoanId, RecordId},
};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Meaningful targets needed for each article.
const ARTICLE_9_TARGETS: usize = 5;
const ARTICLE_8_TARGETS: usize = 2;

/// A KPI counts towards the sustainable share at 80% of target.
const SUSTAINABLE_TARGET_SHARE: f64 = 0.8;

/// Climate KPIs must average this share of target for alignment.
const TAXONOMY_ALIGNMENT_THRESHOLD: f64 = 75.0;

/// Current above target by more than this factor is significant harm.
const DNSH_HARM_FACTOR: f64 = 1.2;

/// Compliance score of a verification without a confidence score.
const DEFAULT_VERIFICATION_CONFIDENCE: f64 = 70.0;

/// Quarters synthesised from the ESG score when nothing is on file.
const BASELINE_QUARTERS: i64 = 4;

pub const CALCULATION_METHODOLOGY: &str =
    "Based on ESG KPI achievement against targets and DNSH criteria";

// ── Pure assessments ────────────────────────────────────────────────

/// A target counts as meaningful once both its target and baseline
/// are on file.
pub fn classify_article(loan: &Loan, kpis: &[EsgKpi]) -> SfdrArticle {
    if !loan.sustainability_linked {
        return SfdrArticle::Article6;
    }
    let meaningful = kpis
        .iter()
        .filter(|k| k.target_value.is_some() && k.baseline_value.is_some())
        .count();
    if meaningful >= ARTICLE_9_TARGETS {
        SfdrArticle::Article9
    } else if meaningful >= ARTICLE_8_TARGETS {
        SfdrArticle::Article8
    } else {
        SfdrArticle::Article6
    }
}

/// Share of the loan meeting sustainable-investment criteria, bucketed
/// to 0, 50, 75 or 100.
pub fn sustainable_investment_percentage(loan: &Loan, kpis: &[EsgKpi]) -> f64 {
    if !loan.sustainability_linked {
        return 0.0;
    }
    let measured: Vec<(f64, f64)> = kpis
        .iter()
        .filter_map(|k| Some((k.current_value?, k.target_value?)))
        .collect();
    if measured.is_empty() {
        return 0.0;
    }
    let meeting = measured
        .iter()
        .filter(|(current, target)| *current >= target * SUSTAINABLE_TARGET_SHARE)
        .count();
    let rate = meeting as f64 / measured.len() as f64 * 100.0;

    if rate >= 90.0 {
        100.0
    } else if rate >= 75.0 {
        75.0
    } else if rate >= 50.0 {
        50.0
    } else {
        0.0
    }
}

fn is_climate_kpi(name_lower: &str) -> bool {
    name_lower.contains("carbon") || name_lower.contains("emission")
}

pub fn taxonomy_alignment(kpis: &[EsgKpi]) -> TaxonomyAlignment {
    let mut alignment = TaxonomyAlignment::unaligned();

    let climate: Vec<&EsgKpi> = kpis.iter().filter(|k| is_climate_kpi(&k.name_lower())).collect();
    if climate.is_empty() {
        return alignment;
    }

    // Divided by every climate KPI, including those without a usable target.
    let total: f64 = climate
        .iter()
        .filter_map(|k| {
            let target = k.target_value.filter(|t| *t > 0.0)?;
            Some(k.current_value? / target * 100.0)
        })
        .sum();
    let average = total / climate.len() as f64;
    let aligned = average >= TAXONOMY_ALIGNMENT_THRESHOLD;

    alignment.climate_change_mitigation = ObjectiveAlignment {
        aligned,
        substantial_contribution: aligned,
        dnsh_compliance:          true,
        minimum_safeguards:       true,
        alignment_percentage:     average.min(100.0),
    };
    alignment
}

pub fn dnsh_assessment(kpis: &[EsgKpi]) -> DnshAssessment {
    let mut harm = EnvironmentalHarm {
        climate_mitigation: AreaCompliance::clean(),
        climate_adaptation: AreaCompliance::clean(),
        water_marine:       AreaCompliance::clean(),
        circular_economy:   AreaCompliance::clean(),
        pollution:          AreaCompliance::clean(),
        biodiversity:       AreaCompliance::clean(),
    };

    for kpi in kpis {
        let (Some(current), Some(target)) = (kpi.current_value, kpi.target_value) else {
            continue;
        };
        if current <= target * DNSH_HARM_FACTOR {
            continue;
        }
        let name = kpi.name_lower();
        if name.contains("pollution") || name.contains("contamination") {
            harm.pollution
                .flag(format!("{} exceeds acceptable threshold", kpi.kpi_name));
        }
        if name.contains("water") {
            harm.water_marine
                .flag(format!("{} indicates potential water stress", kpi.kpi_name));
        }
    }

    DnshAssessment {
        overall_compliant:  harm.areas().iter().all(|a| a.compliant),
        environmental_harm: harm,
    }
}

pub fn social_safeguards(kpis: &[EsgKpi]) -> SocialSafeguards {
    let compliant = || SafeguardEvidence { compliant: true, evidence: Vec::new() };
    let mut safeguards = SocialSafeguards {
        oecd_guidelines:           compliant(),
        un_guiding_principles:     compliant(),
        ilo_conventions:           compliant(),
        international_bill_rights: compliant(),
    };
    safeguards.ilo_conventions.evidence = kpis
        .iter()
        .filter(|k| k.is_social())
        .map(|k| format!("Social KPI tracked: {}", k.kpi_name))
        .collect();
    safeguards
}

pub fn disclosure_statement(article: SfdrArticle, sustainable_pct: f64, dnsh_compliant: bool) -> String {
    match article {
        SfdrArticle::Article9 => format!(
            "This financial product has sustainable investment as its objective. \
             {sustainable_pct:.1}% of the loan meets the criteria for sustainable investment. \
             The product {} with Do No Significant Harm principles.",
            if dnsh_compliant { "complies" } else { "does not fully comply" }
        ),
        SfdrArticle::Article8 => format!(
            "This financial product promotes environmental and social characteristics. \
             {sustainable_pct:.1}% qualifies as sustainable investment. \
             Environmental and social characteristics are promoted through specific ESG-linked covenants."
        ),
        SfdrArticle::Article6 => "This financial product does not promote environmental or social \
             characteristics and does not have sustainable investment as its objective."
            .to_string(),
    }
}

// ── Payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegulatoryCompliance {
    pub sfdr_level_2_rts:            bool,
    pub eu_taxonomy_regulation:      bool,
    pub disclosure_requirements_met: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SfdrReportResult {
    pub report_id:                         RecordId,
    pub loan_id:                           LoanId,
    pub loan_number:                       String,
    pub generated_date:                    DateTime<Utc>,
    pub period:                            String,
    pub sfdr_classification:               SfdrArticle,
    pub sustainable_investment_percentage: f64,
    pub taxonomy_aligned:                  bool,
    pub dnsh_compliant:                    bool,
    pub report_data:                       SfdrReportData,
    pub regulatory_compliance:             RegulatoryCompliance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceSource {
    SfdrReport,
    Verification,
    Baseline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompliancePoint {
    pub date:               DateTime<Utc>,
    pub period:             String,
    pub compliance_score:   f64,
    pub pai_score:          f64,
    pub taxonomy_alignment: f64,
    pub source:             ComplianceSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceHistory {
    pub loan_id:       LoanId,
    pub loan_number:   String,
    pub total_records: usize,
    pub history:       Vec<CompliancePoint>,
}

/// Calendar quarter label, e.g. "2024-Q3".
pub fn quarter_label(at: DateTime<Utc>) -> String {
    format!("{}-Q{}", at.year(), (at.month() - 1) / 3 + 1)
}

fn report_point(report: &SfdrReportRecord) -> CompliancePoint {
    let pai = &report.principal_adverse_impacts;
    let pai_score = if pai.is_empty() {
        0.0
    } else {
        pai.populated_count() as f64 / pai.len() as f64 * 100.0
    };
    CompliancePoint {
        date:               report.generated_date,
        period:             report.report_period.clone(),
        compliance_score:   report.sustainable_investment_percentage,
        pai_score:          round2(pai_score),
        taxonomy_alignment: round2(report.taxonomy_alignment.climate_change_mitigation.alignment_percentage),
        source:             ComplianceSource::SfdrReport,
    }
}

/// PAI reads slightly above the verification confidence, taxonomy
/// slightly below.
fn verification_point(verification: &Verification) -> CompliancePoint {
    let score = verification.confidence_score.unwrap_or(DEFAULT_VERIFICATION_CONFIDENCE);
    CompliancePoint {
        date:               verification.verification_date,
        period:             quarter_label(verification.verification_date),
        compliance_score:   score,
        pai_score:          round2(score * 1.05),
        taxonomy_alignment: round2(score * 0.9),
        source:             ComplianceSource::Verification,
    }
}

/// One point per quarter going back from `now`, oldest first. Each
/// quarter back adds 2 to the ESG score.
fn baseline_points(esg_score: f64, now: DateTime<Utc>) -> Vec<CompliancePoint> {
    (0..BASELINE_QUARTERS)
        .rev()
        .map(|i| {
            let date = now - Duration::days(90 * i);
            let lift = 2.0 * i as f64;
            CompliancePoint {
                date,
                period:             quarter_label(date),
                compliance_score:   round2(esg_score + lift),
                pai_score:          round2(esg_score + 5.0 + lift),
                taxonomy_alignment: round2(esg_score - 5.0 + lift),
                source:             ComplianceSource::Baseline,
            }
        })
        .collect()
}

// ── Engine ──────────────────────────────────────────────────────────

pub struct SfdrEngine<'a> {
    store: &'a LoanStore,
    clock: &'a EngineClock,
}

impl<'a> SfdrEngine<'a> {
    pub fn new(store: &'a LoanStore, clock: &'a EngineClock) -> Self {
        Self { store, clock }
    }

    fn load(&self, loan_id: LoanId) -> EngineResult<(Loan, Vec<EsgKpi>)> {
        let loan = self
            .store
            .loan(loan_id)?
            .ok_or(EngineError::LoanNotFound { loan_id })?;
        let kpis = self.store.kpis_for_loan(loan_id)?;
        Ok((loan, kpis))
    }

    pub fn classify_loan_sfdr_article(&self, loan_id: LoanId) -> EngineResult<SfdrArticle> {
        let (loan, kpis) = self.load(loan_id)?;
        Ok(classify_article(&loan, &kpis))
    }

    pub fn calculate_pai_indicators(&self, loan_id: LoanId) -> EngineResult<PaiIndicators> {
        let (_, kpis) = self.load(loan_id)?;
        Ok(PaiIndicators::from_kpis(&kpis))
    }

    pub fn sustainable_investment_percentage(&self, loan_id: LoanId) -> EngineResult<f64> {
        let (loan, kpis) = self.load(loan_id)?;
        Ok(sustainable_investment_percentage(&loan, &kpis))
    }

    pub fn assess_eu_taxonomy_alignment(&self, loan_id: LoanId) -> EngineResult<TaxonomyAlignment> {
        let (_, kpis) = self.load(loan_id)?;
        Ok(taxonomy_alignment(&kpis))
    }

    pub fn assess_dnsh_compliance(&self, loan_id: LoanId) -> EngineResult<DnshAssessment> {
        let (_, kpis) = self.load(loan_id)?;
        Ok(dnsh_assessment(&kpis))
    }

    pub fn assess_social_safeguards(&self, loan_id: LoanId) -> EngineResult<SocialSafeguards> {
        let (_, kpis) = self.load(loan_id)?;
        Ok(social_safeguards(&kpis))
    }

    /// Build and persist a full disclosure report. The period label is
    /// stored as given.
    pub fn generate_sfdr_report(&self, loan_id: LoanId, period: &str) -> EngineResult<SfdrReportResult> {
        let (loan, kpis) = self.load(loan_id)?;
        let now = self.clock.now();

        let article = classify_article(&loan, &kpis);
        let pai = PaiIndicators::from_kpis(&kpis);
        let sustainable_pct = sustainable_investment_percentage(&loan, &kpis);
        let taxonomy = taxonomy_alignment(&kpis);
        let dnsh = dnsh_assessment(&kpis);
        let safeguards = social_safeguards(&kpis);

        let borrower = match loan.borrower_id {
            Some(id) => self.store.borrower(id)?.map(|b| b.name),
            None => None,
        }
        .unwrap_or_else(|| "Unknown".to_string());

        let report_data = SfdrReportData {
            executive_summary: ExecutiveSummary {
                loan_number:                loan.loan_number.clone(),
                borrower,
                report_period:              period.to_string(),
                sfdr_classification:        article,
                classification_description: article.description().to_string(),
            },
            sustainable_investment_analysis: SustainableInvestmentAnalysis {
                percentage_sustainable:  sustainable_pct,
                calculation_methodology: CALCULATION_METHODOLOGY.to_string(),
                qualifying_activities:   Vec::new(),
            },
            principal_adverse_impacts: pai.clone(),
            taxonomy_alignment:        taxonomy.clone(),
            dnsh_assessment:           dnsh.clone(),
            social_safeguards:         safeguards.clone(),
            disclosure_statement:      disclosure_statement(article, sustainable_pct, dnsh.overall_compliant),
        };

        let record = SfdrReportRecord {
            id:                                None,
            loan_id,
            report_period:                     period.to_string(),
            sfdr_classification:               article,
            principal_adverse_impacts:         pai,
            sustainable_investment_percentage: sustainable_pct,
            taxonomy_alignment:                taxonomy,
            do_no_significant_harm_assessment: dnsh,
            social_safeguards:                 safeguards,
            generated_date:                    now,
            status:                            "completed".to_string(),
            report_data:                       report_data.clone(),
        };
        let report_id = self.store.insert_sfdr_report(&record)?;

        log::info!(
            "loan={loan_id} sfdr: report={report_id} period={period} classification={} sustainable={sustainable_pct:.1}% pai_populated={}",
            article.as_str(),
            record.principal_adverse_impacts.populated_count()
        );

        Ok(SfdrReportResult {
            report_id,
            loan_id,
            loan_number:                       loan.loan_number,
            generated_date:                    now,
            period:                            period.to_string(),
            sfdr_classification:               article,
            sustainable_investment_percentage: sustainable_pct,
            taxonomy_aligned:                  record.taxonomy_alignment.any_aligned(),
            dnsh_compliant:                    record.do_no_significant_harm_assessment.overall_compliant,
            report_data,
            regulatory_compliance: RegulatoryCompliance {
                sfdr_level_2_rts:            true,
                eu_taxonomy_regulation:      true,
                disclosure_requirements_met: true,
            },
        })
    }

    pub fn sfdr_reports(&self, loan_id: LoanId) -> EngineResult<Vec<SfdrReportRecord>> {
        self.load(loan_id)?;
        self.store.sfdr_reports(loan_id)
    }

    /// Compliance time series from stored reports and verifications,
    /// oldest first. A loan with neither falls back to a four-quarter
    /// baseline derived from its ESG score, or an empty series when it
    /// has never been priced.
    pub fn compliance_history(&self, loan_id: LoanId) -> EngineResult<ComplianceHistory> {
        let (loan, _) = self.load(loan_id)?;

        let mut history: Vec<CompliancePoint> = self
            .store
            .sfdr_reports(loan_id)?
            .iter()
            .map(report_point)
            .chain(self.store.verifications_for_loan(loan_id)?.iter().map(verification_point))
            .collect();
        history.sort_by_key(|p| p.date);

        if history.is_empty() {
            if let Some(score) = loan.esg_performance_score {
                history = baseline_points(score, self.clock.now());
            }
        }

        log::debug!("loan={loan_id} sfdr: compliance history with {} points", history.len());
        Ok(ComplianceHistory {
            loan_id,
            loan_number:   loan.loan_number,
            total_records: history.len(),
            history,
        })
    }

    pub fn sfdr_report(&self, report_id: RecordId) -> EngineResult<SfdrReportRecord> {
        self.store
            .sfdr_report(report_id)?
            .ok_or(EngineError::ReportNotFound { report_id })
    }
}
