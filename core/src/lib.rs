//! Assessment and adjustment engine for sustainability-linked loans.
//!
//! KPI achievement feeds the ESG score. The ESG score drives margin
//! pricing, risk scoring combines covenants, ESG and loan financials,
//! and the SFDR classifier produces regulatory disclosures. Every
//! computation runs through `engine::AssessmentEngine`.

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod esg_scoring;
pub mod event;
pub mod kpi;
pub mod ledger;
pub mod model;
pub mod pai;
pub mod portfolio_seed;
pub mod pricing_engine;
pub mod risk_scoring_engine;
pub mod rng;
pub mod sfdr_engine;
pub mod store;
pub mod types;
