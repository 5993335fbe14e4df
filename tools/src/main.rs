//! slla-runner: headless runner for the sustainability-linked loan engine.
//!
//! Usage:
//!   slla-runner --seed 42 --loans 12 --period 2024-Q4 --db book.db
//!   slla-runner --data-dir ./data --ipc-mode

use anyhow::Result;
use slla_core::{
    clock::EngineClock,
    command::EngineCommand,
    config::EngineConfig,
    engine::AssessmentEngine,
    portfolio_seed::{seed_portfolio, PortfolioSpec},
    risk_scoring_engine::RiskCategory,
    store::LoanStore,
};
use std::env;
use std::io::{self, BufRead, Write};

/// Runner-level control messages. Anything else on the wire is an
/// engine command.
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlCommand {
    GetState,
    Quit,
}

enum IpcCommand {
    Control(ControlCommand),
    Engine(EngineCommand),
}

/// Engine commands are tried first so a malformed one reports its own
/// serde error rather than a generic mismatch.
fn parse_ipc_command(line: &str) -> serde_json::Result<IpcCommand> {
    match serde_json::from_str::<EngineCommand>(line) {
        Ok(command) => Ok(IpcCommand::Engine(command)),
        Err(engine_err) => serde_json::from_str::<ControlCommand>(line)
            .map(IpcCommand::Control)
            .map_err(|_| engine_err),
    }
}

#[derive(serde::Serialize)]
struct BookState {
    total_loans:    i64,
    events_logged:  i64,
    low:            usize,
    moderate:       usize,
    elevated:       usize,
    high:           usize,
    alerts:         usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let loans = parse_arg(&args, "--loans", 12usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let period = str_arg(&args, "--period").unwrap_or("2024-Q4");
    let data_dir = str_arg(&args, "--data-dir");

    if !ipc_mode {
        println!("Sustainability-linked loan engine: slla-runner");
        println!("  seed:      {seed}");
        println!("  loans:     {loans}");
        println!("  period:    {period}");
        println!("  db:        {db}");
        println!("  data_dir:  {}", data_dir.unwrap_or("(standard grid)"));
        println!();
    }

    let config = match data_dir {
        Some(dir) => EngineConfig::load(dir)?,
        None => EngineConfig::standard(),
    };

    let store = LoanStore::open(db)?;
    store.migrate()?;

    if loans > 0 {
        let portfolio = PortfolioSpec { seed, loans, anchor: chrono::Utc::now() };
        seed_portfolio(&store, &portfolio)?;
    }

    let engine = AssessmentEngine::new(store, config, EngineClock::system());

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        assess_book(&engine, period)?;
        print_summary(&engine)?;
    }

    Ok(())
}

fn run_ipc_loop(engine: &AssessmentEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd = match parse_ipc_command(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Control(ControlCommand::Quit) => break,
            IpcCommand::Control(ControlCommand::GetState) => {
                let state = build_book_state(engine)?;
                writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
            }
            IpcCommand::Engine(command) => match engine.execute(command) {
                Ok(response) => writeln!(stdout, "{}", serde_json::to_string(&response)?)?,
                Err(e) => {
                    log::warn!("ipc: command failed: {e}");
                    let err_json = serde_json::json!({
                        "error": e.to_string(),
                        "not_found": e.is_not_found(),
                    });
                    writeln!(stdout, "{}", err_json)?;
                }
            },
        }
        stdout.flush()?;
    }
    Ok(())
}

/// Price, risk-score and report every loan in the book once.
fn assess_book(engine: &AssessmentEngine, period: &str) -> Result<()> {
    let loans = engine.store().all_loans()?;

    println!("=== LOAN BOOK ===");
    for loan in &loans {
        let pricing = engine.update_loan_pricing(loan.id, None, Some("portfolio run"))?;
        let risk = engine.create_risk_assessment(loan.id)?;
        let report = engine.generate_sfdr_report(loan.id, period)?;
        println!(
            "  {} | ESG {:>6.2} {:<10} | margin {:.2}% ({:+.2}) | risk {:>6.2} {:<8} | {}",
            loan.loan_number,
            pricing.esg_performance_score,
            pricing.pricing_tier,
            pricing.new_margin,
            pricing.margin_adjustment,
            risk.overall_risk_score,
            risk.risk_category.as_str(),
            report.sfdr_classification.as_str(),
        );
    }
    println!();
    Ok(())
}

fn build_book_state(engine: &AssessmentEngine) -> Result<BookState> {
    let dashboard = engine.risk().risk_dashboard()?;
    Ok(BookState {
        total_loans:   engine.store().loan_count()?,
        events_logged: engine.store().event_count()?,
        low:           dashboard.risk_distribution.low,
        moderate:      dashboard.risk_distribution.moderate,
        elevated:      dashboard.risk_distribution.elevated,
        high:          dashboard.risk_distribution.high,
        alerts:        dashboard.alerts.len(),
    })
}

fn print_summary(engine: &AssessmentEngine) -> Result<()> {
    let dashboard = engine.risk().risk_dashboard()?;
    let events = engine.store().event_count()?;

    println!("=== RUN SUMMARY ===");
    println!("  loans:          {}", dashboard.total_loans);
    println!("  events logged:  {events}");
    for category in RiskCategory::ALL {
        let count = match category {
            RiskCategory::Low => dashboard.risk_distribution.low,
            RiskCategory::Moderate => dashboard.risk_distribution.moderate,
            RiskCategory::Elevated => dashboard.risk_distribution.elevated,
            RiskCategory::High => dashboard.risk_distribution.high,
        };
        println!("  {:<14} {count}", format!("{}:", category.as_str()));
    }

    println!();
    println!("=== ALERTS ===");
    if dashboard.alerts.is_empty() {
        println!("  (No high-risk loans)");
    } else {
        for alert in &dashboard.alerts {
            println!("  {} | {} | {}", alert.loan_number, alert.message, alert.action_required);
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_and_engine_commands_are_told_apart() {
        assert!(matches!(
            parse_ipc_command(r#"{"type":"quit"}"#),
            Ok(IpcCommand::Control(ControlCommand::Quit))
        ));
        assert!(matches!(
            parse_ipc_command(r#"{"type":"get_state"}"#),
            Ok(IpcCommand::Control(ControlCommand::GetState))
        ));
        assert!(matches!(
            parse_ipc_command(r#"{"type":"assess_risk","loan_id":4}"#),
            Ok(IpcCommand::Engine(EngineCommand::AssessRisk { loan_id: 4 }))
        ));
    }

    #[test]
    fn malformed_engine_command_reports_the_missing_field() {
        let err = match parse_ipc_command(r#"{"type":"price"}"#) {
            Err(e) => e.to_string(),
            Ok(_) => panic!("price without loan_id parsed"),
        };
        assert!(err.contains("missing field `loan_id`"), "{err}");
    }
}
