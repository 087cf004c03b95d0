use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use eca_core::{AccountDirectory, Engine, Event, ExecutionStatus, Outcome};
use tracing::debug;

use super::{load_config, open_store, parse_pairs, parse_value, CliResult};

#[derive(Args)]
pub struct DispatchArgs {
    /// Event kind (e.g. "entity-access")
    pub kind: String,

    /// Event context as KEY=VALUE; values are read as JSON when they parse
    pub pairs: Vec<String>,

    /// Rule directory (overrides the configured one)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Initial result slot value
    #[arg(long = "default")]
    pub default_result: Option<String>,

    /// Account directory file (TOML or JSON)
    #[arg(long)]
    pub accounts: Option<PathBuf>,

    /// Print the execution log
    #[arg(long)]
    pub log: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: DispatchArgs, config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let store = open_store(&config, args.dir.clone())?;
    let documents = store.load_all()?;

    let mut engine = Engine::new(config);
    if let Some(path) = &args.accounts {
        engine = engine.with_accounts(Arc::new(load_accounts(path)?));
    }
    let count = engine.import(documents)?;
    debug!(count, dir = %store.path().display(), "rules loaded");

    let mut event = Event::from_context(args.kind.as_str(), parse_pairs(&args.pairs)?);
    if let Some(raw) = &args.default_result {
        event = event.with_result(parse_value(raw));
    }

    let outcome = engine.dispatch(event)?;
    if args.json {
        print_json(&outcome)?;
    } else {
        print_text(&outcome, args.log, engine.config().list_separator.as_str());
    }

    if !outcome.is_clean() {
        return Err(format!("{} rule error(s) during dispatch", outcome.errors.len()).into());
    }
    Ok(())
}

fn load_accounts(path: &Path) -> Result<AccountDirectory, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let directory = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => toml::from_str(&content)?,
    };
    Ok(directory)
}

fn print_text(outcome: &Outcome, show_log: bool, separator: &str) {
    println!("{}", outcome.result.to_text(separator));

    if show_log {
        for record in &outcome.log.records {
            let status = match &record.status {
                ExecutionStatus::Success => "ok".to_string(),
                ExecutionStatus::Stopped => "stopped".to_string(),
                ExecutionStatus::Failed { reason, handled: true } => format!("failed (handled): {reason}"),
                ExecutionStatus::Failed { reason, handled: false } => format!("failed: {reason}"),
                ExecutionStatus::Skipped { reason } => format!("skipped: {reason}"),
            };
            println!("  {}/{} [{}] {status}", record.rule_id, record.node_id, record.plugin);
        }
    }

    for error in &outcome.errors {
        eprintln!("rule error: {error}");
    }
}

fn print_json(outcome: &Outcome) -> Result<(), serde_json::Error> {
    let errors: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
    let body = serde_json::json!({
        "result": outcome.result.to_json(),
        "errors": errors,
        "log": outcome.log,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
