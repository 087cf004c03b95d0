pub mod dispatch;
pub mod rules;
pub mod wildcard;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eca_core::{EngineConfig, RuleStore, Value};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the engine configuration from `path`, or from the data directory.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_default()?,
    };
    Ok(config)
}

/// Open the rule store, preferring an explicit directory over the configured one.
pub fn open_store(
    config: &EngineConfig,
    dir: Option<PathBuf>,
) -> Result<RuleStore, Box<dyn std::error::Error>> {
    let store = match dir {
        Some(dir) => RuleStore::with_path(dir)?,
        None => RuleStore::open(config)?,
    };
    Ok(store)
}

/// Parse a command-line value: JSON when it parses as JSON, plain text otherwise.
pub fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(raw),
    }
}

/// Parse `KEY=VALUE` pairs into a context map.
pub fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, Value>, Box<dyn std::error::Error>> {
    let mut context = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{pair}'"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("empty key in '{pair}'").into());
        }
        context.insert(key.to_string(), parse_value(value));
    }
    Ok(context)
}
