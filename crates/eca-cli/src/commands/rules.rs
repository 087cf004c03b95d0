use std::path::{Path, PathBuf};

use clap::Subcommand;
use eca_core::store::read_document;
use eca_core::{Engine, Rule};

use super::{load_config, open_store, CliResult};

#[derive(Subcommand)]
pub enum RulesAction {
    /// List stored rules
    List {
        /// Rule directory (overrides the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check rule documents without storing them
    Validate {
        /// TOML or JSON rule documents
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate a rule document and add it to the store
    Import {
        /// TOML or JSON rule document
        file: PathBuf,
        /// Rule directory (overrides the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print a stored rule document
    Export {
        /// Rule id
        id: String,
        /// Rule directory (overrides the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored rule
    Remove {
        /// Rule id
        id: String,
        /// Rule directory (overrides the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub fn run(action: RulesAction, config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    match action {
        RulesAction::List { dir, json } => {
            let store = open_store(&config, dir)?;
            let engine = Engine::new(config.clone());
            let documents = store.load_all()?;

            if json {
                let rows: Vec<_> = documents
                    .iter()
                    .map(|doc| {
                        let compiled = Rule::compile(doc.clone(), engine.kinds(), engine.plugins());
                        serde_json::json!({
                            "id": doc.id,
                            "label": doc.label,
                            "version": doc.version,
                            "enabled": doc.enabled && !config.is_disabled(&doc.id),
                            "weight": doc.weight,
                            "wildcard": compiled.as_ref().ok().map(|rule| rule.wildcard().to_string()),
                            "error": compiled.err().map(|e| e.to_string()),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            if documents.is_empty() {
                println!("No rules in {}", store.path().display());
                return Ok(());
            }
            for doc in &documents {
                let state = if doc.enabled && !config.is_disabled(&doc.id) {
                    "enabled"
                } else {
                    "disabled"
                };
                match Rule::compile(doc.clone(), engine.kinds(), engine.plugins()) {
                    Ok(rule) => println!(
                        "{:<24} {:<9} {:>4}  {}  {}",
                        doc.id,
                        state,
                        doc.weight,
                        rule.wildcard(),
                        doc.label
                    ),
                    Err(e) => println!("{:<24} invalid: {e}", doc.id),
                }
            }
        }
        RulesAction::Validate { files } => {
            let mut engine = Engine::new(config);
            let mut failures = 0usize;
            for file in &files {
                let verdict = read_document(file).and_then(|doc| {
                    let id = doc.id.clone();
                    engine.register(doc).map(|_| id)
                });
                match verdict {
                    Ok(id) => println!("ok: {} ({id})", file.display()),
                    Err(e) => {
                        failures += 1;
                        println!("invalid: {}: {e}", file.display());
                    }
                }
            }
            if failures > 0 {
                return Err(format!("{failures} of {} documents invalid", files.len()).into());
            }
        }
        RulesAction::Import { file, dir } => {
            let store = open_store(&config, dir)?;
            let document = read_document(&file)?;

            // The stored set has to stay importable with the new document in it.
            let mut documents: Vec<_> = store
                .load_all()?
                .into_iter()
                .filter(|doc| doc.id != document.id)
                .collect();
            documents.push(document.clone());
            Engine::new(config).import(documents)?;

            let path = store.save(&document)?;
            println!("Imported rule: {} -> {}", document.id, path.display());
        }
        RulesAction::Export { id, dir, json } => {
            let store = open_store(&config, dir)?;
            let document = store.load(&id)?;
            if json {
                println!("{}", document.to_json_string()?);
            } else {
                print!("{}", document.to_toml_string()?);
            }
        }
        RulesAction::Remove { id, dir } => {
            let store = open_store(&config, dir)?;
            store.remove(&id)?;
            println!("Removed rule: {id}");
        }
    }
    Ok(())
}
