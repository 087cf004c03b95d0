use clap::Args;
use eca_core::{KindRegistry, PluginConfig};

use super::{parse_pairs, CliResult};

#[derive(Args)]
pub struct WildcardArgs {
    /// Event kind (e.g. "entity-access")
    pub kind: String,

    /// Dimension values as KEY=VALUE
    pub pairs: Vec<String>,

    /// Encode the pairs as a rule filter; values may be comma lists or "*"
    #[arg(long, conflicts_with = "against")]
    pub rule: bool,

    /// Check the event wildcard against a rule wildcard such as "node:*:view"
    #[arg(long)]
    pub against: Option<String>,
}

pub fn run(args: WildcardArgs) -> CliResult {
    let kinds = KindRegistry::with_builtins();
    let kind = kinds.get(&args.kind)?;

    if args.rule {
        let mut filter = PluginConfig::new();
        for pair in &args.pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected KEY=VALUE, got '{pair}'"))?;
            filter = filter.with(key.trim(), value);
        }
        println!("{}", kind.rule_wildcard(&filter)?);
        return Ok(());
    }

    let event = kind.event_wildcard(&parse_pairs(&args.pairs)?);
    match args.against {
        Some(encoded) => {
            let rule = kind.parse_wildcard(&encoded)?;
            let verdict = if rule.matches(&event)? { "match" } else { "no match" };
            println!("{event} {verdict} {rule}");
        }
        None => println!("{event}"),
    }
    Ok(())
}
