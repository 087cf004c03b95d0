use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "eca", version, about = "Event-condition-action rule engine CLI")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Engine configuration file (defaults to the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rule document management
    Rules {
        #[command(subcommand)]
        action: commands::rules::RulesAction,
    },
    /// Print the wildcard of an event or a rule filter
    Wildcard(commands::wildcard::WildcardArgs),
    /// Dispatch one event through the stored rules
    Dispatch(commands::dispatch::DispatchArgs),
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    } else {
        EnvFilter::new(fallback)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Rules { action } => commands::rules::run(action, config),
        Commands::Wildcard(args) => commands::wildcard::run(args),
        Commands::Dispatch(args) => commands::dispatch::run(args, config),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "eca", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
