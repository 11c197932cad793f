//! source-combinator CLI
//!
//! Runs requests against a combinator tree described in TOML.
//!
//! ```text
//! sources.toml
//!     → config::load_config (parse, validate)
//!     → SourceRegistry::from_fixtures ([[sources]])
//!     → registry::build_root ([root])
//!     → request / capability
//!     → JSON on stdout, logs on stderr
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use source_combinator::config::load_config;
use source_combinator::observability::{logging, metrics};
use source_combinator::registry::builder::build_root;
use source_combinator::{Budget, RequestKey, Requirement, SourceRegistry};

#[derive(Parser)]
#[command(name = "source-combinator")]
#[command(about = "Query a tree of combined fact sources", long_about = None)]
struct Cli {
    /// Topology and fixture configuration.
    #[arg(short, long, default_value = "sources.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one or more keys (`1`, `1:0x…`, `1:0x…/0x…`)
    Request {
        #[arg(required = true)]
        keys: Vec<RequestKey>,

        /// Field the answer must contain
        #[arg(long = "require")]
        required: Vec<String>,

        /// Field to include when available
        #[arg(long = "accept")]
        accepted: Vec<String>,

        /// Overrides `[timeouts] budget_ms`
        #[arg(long)]
        budget_ms: Option<u64>,
    },
    /// Show the fields the tree declares for a key
    Capability { key: RequestKey },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(config = %cli.config.display(), sources = config.sources.len(), "Configuration loaded");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = SourceRegistry::from_fixtures(&config.sources)?;
    let root = build_root(&registry, &config)?;
    tracing::info!(root = %root.id(), "Topology built");

    match cli.command {
        Commands::Request {
            keys,
            required,
            accepted,
            budget_ms,
        } => {
            let requirement = accepted
                .into_iter()
                .fold(Requirement::new(), |req, field| req.accept(field));
            let requirement = required
                .into_iter()
                .fold(requirement, |req, field| req.require(field));
            let budget = Budget::within(Duration::from_millis(
                budget_ms.unwrap_or(config.timeouts.budget_ms),
            ));

            let batch = root.request_batch(&keys, &requirement, Some(budget)).await?;
            tracing::info!(requested = keys.len(), answered = batch.len(), "Request complete");
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        Commands::Capability { key } => {
            let fields = root.capability_for(&key);
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }

    Ok(())
}
