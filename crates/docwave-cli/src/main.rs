mod plan_cmd;
mod run_cmd;
mod writer;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "docwave",
    about = "Wave-scheduled documentation generation orchestrator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a catalog and its domain packs
    Check {
        /// Path to the base catalog TOML file
        catalog: PathBuf,
        /// Domain pack TOML file (repeatable)
        #[arg(long = "pack")]
        packs: Vec<PathBuf>,
    },
    /// Build and print the manifest and wave plan
    Plan {
        /// Path to the base catalog TOML file
        catalog: PathBuf,
        /// Path to the decision snapshot TOML file
        #[arg(long)]
        decisions: PathBuf,
        /// Domain pack TOML file (repeatable)
        #[arg(long = "pack")]
        packs: Vec<PathBuf>,
        /// Context signal consumed by wave-4 triggers (repeatable)
        #[arg(long = "signal")]
        signals: Vec<String>,
        /// Discovered feature name (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
        /// Emit the plan as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Execute the wave plan against a doc-writing command
    Run {
        /// Path to the base catalog TOML file
        catalog: PathBuf,
        /// Path to the decision snapshot TOML file
        #[arg(long)]
        decisions: PathBuf,
        /// Domain pack TOML file (repeatable)
        #[arg(long = "pack")]
        packs: Vec<PathBuf>,
        /// Context signal consumed by wave-4 triggers (repeatable)
        #[arg(long = "signal")]
        signals: Vec<String>,
        /// Discovered feature name (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
        /// Command invoked once per document; receives the request JSON on
        /// stdin and must print the artifact to stdout
        #[arg(long)]
        writer_cmd: String,
        /// Maximum number of concurrent writer invocations
        #[arg(long, default_value_t = 4)]
        max_concurrent: usize,
        /// Directory artifacts and the run report are written into
        #[arg(long, default_value = "docs/generated")]
        out: PathBuf,
        /// Prior run report to resume from
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Drain policy after Ctrl-C: "wait" or "cancel"
        #[arg(long, default_value = "wait")]
        drain: String,
        /// Timeout per document in seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `plan --json` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { catalog, packs } => plan_cmd::run_check(&catalog, &packs),
        Commands::Plan {
            catalog,
            decisions,
            packs,
            signals,
            features,
            json,
        } => plan_cmd::run_plan(&catalog, &decisions, &packs, signals, features, json),
        Commands::Run {
            catalog,
            decisions,
            packs,
            signals,
            features,
            writer_cmd,
            max_concurrent,
            out,
            resume,
            drain,
            timeout,
        } => {
            run_cmd::run(run_cmd::RunArgs {
                catalog,
                decisions,
                packs,
                signals,
                features,
                writer_cmd,
                max_concurrent,
                out,
                resume,
                drain,
                timeout,
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
