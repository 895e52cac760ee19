//! `docwave run`: execute the wave plan with the subprocess writer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use docwave_core::manifest::{EntryStatus, ProjectContext, build_manifest};
use docwave_core::resolve::resolve;
use docwave_core::schedule::{
    AcceptAllValidator, DrainPolicy, RunOutcome, RunReport, SchedulerConfig, run_scheduler,
};
use docwave_core::writer::DocWriter;

use crate::plan_cmd::{load_decisions, load_registry};
use crate::writer::CommandWriter;

pub struct RunArgs {
    pub catalog: PathBuf,
    pub decisions: PathBuf,
    pub packs: Vec<PathBuf>,
    pub signals: Vec<String>,
    pub features: Vec<String>,
    pub writer_cmd: String,
    pub max_concurrent: usize,
    pub out: PathBuf,
    pub resume: Option<PathBuf>,
    pub drain: String,
    pub timeout: u64,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let drain = match args.drain.as_str() {
        "wait" => DrainPolicy::WaitForInFlight,
        "cancel" => DrainPolicy::CancelInFlight,
        other => bail!("invalid drain policy {other:?} (expected \"wait\" or \"cancel\")"),
    };

    let registry = load_registry(&args.catalog, &args.packs)?;
    let mut store = load_decisions(&args.decisions)?;
    let context = ProjectContext::new(args.signals, args.features);

    let mut manifest = build_manifest(&registry, &store.snapshot(), &context);

    if let Some(path) = &args.resume {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read resume report: {}", path.display()))?;
        let prior: RunReport = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse resume report: {}", path.display()))?;
        let terminal = prior
            .entries
            .iter()
            .filter(|e| e.status.is_terminal())
            .count();
        prior.seed_manifest(&mut manifest);
        println!("Resuming run {} ({terminal} terminal entries carried over)", prior.run_id);
    }

    let plan = resolve(&registry, manifest, &store.snapshot())?;
    if plan.is_empty() {
        println!("No documents selected for this project.");
        return Ok(());
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output directory: {}", args.out.display()))?;

    let writer: Arc<dyn DocWriter> = Arc::new(CommandWriter::new(
        &args.writer_cmd,
        Some(args.out.clone()),
    )?);

    let config = SchedulerConfig {
        max_concurrent: args.max_concurrent,
        doc_timeout: Some(Duration::from_secs(args.timeout.max(1))),
        drain,
    };

    // Ctrl-C stops new dispatch; in-flight entries follow the drain policy.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping new dispatch");
                cancel.cancel();
            }
        });
    }

    let report = run_scheduler(
        &registry,
        plan,
        &mut store,
        &writer,
        &AcceptAllValidator,
        &config,
        cancel,
    )
    .await?;

    let report_path = args.out.join("run-report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write run report: {}", report_path.display()))?;

    print_summary(&report);
    println!();
    println!("Report written to {}", report_path.display());

    match &report.outcome {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Interrupted => {
            bail!(
                "run interrupted; resume with --resume {}",
                report_path.display()
            )
        }
        RunOutcome::ValidationFailed { wave, reason } => {
            bail!("wave {wave} validation failed: {reason}")
        }
        RunOutcome::Failed { failed_docs } => {
            bail!(
                "run finished with {} failed document(s): {}",
                failed_docs.len(),
                failed_docs.join(", ")
            )
        }
    }
}

fn print_summary(report: &RunReport) {
    println!("Run {}", report.run_id);
    for wave in &report.waves {
        println!("  wave {}: {}", wave.wave, wave.state);
    }
    println!();
    for entry in &report.entries {
        let icon = match &entry.status {
            EntryStatus::Done => "+",
            EntryStatus::Failed(_) => "!",
            EntryStatus::Blocked(_) => "X",
            _ => ".",
        };
        println!("  [{icon}] {} ({})", entry.doc_id, entry.status);
    }
}
