//! `docwave check` and `docwave plan`: catalog validation and plan
//! printing. No writer is invoked; both commands are pure planning.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use docwave_core::catalog::{FINAL_WAVE, Registry, parse_catalog_toml};
use docwave_core::decision::{DecisionStore, DecisionsToml};
use docwave_core::manifest::{ProjectContext, build_manifest};
use docwave_core::resolve::{WavePlan, resolve};

/// Load and merge the base catalog plus domain packs from disk.
pub fn load_registry(catalog: &Path, packs: &[PathBuf]) -> Result<Registry> {
    let base_content = std::fs::read_to_string(catalog)
        .with_context(|| format!("failed to read catalog file: {}", catalog.display()))?;
    let base = parse_catalog_toml(&base_content)
        .with_context(|| format!("failed to parse catalog file: {}", catalog.display()))?;

    let mut parsed = Vec::with_capacity(packs.len());
    for path in packs {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pack file: {}", path.display()))?;
        parsed.push(
            parse_catalog_toml(&content)
                .with_context(|| format!("failed to parse pack file: {}", path.display()))?,
        );
    }

    Ok(Registry::load(base, parsed)?)
}

/// Load the decision snapshot from disk.
pub fn load_decisions(path: &Path) -> Result<DecisionStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read decisions file: {}", path.display()))?;
    let decisions = DecisionsToml::parse(&content)
        .with_context(|| format!("failed to parse decisions file: {}", path.display()))?;
    Ok(decisions.into_store())
}

/// Build the manifest and resolve it into a wave plan.
pub fn build_plan(
    registry: &Registry,
    store: &DecisionStore,
    context: &ProjectContext,
) -> Result<WavePlan> {
    let snapshot = store.snapshot();
    let manifest = build_manifest(registry, &snapshot, context);
    Ok(resolve(registry, manifest, &snapshot)?)
}

/// Validate a catalog and print a per-wave summary.
pub fn run_check(catalog: &Path, packs: &[PathBuf]) -> Result<()> {
    let registry = load_registry(catalog, packs)?;
    println!(
        "Catalog OK: {} document types ({} packs)",
        registry.len(),
        packs.len()
    );

    for wave in 1..=FINAL_WAVE {
        let docs = registry.list_by_wave(wave);
        if docs.is_empty() {
            continue;
        }
        println!();
        println!("Wave {wave}:");
        for doc in docs {
            let mut notes = Vec::new();
            if doc.trigger.is_some() {
                notes.push("triggered");
            }
            if doc.per_feature {
                notes.push("per-feature");
            }
            if doc.tolerate_incomplete {
                notes.push("tolerates-incomplete");
            }
            if doc.validated {
                notes.push("validated");
            }
            let suffix = if notes.is_empty() {
                String::new()
            } else {
                format!(" [{}]", notes.join(", "))
            };
            println!("  {} - {}{}", doc.id, doc.title, suffix);
        }
    }

    Ok(())
}

/// Build the plan and print it as a table or JSON.
pub fn run_plan(
    catalog: &Path,
    decisions: &Path,
    packs: &[PathBuf],
    signals: Vec<String>,
    features: Vec<String>,
    json: bool,
) -> Result<()> {
    let registry = load_registry(catalog, packs)?;
    let store = load_decisions(decisions)?;
    let context = ProjectContext::new(signals, features);
    let plan = build_plan(&registry, &store, &context)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("No documents selected for this project.");
        return Ok(());
    }

    for bucket in plan.waves() {
        println!("Wave {}:", bucket.wave);
        for entry in &bucket.entries {
            let requires = if entry.resolved_requires.is_empty() {
                "-".to_owned()
            } else {
                entry.resolved_requires.join(", ")
            };
            println!(
                "  [{}] {} (requires: {})",
                entry.status, entry.doc_id, requires
            );
        }
        println!();
    }
    println!(
        "{} entries across {} waves",
        plan.entry_count(),
        plan.waves().len()
    );

    Ok(())
}
