//! Dependency resolution: turns a manifest into an executable wave plan.
//!
//! Structural catalog bugs (a required topic provided by an equal-or-later
//! wave) abort planning entirely. Per-entry problems (a topic unknown to
//! the decision store) block only the affected entry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Registry;
use crate::decision::DecisionSnapshot;
use crate::manifest::{BlockReason, EntryStatus, Manifest, ManifestEntry};

/// Fatal planning errors. These indicate authoring bugs, not runtime
/// conditions, and must never be silently worked around.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(
        "configuration error: document {id:?} in wave {wave} requires topic {topic:?}, \
         but its provider {provider:?} is declared in wave {provider_wave}"
    )]
    Configuration {
        id: String,
        wave: u8,
        topic: String,
        provider: String,
        provider_wave: u8,
    },
}

/// One wave's bucket of mutually independent entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveBucket {
    pub wave: u8,
    pub entries: Vec<ManifestEntry>,
}

/// The ordered execution plan: wave buckets in ascending wave order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavePlan {
    waves: Vec<WaveBucket>,
}

impl WavePlan {
    /// The wave buckets in ascending order.
    pub fn waves(&self) -> &[WaveBucket] {
        &self.waves
    }

    /// Consume the plan, yielding its buckets.
    pub fn into_waves(self) -> Vec<WaveBucket> {
        self.waves
    }

    /// Total number of entries across all waves.
    pub fn entry_count(&self) -> usize {
        self.waves.iter().map(|b| b.entries.len()).sum()
    }

    /// Whether the plan holds no entries.
    pub fn is_empty(&self) -> bool {
        self.waves.iter().all(|b| b.entries.is_empty())
    }
}

/// Resolve a manifest against the registry and decision snapshot.
///
/// - Re-checks the static wave-ordering invariant per entry; a violation
///   raises [`PlanError::Configuration`] and no plan is produced.
/// - Marks entries referencing a topic unknown to the snapshot as
///   `Blocked(UnknownTopic)` without affecting siblings.
/// - Entries already terminal (seeded from a prior run report) pass
///   through untouched.
pub fn resolve(
    registry: &Registry,
    manifest: Manifest,
    snapshot: &DecisionSnapshot,
) -> Result<WavePlan, PlanError> {
    let mut entries = manifest.entries;

    for entry in &mut entries {
        check_wave_ordering(registry, entry)?;

        if entry.status.is_terminal() {
            continue;
        }

        if let Some(unknown) = entry
            .resolved_requires
            .iter()
            .find(|topic| !snapshot.knows(topic))
        {
            tracing::warn!(
                doc_id = %entry.doc_id,
                topic = %unknown,
                "entry requires a topic unknown to the decision store"
            );
            entry.status = EntryStatus::Blocked(BlockReason::UnknownTopic(unknown.clone()));
        }
    }

    let mut waves: Vec<WaveBucket> = Vec::new();
    for entry in entries {
        match waves.iter_mut().find(|b| b.wave == entry.wave) {
            Some(bucket) => bucket.entries.push(entry),
            None => waves.push(WaveBucket {
                wave: entry.wave,
                entries: vec![entry],
            }),
        }
    }
    waves.sort_by_key(|b| b.wave);

    Ok(WavePlan { waves })
}

/// The static ordering invariant, checked per entry so the violation names
/// the offending document even when the registry was assembled elsewhere.
fn check_wave_ordering(registry: &Registry, entry: &ManifestEntry) -> Result<(), PlanError> {
    for topic in &entry.resolved_requires {
        if let Some(provider) = registry.provider_of(topic) {
            if provider.wave >= entry.wave {
                return Err(PlanError::Configuration {
                    id: entry.type_id.clone(),
                    wave: entry.wave,
                    topic: topic.clone(),
                    provider: provider.id.clone(),
                    provider_wave: provider.wave,
                });
            }
        }
    }
    Ok(())
}
