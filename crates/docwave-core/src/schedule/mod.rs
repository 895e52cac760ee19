//! Wave scheduler: executes a wave plan to completion.
//!
//! Each wave is gated on the terminal completion of the prior wave, its
//! ready entries dispatch concurrently (bounded by a semaphore) to the
//! external doc-writing agent interface, and every entry records a
//! terminal status in the run report. Decision-store updates queue during
//! a wave and apply only at wave boundaries, so all entries in a wave
//! observe the same gating facts.

pub mod report;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::{DocumentType, Registry};
use crate::decision::{DecisionSnapshot, DecisionStore, TopicStatus};
use crate::manifest::{BlockReason, EntryStatus, FailReason, ManifestEntry};
use crate::resolve::WavePlan;
use crate::writer::{DocArtifact, DocRequest, DocWriter};

pub use report::{EntryReport, RunOutcome, RunReport, WaveReport};

// ---------------------------------------------------------------------------
// Wave state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of one wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveState {
    Pending,
    Gating,
    Running,
    Validated,
    Done,
    Failed,
}

impl fmt::Display for WaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Gating => "gating",
            Self::Running => "running",
            Self::Validated => "validated",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The wave state machine.
///
/// Enforces the valid transition graph:
///
/// ```text
/// pending   -> gating
/// gating    -> running
/// running   -> validated
/// running   -> done       (wave without a validation requirement)
/// running   -> failed     (validation failure)
/// validated -> done
/// ```
pub struct WaveStateMachine;

impl WaveStateMachine {
    /// Check whether a transition from `from` to `to` is a valid edge in
    /// the state graph.
    pub fn is_valid_transition(from: WaveState, to: WaveState) -> bool {
        matches!(
            (from, to),
            (WaveState::Pending, WaveState::Gating)
                | (WaveState::Gating, WaveState::Running)
                | (WaveState::Running, WaveState::Validated)
                | (WaveState::Running, WaveState::Done)
                | (WaveState::Running, WaveState::Failed)
                | (WaveState::Validated, WaveState::Done)
        )
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// The outcome of validating one completed wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveVerdict {
    Passed,
    Failed { reason: String },
}

/// External validation hook, consulted after a wave finishes running.
///
/// Wave 1 is always validated before any later wave starts; other waves
/// opt in via the document-type `validated` flag.
#[async_trait]
pub trait WaveValidator: Send + Sync {
    async fn validate(&self, wave: u8, entries: &[ManifestEntry]) -> Result<WaveVerdict>;
}

/// Default validator: accepts every wave.
pub struct AcceptAllValidator;

#[async_trait]
impl WaveValidator for AcceptAllValidator {
    async fn validate(&self, _wave: u8, _entries: &[ManifestEntry]) -> Result<WaveVerdict> {
        Ok(WaveVerdict::Passed)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do with in-flight entries after cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Let in-flight writers finish naturally and record their results.
    WaitForInFlight,
    /// Abandon in-flight writers; their entries are marked failed/cancelled.
    CancelInFlight,
}

/// Configuration for the wave scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of concurrent writer invocations.
    pub max_concurrent: usize,
    /// Wall-time limit per document; elapsed entries fail.
    pub doc_timeout: Option<Duration>,
    /// Drain behavior after cancellation.
    pub drain: DrainPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            doc_timeout: None,
            drain: DrainPolicy::WaitForInFlight,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// An entry plus its run bookkeeping.
struct Scheduled {
    entry: ManifestEntry,
    dispatched_at: Option<chrono::DateTime<Utc>>,
    completed_at: Option<chrono::DateTime<Utc>>,
}

/// A wave bucket plus its state.
struct ScheduledWave {
    wave: u8,
    state: WaveState,
    entries: Vec<Scheduled>,
}

/// Message sent from spawned writer tasks back to the scheduler loop.
struct WriteDone {
    index: usize,
    result: Result<DocArtifact, FailReason>,
}

fn transition_wave(wave: &mut ScheduledWave, to: WaveState) {
    debug_assert!(
        WaveStateMachine::is_valid_transition(wave.state, to),
        "invalid wave transition: {} -> {} for wave {}",
        wave.state,
        to,
        wave.wave
    );
    tracing::debug!(wave = wave.wave, from = %wave.state, to = %to, "wave transition");
    wave.state = to;
}

/// Run the scheduler for a wave plan.
///
/// Dispatches ready entries wave by wave, enforcing the concurrency limit
/// via a semaphore, gating each wave on the terminal completion (and,
/// where required, validation) of the prior wave, and recording a terminal
/// status per entry. Returns the structured [`RunReport`].
pub async fn run_scheduler(
    registry: &Registry,
    plan: WavePlan,
    store: &mut DecisionStore,
    writer: &Arc<dyn DocWriter>,
    validator: &dyn WaveValidator,
    config: &SchedulerConfig,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    let max_concurrent = config.max_concurrent.max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    let mut waves: Vec<ScheduledWave> = plan
        .into_waves()
        .into_iter()
        .map(|bucket| ScheduledWave {
            wave: bucket.wave,
            state: WaveState::Pending,
            entries: bucket
                .entries
                .into_iter()
                .map(|entry| Scheduled {
                    entry,
                    dispatched_at: None,
                    completed_at: None,
                })
                .collect(),
        })
        .collect();

    // Topics whose substantiating document failed; treated as
    // needs_verification for downstream gating.
    let mut downgraded: BTreeSet<String> = BTreeSet::new();
    let mut artifacts: HashMap<String, DocArtifact> = HashMap::new();
    let mut outcome: Option<RunOutcome> = None;

    tracing::info!(
        run_id = %run_id,
        waves = waves.len(),
        writer = writer.name(),
        "starting wave scheduler"
    );

    for wi in 0..waves.len() {
        if cancel.is_cancelled() {
            outcome = Some(RunOutcome::Interrupted);
            break;
        }
        let wave_no = waves[wi].wave;

        // Gating. The prior wave is terminal by construction; queued
        // decision updates apply here, at the boundary, so every entry in
        // this wave observes the same snapshot.
        transition_wave(&mut waves[wi], WaveState::Gating);
        let applied = store.apply_pending();
        if applied > 0 {
            tracing::debug!(wave = wave_no, applied, "applied queued decision updates");
        }
        let snapshot = store.snapshot();

        for sched in &mut waves[wi].entries {
            if sched.entry.status.is_terminal() {
                continue;
            }
            let doc = registry.get(&sched.entry.type_id).with_context(|| {
                format!(
                    "document type {:?} not found in registry",
                    sched.entry.type_id
                )
            })?;
            match gate_entry(doc, &sched.entry, &snapshot, &downgraded) {
                Ok(()) => sched.entry.status = EntryStatus::Ready,
                Err(reason) => {
                    tracing::warn!(
                        doc_id = %sched.entry.doc_id,
                        wave = wave_no,
                        reason = %reason,
                        "entry blocked at gating"
                    );
                    sched.entry.status = EntryStatus::Blocked(reason);
                }
            }
        }

        // Running: dispatch every ready entry, bounded by the semaphore.
        transition_wave(&mut waves[wi], WaveState::Running);
        let capacity = waves[wi].entries.len().max(1);
        let (tx, mut rx) = mpsc::channel::<WriteDone>(capacity);
        let mut interrupted = false;

        let ready: Vec<usize> = waves[wi]
            .entries
            .iter()
            .enumerate()
            .filter(|(_, s)| s.entry.status == EntryStatus::Ready)
            .map(|(i, _)| i)
            .collect();

        for idx in ready {
            // Cancellation stops new dispatch; not-yet-started entries
            // revert to pending and remain resumable.
            if interrupted || cancel.is_cancelled() {
                waves[wi].entries[idx].entry.status = EntryStatus::Pending;
                interrupted = true;
                continue;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit?,
                _ = cancel.cancelled() => {
                    waves[wi].entries[idx].entry.status = EntryStatus::Pending;
                    interrupted = true;
                    continue;
                }
            };

            let doc = registry
                .get(&waves[wi].entries[idx].entry.type_id)
                .with_context(|| {
                    format!(
                        "document type {:?} not found in registry",
                        waves[wi].entries[idx].entry.type_id
                    )
                })?;
            let request = build_request(doc, &waves[wi].entries[idx].entry, &snapshot, &artifacts);

            let sched = &mut waves[wi].entries[idx];
            sched.entry.status = EntryStatus::Generating;
            sched.dispatched_at = Some(Utc::now());
            tracing::info!(doc_id = %sched.entry.doc_id, wave = wave_no, "dispatching entry");

            let writer = Arc::clone(writer);
            let tx = tx.clone();
            let task_cancel = cancel.clone();
            let drain = config.drain;
            let doc_timeout = config.doc_timeout;

            tokio::spawn(async move {
                let write = async {
                    let result = match doc_timeout {
                        Some(limit) => {
                            match tokio::time::timeout(limit, writer.write(&request)).await {
                                Ok(result) => result,
                                Err(_) => Err(anyhow::anyhow!(
                                    "writer timed out after {}s",
                                    limit.as_secs()
                                )),
                            }
                        }
                        None => writer.write(&request).await,
                    };
                    result.map_err(|e| FailReason::Agent(format!("{e:#}")))
                };

                let result = match drain {
                    DrainPolicy::WaitForInFlight => write.await,
                    DrainPolicy::CancelInFlight => tokio::select! {
                        result = write => result,
                        _ = task_cancel.cancelled() => Err(FailReason::Cancelled),
                    },
                };

                drop(permit);
                let _ = tx.send(WriteDone { index: idx, result }).await;
            });
        }
        drop(tx);

        // Drain every dispatched entry. With the wait policy this lets
        // in-flight writers finish naturally even after cancellation.
        while let Some(done) = rx.recv().await {
            let sched = &mut waves[wi].entries[done.index];
            sched.completed_at = Some(Utc::now());
            match done.result {
                Ok(artifact) => {
                    tracing::info!(doc_id = %sched.entry.doc_id, wave = wave_no, "entry done");
                    sched.entry.status = EntryStatus::Done;
                    artifacts.insert(sched.entry.doc_id.clone(), artifact);
                }
                Err(reason) => {
                    tracing::warn!(
                        doc_id = %sched.entry.doc_id,
                        wave = wave_no,
                        reason = %reason,
                        "entry failed"
                    );
                    // The document meant to substantiate its topic did not
                    // complete: downgrade the topic for downstream gating.
                    if matches!(reason, FailReason::Agent(_)) {
                        if let Some(topic) = registry
                            .get(&sched.entry.type_id)
                            .and_then(|d| d.provides.clone())
                        {
                            tracing::warn!(
                                doc_id = %sched.entry.doc_id,
                                topic = %topic,
                                "downgrading topic to needs_verification"
                            );
                            downgraded.insert(topic);
                        }
                    }
                    sched.entry.status = EntryStatus::Failed(reason);
                }
            }
        }

        if interrupted || cancel.is_cancelled() {
            outcome = Some(RunOutcome::Interrupted);
            break;
        }

        // Validation: wave 1 always, other waves when a member opts in.
        let needs_validation = wave_no == 1
            || waves[wi]
                .entries
                .iter()
                .any(|s| registry.get(&s.entry.type_id).is_some_and(|d| d.validated));

        if needs_validation {
            let entries: Vec<ManifestEntry> =
                waves[wi].entries.iter().map(|s| s.entry.clone()).collect();
            match validator.validate(wave_no, &entries).await? {
                WaveVerdict::Passed => {
                    transition_wave(&mut waves[wi], WaveState::Validated);
                    transition_wave(&mut waves[wi], WaveState::Done);
                }
                WaveVerdict::Failed { reason } => {
                    tracing::error!(
                        wave = wave_no,
                        reason = %reason,
                        "wave validation failed; halting progression"
                    );
                    transition_wave(&mut waves[wi], WaveState::Failed);
                    outcome = Some(RunOutcome::ValidationFailed {
                        wave: wave_no,
                        reason,
                    });
                    break;
                }
            }
        } else {
            transition_wave(&mut waves[wi], WaveState::Done);
        }
    }

    let outcome = outcome.unwrap_or_else(|| {
        let failed: Vec<String> = waves
            .iter()
            .flat_map(|w| &w.entries)
            .filter(|s| matches!(s.entry.status, EntryStatus::Failed(_)))
            .map(|s| s.entry.doc_id.clone())
            .collect();
        if failed.is_empty() {
            RunOutcome::Completed
        } else {
            RunOutcome::Failed {
                failed_docs: failed,
            }
        }
    });

    tracing::info!(run_id = %run_id, outcome = ?outcome, "wave scheduler finished");

    Ok(RunReport {
        run_id,
        outcome,
        waves: waves
            .iter()
            .map(|w| WaveReport {
                wave: w.wave,
                state: w.state,
            })
            .collect(),
        entries: waves
            .iter()
            .flat_map(|w| &w.entries)
            .map(|s| EntryReport {
                doc_id: s.entry.doc_id.clone(),
                wave: s.entry.wave,
                status: s.entry.status.clone(),
                dispatched_at: s.dispatched_at,
                completed_at: s.completed_at,
            })
            .collect(),
    })
}

/// Check one entry's required topics against the boundary snapshot.
fn gate_entry(
    doc: &DocumentType,
    entry: &ManifestEntry,
    snapshot: &DecisionSnapshot,
    downgraded: &BTreeSet<String>,
) -> Result<(), BlockReason> {
    for topic in &entry.resolved_requires {
        let status = if downgraded.contains(topic) {
            Some(TopicStatus::NeedsVerification)
        } else {
            snapshot.status_of(topic)
        };
        match status {
            None => return Err(BlockReason::UnknownTopic(topic.clone())),
            Some(TopicStatus::Complete) => {}
            Some(TopicStatus::NeedsVerification) if doc.tolerate_incomplete => {}
            Some(_) => return Err(BlockReason::IncompleteTopic(topic.clone())),
        }
    }
    Ok(())
}

/// Assemble the writer request: one decision record per required topic,
/// plus any declared prior-wave artifacts that exist.
fn build_request(
    doc: &DocumentType,
    entry: &ManifestEntry,
    snapshot: &DecisionSnapshot,
    artifacts: &HashMap<String, DocArtifact>,
) -> DocRequest {
    let decisions = entry
        .resolved_requires
        .iter()
        .filter_map(|topic| snapshot.get_topic(topic).cloned())
        .collect();
    let context = doc
        .context
        .iter()
        .filter_map(|id| artifacts.get(id).cloned())
        .collect();
    DocRequest {
        doc_id: entry.doc_id.clone(),
        title: doc.title.clone(),
        wave: entry.wave,
        decisions,
        context,
    }
}
