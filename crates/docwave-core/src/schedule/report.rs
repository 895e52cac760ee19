//! The terminal run report: one record per entry plus per-wave states.
//!
//! Dispatch and completion timestamps make the wave-isolation guarantee
//! externally checkable, and terminal statuses seed idempotent resume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WaveState;
use crate::manifest::{EntryStatus, Manifest};

/// How the run as a whole ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every dispatched entry completed; blocked entries are reported but
    /// do not fail the run.
    Completed,
    /// One or more entries failed.
    Failed { failed_docs: Vec<String> },
    /// A wave's validation failed; later waves never started.
    ValidationFailed { wave: u8, reason: String },
    /// The run was cancelled; untouched entries remain pending and the run
    /// is resumable.
    Interrupted,
}

/// Terminal state of one wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveReport {
    pub wave: u8,
    pub state: WaveState,
}

/// Terminal record for one manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReport {
    pub doc_id: String,
    pub wave: u8,
    pub status: EntryStatus,
    /// When the entry was handed to the writer, if it was.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// When the writer's result was recorded, if it was.
    pub completed_at: Option<DateTime<Utc>>,
}

/// The structured result of a scheduler run. Reason codes per non-done
/// entry are sufficient to retry exactly the affected documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub waves: Vec<WaveReport>,
    pub entries: Vec<EntryReport>,
}

impl RunReport {
    /// Carry terminal statuses from a prior run into a freshly built
    /// manifest. The scheduler skips seeded entries, so re-running against
    /// an unchanged decision snapshot reproduces their statuses exactly.
    pub fn seed_manifest(&self, manifest: &mut Manifest) {
        for record in &self.entries {
            if !record.status.is_terminal() {
                continue;
            }
            if let Some(entry) = manifest
                .entries
                .iter_mut()
                .find(|e| e.doc_id == record.doc_id)
            {
                entry.status = record.status.clone();
            }
        }
    }

    /// The report record for a given entry id.
    pub fn entry(&self, doc_id: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.doc_id == doc_id)
    }

    /// The terminal state of a given wave, if the plan contained it.
    pub fn wave_state(&self, wave: u8) -> Option<WaveState> {
        self.waves.iter().find(|w| w.wave == wave).map(|w| w.state)
    }
}
