//! Phase 0: manifest building.
//!
//! Selects and instantiates the project-specific set of document entries
//! from the registry, the decision snapshot, and the project context.
//! Re-running with identical inputs produces an identical manifest.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{DocumentType, FINAL_WAVE, Registry};
use crate::decision::DecisionSnapshot;

// ---------------------------------------------------------------------------
// Entry states
// ---------------------------------------------------------------------------

/// Why an entry is blocked. Entry-scoped; never aborts sibling work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The entry requires a topic the decision store has no record type for.
    UnknownTopic(String),
    /// A required topic is not `complete` (and not tolerated).
    IncompleteTopic(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopic(topic) => write!(f, "unknown topic {topic:?}"),
            Self::IncompleteTopic(topic) => write!(f, "incomplete topic {topic:?}"),
        }
    }
}

/// Why an entry failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// The external doc-writing agent reported an error.
    Agent(String),
    /// The run was cancelled while this entry was in flight.
    Cancelled,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(message) => write!(f, "agent failure: {message}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// State of a single manifest entry.
///
/// Valid transitions:
///
/// ```text
/// pending    -> ready | blocked
/// ready      -> generating | pending   (pending on cancelled dispatch)
/// generating -> done | failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Blocked(BlockReason),
    Ready,
    Generating,
    Done,
    Failed(FailReason),
}

impl EntryStatus {
    /// Whether this status ends the entry's lifecycle for the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Blocked(_))
    }

    /// Check whether a transition to `next` is a valid edge in the entry
    /// state graph.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Ready)
                | (Self::Pending, Self::Blocked(_))
                | (Self::Ready, Self::Generating)
                | (Self::Ready, Self::Pending)
                | (Self::Generating, Self::Done)
                | (Self::Generating, Self::Failed(_))
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Blocked(reason) => write!(f, "blocked ({reason})"),
            Self::Ready => f.write_str("ready"),
            Self::Generating => f.write_str("generating"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A single document to generate for this project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Instance id; equals the catalog id except for per-feature instances,
    /// which append the normalized feature key.
    pub doc_id: String,
    /// The catalog document-type id this entry was instantiated from.
    pub type_id: String,
    /// Generation wave, copied from the document type.
    pub wave: u8,
    /// Topic slugs resolved against the registry's topic universe.
    pub resolved_requires: Vec<String>,
    /// Current lifecycle state.
    pub status: EntryStatus,
}

/// The resolved, project-specific list of document entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Entries in the given wave, in manifest order.
    pub fn entries_in_wave(&self, wave: u8) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |e| e.wave == wave)
    }

    /// Find an entry by its instance id.
    pub fn get(&self, doc_id: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.doc_id == doc_id)
    }
}

// ---------------------------------------------------------------------------
// Project context
// ---------------------------------------------------------------------------

/// Project signals consumed by Phase 0: architecture flags, detected
/// patterns, and the discovered feature list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Context signals matched by wave-4 triggers.
    #[serde(default)]
    pub signals: BTreeSet<String>,
    /// Discovered feature names; drive per-feature instantiation.
    #[serde(default)]
    pub features: Vec<String>,
}

impl ProjectContext {
    pub fn new(
        signals: impl IntoIterator<Item = String>,
        features: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            signals: signals.into_iter().collect(),
            features: features.into_iter().collect(),
        }
    }
}

/// Normalize a feature name into a stable instance key: lowercased, with
/// non-alphanumeric runs collapsed to single dashes.
pub fn normalize_feature(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !key.is_empty() {
                key.push('-');
            }
            pending_dash = false;
            for lower in ch.to_lowercase() {
                key.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    key
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the manifest for a project.
///
/// Selection rules:
/// - Wave-1 types are always included.
/// - Wave-2/3 types are included when every declared required topic is
///   known to the snapshot. Completeness is checked later, at gating.
/// - Wave-4 types with a trigger are included when the trigger matches the
///   context signals; types without one follow the wave-2/3 rule.
/// - `per_feature` types instantiate once per normalized feature key.
pub fn build_manifest(
    registry: &Registry,
    snapshot: &DecisionSnapshot,
    context: &ProjectContext,
) -> Manifest {
    let mut entries: Vec<ManifestEntry> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    let feature_keys: BTreeSet<String> = context
        .features
        .iter()
        .map(|name| normalize_feature(name))
        .filter(|key| !key.is_empty())
        .collect();

    for doc in registry.iter() {
        if !selected(doc, snapshot, context) {
            continue;
        }

        if doc.per_feature {
            for key in &feature_keys {
                push_entry(&mut entries, &mut seen, doc, format!("{}-{key}", doc.id));
            }
        } else {
            push_entry(&mut entries, &mut seen, doc, doc.id.clone());
        }
    }

    tracing::debug!(entries = entries.len(), "manifest built");

    Manifest { entries }
}

fn selected(doc: &DocumentType, snapshot: &DecisionSnapshot, context: &ProjectContext) -> bool {
    if doc.wave == 1 {
        return true;
    }
    if doc.wave == FINAL_WAVE {
        if let Some(trigger) = &doc.trigger {
            return trigger.matches(&context.signals);
        }
    }
    doc.requires.iter().all(|topic| snapshot.knows(topic))
}

fn push_entry(
    entries: &mut Vec<ManifestEntry>,
    seen: &mut BTreeSet<String>,
    doc: &DocumentType,
    doc_id: String,
) {
    if !seen.insert(doc_id.clone()) {
        return;
    }
    entries.push(ManifestEntry {
        doc_id,
        type_id: doc.id.clone(),
        wave: doc.wave,
        resolved_requires: doc.requires.clone(),
        status: EntryStatus::Pending,
    });
}
