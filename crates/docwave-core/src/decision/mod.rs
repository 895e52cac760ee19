//! Per-topic decision records and the read-mostly decision store.
//!
//! The interview process that produces decision records is external to this
//! core. The store exposes read queries plus an update queue: external
//! writes land in the queue at any time and are applied only at wave
//! boundaries, so every entry in a running wave observes the same facts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Completeness status of a topic's decision record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Complete,
    Partial,
    NeedsVerification,
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::NeedsVerification => "needs_verification",
        };
        f.write_str(s)
    }
}

impl FromStr for TopicStatus {
    type Err = TopicStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete" => Ok(Self::Complete),
            "partial" => Ok(Self::Partial),
            "needs_verification" => Ok(Self::NeedsVerification),
            other => Err(TopicStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TopicStatus`] string.
#[derive(Debug, Clone)]
pub struct TopicStatusParseError(pub String);

impl fmt::Display for TopicStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid topic status: {:?}", self.0)
    }
}

impl std::error::Error for TopicStatusParseError {}

/// Accumulated decisions for one topic, produced by the external interview
/// process. Read-only to this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Human-readable topic name.
    #[serde(default)]
    pub topic: String,
    /// Unique topic slug (e.g. "tech-stack").
    pub topic_slug: String,
    /// Completeness of the record.
    pub status: TopicStatus,
    /// Capability strings this topic's decisions provide.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Topic slugs this topic's decisions depend on.
    #[serde(default)]
    pub requires: Vec<String>,
    /// The ordered decisions themselves.
    #[serde(default)]
    pub decisions: Vec<String>,
    /// Questions still open for this topic.
    #[serde(default)]
    pub open_questions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Clonable handle for submitting decision updates from outside the
/// scheduler. Submissions queue; they take effect only when the store's
/// owner calls [`DecisionStore::apply_pending`] at a wave boundary.
#[derive(Debug, Clone, Default)]
pub struct DecisionQueue {
    inner: Arc<Mutex<Vec<DecisionRecord>>>,
}

impl DecisionQueue {
    /// Queue an updated record for the next wave boundary.
    pub fn submit(&self, record: DecisionRecord) {
        self.lock().push(record);
    }

    fn drain(&self) -> Vec<DecisionRecord> {
        std::mem::take(&mut *self.lock())
    }

    // Submissions are plain pushes; a poisoned lock still holds valid data.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DecisionRecord>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The per-project decision store.
#[derive(Debug, Default)]
pub struct DecisionStore {
    records: BTreeMap<String, DecisionRecord>,
    queue: DecisionQueue,
}

impl DecisionStore {
    /// Build a store from an initial set of records, keyed by topic slug.
    pub fn new(records: impl IntoIterator<Item = DecisionRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.topic_slug.clone(), r))
                .collect(),
            queue: DecisionQueue::default(),
        }
    }

    /// A handle external writers use to queue updates.
    pub fn queue(&self) -> DecisionQueue {
        self.queue.clone()
    }

    /// Look up a topic's record.
    pub fn get_topic(&self, slug: &str) -> Option<&DecisionRecord> {
        self.records.get(slug)
    }

    /// Whether the topic exists and is `complete`.
    pub fn is_complete(&self, slug: &str) -> bool {
        self.records
            .get(slug)
            .is_some_and(|r| r.status == TopicStatus::Complete)
    }

    /// Apply all queued updates. Called by the scheduler only at wave
    /// boundaries. Returns the number of records applied.
    pub fn apply_pending(&mut self) -> usize {
        let pending = self.queue.drain();
        let applied = pending.len();
        for record in pending {
            self.records.insert(record.topic_slug.clone(), record);
        }
        applied
    }

    /// An immutable, cheaply clonable view of the current records.
    pub fn snapshot(&self) -> DecisionSnapshot {
        DecisionSnapshot {
            records: Arc::new(self.records.clone()),
        }
    }
}

/// Immutable view of the decision store taken at a wave boundary.
#[derive(Debug, Clone, Default)]
pub struct DecisionSnapshot {
    records: Arc<BTreeMap<String, DecisionRecord>>,
}

impl DecisionSnapshot {
    /// Look up a topic's record.
    pub fn get_topic(&self, slug: &str) -> Option<&DecisionRecord> {
        self.records.get(slug)
    }

    /// Whether the topic is known to the store at all.
    pub fn knows(&self, slug: &str) -> bool {
        self.records.contains_key(slug)
    }

    /// The topic's status, if known.
    pub fn status_of(&self, slug: &str) -> Option<TopicStatus> {
        self.records.get(slug).map(|r| r.status)
    }

    /// Whether the topic exists and is `complete`.
    pub fn is_complete(&self, slug: &str) -> bool {
        self.status_of(slug) == Some(TopicStatus::Complete)
    }
}

// ---------------------------------------------------------------------------
// TOML loading
// ---------------------------------------------------------------------------

/// On-disk decision snapshot: `[[topics]]` rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionsToml {
    #[serde(default)]
    pub topics: Vec<DecisionRecord>,
}

impl DecisionsToml {
    /// Parse a decisions TOML string.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Build a [`DecisionStore`] from the parsed rows.
    pub fn into_store(self) -> DecisionStore {
        DecisionStore::new(self.topics)
    }
}
