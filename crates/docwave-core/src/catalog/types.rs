//! Document-type definitions held by the catalog registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trigger::Trigger;

/// The final generation wave; the only wave where triggers are legal.
pub const FINAL_WAVE: u8 = 4;

/// Where a document type was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Declared by the base catalog.
    Base,
    /// Declared by the named domain pack.
    Pack(String),
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base catalog"),
            Self::Pack(name) => write!(f, "pack {name:?}"),
        }
    }
}

/// A document type as loaded from the catalog. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentType {
    /// Unique document id across the base catalog and all packs.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Topic slugs whose decisions this document consumes.
    pub requires: Vec<String>,
    /// Generation wave, 1 through [`FINAL_WAVE`].
    pub wave: u8,
    /// Inclusion predicate, final wave only.
    pub trigger: Option<Trigger>,
    /// Gating accepts `needs_verification` for this document's topics.
    pub tolerate_incomplete: bool,
    /// The topic slug this document substantiates, if any. Backs the
    /// wave-ordering check and the completeness downgrade on failure.
    pub provides: Option<String>,
    /// Instantiated once per normalized feature key.
    pub per_feature: bool,
    /// The containing wave must pass validation before the next wave starts.
    pub validated: bool,
    /// Doc ids whose prior-wave artifacts are handed to the writer.
    pub context: Vec<String>,
    /// Declaring source.
    pub provenance: Provenance,
}
