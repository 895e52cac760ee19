//! TOML format types for catalog and domain-pack files.
//!
//! These types map directly to the on-disk format and are deserialized via
//! `serde` + the `toml` crate. A domain pack uses the identical schema; its
//! rows are tagged with the pack's provenance at registry load.

use serde::{Deserialize, Serialize};

use super::types::{DocumentType, Provenance};
use crate::trigger::Trigger;

/// Top-level structure of a catalog or domain-pack file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogToml {
    /// Catalog metadata.
    pub catalog: CatalogMeta,
    /// Document-type rows.
    #[serde(default)]
    pub documents: Vec<DocumentToml>,
}

/// Catalog-level metadata in `[catalog]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogMeta {
    /// Human-readable catalog name; used as the provenance tag for packs.
    pub name: String,
}

/// A single `[[documents]]` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentToml {
    /// Unique document id (e.g. "api-reference").
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Topic slugs this document requires decisions for.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Generation wave, 1 through 4.
    pub wave: u8,
    /// Inclusion predicate (wave 4 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    /// Accept `needs_verification` topics at gating.
    #[serde(default)]
    pub tolerate_incomplete: bool,
    /// Topic slug this document substantiates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provides: Option<String>,
    /// Instantiate once per discovered feature.
    #[serde(default)]
    pub per_feature: bool,
    /// The containing wave requires validation before the next wave.
    #[serde(default)]
    pub validated: bool,
    /// Doc ids whose artifacts are passed to the writer as context.
    #[serde(default)]
    pub context: Vec<String>,
}

impl DocumentToml {
    /// Convert a parsed row into an immutable [`DocumentType`] tagged with
    /// its declaring source.
    pub fn into_document(self, provenance: Provenance) -> DocumentType {
        DocumentType {
            id: self.id,
            title: self.title,
            requires: self.requires,
            wave: self.wave,
            trigger: self.trigger,
            tolerate_incomplete: self.tolerate_incomplete,
            provides: self.provides,
            per_feature: self.per_feature,
            validated: self.validated,
            context: self.context,
            provenance,
        }
    }
}
