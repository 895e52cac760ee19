//! Catalog registry: conflict-checked merge of the base catalog with
//! domain-pack extensions.
//!
//! Packs may only *add* document ids; a colliding id is a fatal load error.
//! Load also validates wave ranges, trigger placement, and the static wave
//! ordering invariant: no document may require a topic whose providing
//! document sits in the same or a later wave.

use std::collections::HashMap;

use thiserror::Error;

use super::toml_format::CatalogToml;
use super::types::{DocumentType, FINAL_WAVE, Provenance};

/// Errors that can occur while loading and validating a catalog.
///
/// All variants are authoring bugs: they abort loading before any manifest
/// or plan is built.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("duplicate document id {id:?} (declared by {first} and {second})")]
    DuplicateDocumentId {
        id: String,
        first: Provenance,
        second: Provenance,
    },

    #[error("document {id:?} declares wave {wave}, expected 1..={FINAL_WAVE}")]
    InvalidWave { id: String, wave: u8 },

    #[error("document {id:?} in wave {wave} declares a trigger; triggers are wave-{FINAL_WAVE} only")]
    TriggerOutsideFinalWave { id: String, wave: u8 },

    #[error(
        "document {id:?} in wave {wave} requires topic {topic:?}, but its provider \
         {provider:?} is declared in wave {provider_wave}; providers must sit in an \
         earlier wave"
    )]
    ForwardRequirement {
        id: String,
        wave: u8,
        topic: String,
        provider: String,
        provider_wave: u8,
    },
}

/// The loaded, immutable document-type registry.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Declaration order: base rows first, then packs in argument order.
    documents: Vec<DocumentType>,
    by_id: HashMap<String, usize>,
}

impl Registry {
    /// Merge the base catalog with zero or more domain packs.
    ///
    /// Pack rows are tagged with `Provenance::Pack(<catalog name>)`.
    /// Fails on the first id collision, wave-range violation, misplaced
    /// trigger, or forward requirement.
    pub fn load(base: CatalogToml, packs: Vec<CatalogToml>) -> Result<Self, CatalogError> {
        let mut documents: Vec<DocumentType> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for row in base.documents {
            insert_document(row.into_document(Provenance::Base), &mut documents, &mut by_id)?;
        }
        for pack in packs {
            let provenance = Provenance::Pack(pack.catalog.name);
            for row in pack.documents {
                insert_document(
                    row.into_document(provenance.clone()),
                    &mut documents,
                    &mut by_id,
                )?;
            }
        }

        let registry = Self { documents, by_id };
        registry.check_wave_ordering()?;

        tracing::debug!(
            documents = registry.documents.len(),
            "catalog registry loaded"
        );

        Ok(registry)
    }

    /// Verify the static ordering invariant over the whole catalog.
    ///
    /// Also re-run by the dependency resolver: wave assignments are data,
    /// so the violation is surfaced during planning as well as at load.
    pub fn check_wave_ordering(&self) -> Result<(), CatalogError> {
        for doc in &self.documents {
            for topic in &doc.requires {
                if let Some(provider) = self.provider_of(topic) {
                    if provider.wave >= doc.wave {
                        return Err(CatalogError::ForwardRequirement {
                            id: doc.id.clone(),
                            wave: doc.wave,
                            topic: topic.clone(),
                            provider: provider.id.clone(),
                            provider_wave: provider.wave,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a document type by id.
    pub fn get(&self, id: &str) -> Option<&DocumentType> {
        self.by_id.get(id).map(|&idx| &self.documents[idx])
    }

    /// All document types in the given wave, in declaration order.
    pub fn list_by_wave(&self, wave: u8) -> Vec<&DocumentType> {
        self.documents.iter().filter(|d| d.wave == wave).collect()
    }

    /// The canonical provider of a topic: the first-declared document whose
    /// `provides` names it.
    pub fn provider_of(&self, topic: &str) -> Option<&DocumentType> {
        self.documents
            .iter()
            .find(|d| d.provides.as_deref() == Some(topic))
    }

    /// All document types in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentType> {
        self.documents.iter()
    }

    /// Number of registered document types.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the registry holds no document types.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn insert_document(
    doc: DocumentType,
    documents: &mut Vec<DocumentType>,
    by_id: &mut HashMap<String, usize>,
) -> Result<(), CatalogError> {
    if doc.wave < 1 || doc.wave > FINAL_WAVE {
        return Err(CatalogError::InvalidWave {
            id: doc.id,
            wave: doc.wave,
        });
    }
    if doc.trigger.is_some() && doc.wave != FINAL_WAVE {
        return Err(CatalogError::TriggerOutsideFinalWave {
            id: doc.id,
            wave: doc.wave,
        });
    }
    if let Some(&existing) = by_id.get(&doc.id) {
        return Err(CatalogError::DuplicateDocumentId {
            id: doc.id.clone(),
            first: documents[existing].provenance.clone(),
            second: doc.provenance,
        });
    }
    by_id.insert(doc.id.clone(), documents.len());
    documents.push(doc);
    Ok(())
}

/// Parse a catalog or domain-pack TOML string.
pub fn parse_catalog_toml(content: &str) -> Result<CatalogToml, CatalogError> {
    Ok(toml::from_str(content)?)
}
