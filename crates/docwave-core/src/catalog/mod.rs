//! Catalog management: TOML formats, document types, registry merging.

pub mod registry;
pub mod toml_format;
pub mod types;

pub use registry::{CatalogError, Registry, parse_catalog_toml};
pub use toml_format::{CatalogMeta, CatalogToml, DocumentToml};
pub use types::{DocumentType, FINAL_WAVE, Provenance};
