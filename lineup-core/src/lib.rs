//! Lineup core library — domain types, catalog loading, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes, external identifiers and catalog records
//! - [`error`] — [`CatalogError`], [`ConfigError`], [`InvalidExternalId`]
//! - [`catalog`] — load and validate the on-disk catalog
//! - [`config`] — `~/.lineup/config.yaml` settings

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{Catalog, CatalogGroup};
pub use config::Settings;
pub use error::{CatalogError, ConfigError, InvalidExternalId};
pub use types::{CanonicalRecord, EntityId, ExternalId, RemoteEntity, Tag, TagId};
