//! Capabilities the engine is handed at construction time.
//!
//! The engine never reaches for a global client: the remote store, object
//! storage, the metadata API and the clock are all passed in, so the record
//! state machine runs unchanged against HTTP backends or in-memory fakes.
//! Every call is independently atomic; nothing here spans a transaction.

use std::collections::BTreeSet;

use chrono::Utc;
use lineup_core::{EntityId, ExternalId, RemoteEntity, Tag, TagId};

use crate::error::{DownloadError, ResolveError, StorageError, StoreError};

/// Row to insert for a newly discovered channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    pub display_name: String,
    /// Canonical channel id.
    pub external_id: String,
    pub external_title: String,
    /// Empty placeholder until the avatar upload succeeds.
    pub asset_path: String,
}

/// Partial update; `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPatch {
    pub display_name: Option<String>,
    pub external_title: Option<String>,
    pub asset_path: Option<String>,
}

impl EntityPatch {
    pub fn asset_path(path: impl Into<String>) -> Self {
        Self {
            asset_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.external_title.is_none() && self.asset_path.is_none()
    }
}

/// Entity rows, keyed by id and unique by external id.
pub trait EntityStore {
    fn find_entity_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<RemoteEntity>, StoreError>;

    /// Returns `StoreError::Conflict` when the external id already exists.
    fn insert_entity(&self, entity: &NewEntity) -> Result<RemoteEntity, StoreError>;

    fn update_entity(&self, id: &EntityId, patch: &EntityPatch) -> Result<(), StoreError>;

    fn delete_entity(&self, id: &EntityId) -> Result<(), StoreError>;
}

/// Tag definitions and entity↔tag associations.
pub trait TagStore {
    /// Names of every tag currently associated with `entity`.
    fn tag_names_for(&self, entity: &EntityId) -> Result<BTreeSet<String>, StoreError>;

    fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError>;

    /// Returns `StoreError::Conflict` when a tag with `name` already exists.
    fn insert_tag(&self, name: &str) -> Result<Tag, StoreError>;

    fn delete_associations(&self, entity: &EntityId) -> Result<(), StoreError>;

    fn insert_associations(&self, entity: &EntityId, tags: &[TagId]) -> Result<(), StoreError>;
}

/// The full relational store: entities plus the tagging graph.
pub trait RemoteStore: EntityStore + TagStore {}

impl<T: EntityStore + TagStore + ?Sized> RemoteStore for T {}

/// Write-once blob storage.
pub trait ObjectStorage {
    /// Store `bytes` at `path` and return the stored object path.
    /// Must fail with `StorageError::AlreadyExists` rather than overwrite.
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;
}

/// Display metadata of a resolved channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetadata {
    /// Stable channel id, whatever form was authored.
    pub canonical_id: String,
    pub title: String,
    /// Highest-resolution thumbnail available.
    pub avatar_url: String,
}

/// Downloaded avatar bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// The rate-limited third-party metadata API.
pub trait MetadataSource {
    fn resolve(&self, id: &ExternalId) -> Result<ChannelMetadata, ResolveError>;

    fn download_asset(&self, url: &str) -> Result<Asset, DownloadError>;
}

/// Source of creation timestamps for avatar paths.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
