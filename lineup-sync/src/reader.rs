//! Remote State Reader.
//!
//! Thin, uncached read access to the store. Every call goes to the store so
//! later steps of a record always see the latest committed state. A failed
//! read is fatal for the record being processed, never for the run.

use std::collections::BTreeSet;

use lineup_core::{EntityId, RemoteEntity};

use crate::error::SyncError;
use crate::ports::RemoteStore;

pub struct RemoteStateReader<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteStore + ?Sized> RemoteStateReader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Look up the entity stored under a canonical channel id.
    pub fn lookup_by_external_id(&self, external_id: &str) -> Result<Option<RemoteEntity>, SyncError> {
        self.store
            .find_entity_by_external_id(external_id)
            .map_err(SyncError::StoreRead)
    }

    /// Names of the tags currently associated with `entity`.
    pub fn current_tags(&self, entity: &EntityId) -> Result<BTreeSet<String>, SyncError> {
        self.store.tag_names_for(entity).map_err(SyncError::StoreRead)
    }
}
