//! Tag Synchronizer.
//!
//! Converges an entity's tag associations to the desired set:
//!
//! 1. Read the current tag names.
//! 2. Equal as sets → nothing to do, zero writes.
//! 3. Get-or-create every desired tag.
//! 4. Delete all associations of the entity.
//! 5. Insert associations for the full desired set.
//!
//! Between steps 4 and 5 the entity briefly has no tags. If step 5 fails the
//! entity is left untagged until the next run.

use std::collections::BTreeSet;

use lineup_core::{EntityId, TagId};

use crate::error::{StoreError, SyncError, TagSyncError};
use crate::ports::RemoteStore;
use crate::reader::RemoteStateReader;

/// What [`TagSynchronizer::replace_associations`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSyncResult {
    /// Current tags already matched; no write was issued.
    Unchanged,
    /// Associations were rebuilt with `linked` tags.
    Replaced { linked: usize },
}

impl TagSyncResult {
    pub fn changed(self) -> bool {
        matches!(self, TagSyncResult::Replaced { .. })
    }
}

pub struct TagSynchronizer<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteStore + ?Sized> TagSynchronizer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Get-or-create a tag per name. Idempotent.
    ///
    /// A unique-constraint conflict on insert means another writer created
    /// the tag after our lookup; the row is then read back by name.
    pub fn ensure_tags(&self, names: &BTreeSet<String>) -> Result<Vec<TagId>, TagSyncError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let ensure_err = |source| TagSyncError::EnsureTag {
                name: name.clone(),
                source,
            };
            let tag = match self.store.find_tag(name).map_err(ensure_err)? {
                Some(tag) => tag,
                None => match self.store.insert_tag(name) {
                    Ok(tag) => {
                        tracing::debug!(tag = %name, "created tag");
                        tag
                    }
                    Err(StoreError::Conflict(_)) => self
                        .store
                        .find_tag(name)
                        .map_err(ensure_err)?
                        .ok_or_else(|| {
                            ensure_err(StoreError::Decode(format!(
                                "tag '{name}' conflicted on insert but cannot be read back"
                            )))
                        })?,
                    Err(e) => return Err(ensure_err(e)),
                },
            };
            ids.push(tag.id);
        }
        Ok(ids)
    }

    /// Make `entity`'s associations equal `desired`.
    pub fn replace_associations(
        &self,
        entity: &EntityId,
        desired: &BTreeSet<String>,
    ) -> Result<TagSyncResult, SyncError> {
        let current = RemoteStateReader::new(self.store).current_tags(entity)?;
        if current == *desired {
            tracing::debug!(entity = %entity, "tags already converged");
            return Ok(TagSyncResult::Unchanged);
        }

        let ids = self.ensure_tags(desired)?;

        self.store
            .delete_associations(entity)
            .map_err(TagSyncError::Clear)?;
        if !ids.is_empty() {
            self.store
                .insert_associations(entity, &ids)
                .map_err(TagSyncError::Link)?;
        }

        tracing::info!(
            entity = %entity,
            removed = current.difference(desired).count(),
            added = desired.difference(&current).count(),
            "replaced tag associations"
        );
        Ok(TagSyncResult::Replaced { linked: ids.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreOp};

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn ensure_tags_creates_missing_and_reuses_existing() {
        let store = MemoryStore::new();
        let entity = store.seed_entity("A", "UCaaaaaaaaaaaaaaaaaaaaaa", "A", "");
        store.seed_tags(&entity, &["Creators"]);

        let sync = TagSynchronizer::new(&store);
        let ids = sync.ensure_tags(&set(&["Creators", "Alpha"])).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.tag_count(), 2);
        assert_eq!(store.calls().tag_inserts, 1);

        let again = sync.ensure_tags(&set(&["Creators", "Alpha"])).unwrap();
        assert_eq!(again, ids);
        assert_eq!(store.calls().tag_inserts, 1);
    }

    #[test]
    fn ensure_tags_recovers_from_concurrent_creation() {
        let store = MemoryStore::new();
        store.race_tag("Alpha");

        let ids = TagSynchronizer::new(&store)
            .ensure_tags(&set(&["Alpha"]))
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.tag_count(), 1);
        assert_eq!(store.calls().tag_lookups, 2);
    }

    #[test]
    fn matching_sets_issue_no_writes() {
        let store = MemoryStore::new();
        let entity = store.seed_entity("A", "UCaaaaaaaaaaaaaaaaaaaaaa", "A", "");
        store.seed_tags(&entity, &["Alpha", "Creators"]);

        let result = TagSynchronizer::new(&store)
            .replace_associations(&entity, &set(&["Creators", "Alpha"]))
            .unwrap();
        assert_eq!(result, TagSyncResult::Unchanged);
        assert_eq!(store.calls().writes(), 0);
    }

    #[test]
    fn extraneous_tags_are_removed() {
        let store = MemoryStore::new();
        let entity = store.seed_entity("A", "UCaaaaaaaaaaaaaaaaaaaaaa", "A", "");
        store.seed_tags(&entity, &["Creators", "Legacy", "Old"]);

        let desired = set(&["Creators", "Alpha", "2023"]);
        let result = TagSynchronizer::new(&store)
            .replace_associations(&entity, &desired)
            .unwrap();
        assert_eq!(result, TagSyncResult::Replaced { linked: 3 });
        assert_eq!(store.tags_of(&entity), desired);
    }

    #[test]
    fn failed_clear_is_a_tag_sync_error() {
        let store = MemoryStore::new();
        let entity = store.seed_entity("A", "UCaaaaaaaaaaaaaaaaaaaaaa", "A", "");
        store.seed_tags(&entity, &["Old"]);
        store.fail(StoreOp::DeleteAssociations);

        let err = TagSynchronizer::new(&store)
            .replace_associations(&entity, &set(&["New"]))
            .unwrap_err();
        assert!(matches!(err, SyncError::TagSync(TagSyncError::Clear(_))));
    }

    #[test]
    fn failed_current_read_is_a_store_read_error() {
        let store = MemoryStore::new();
        let entity = store.seed_entity("A", "UCaaaaaaaaaaaaaaaaaaaaaa", "A", "");
        store.fail(StoreOp::TagNames);

        let err = TagSynchronizer::new(&store)
            .replace_associations(&entity, &set(&["New"]))
            .unwrap_err();
        assert!(matches!(err, SyncError::StoreRead(_)));
    }
}
