//! Reconciliation Engine — per-record state machine.
//!
//! ```text
//! Start ─ no external id ─────────────────────────────────────▶ Skipped
//!   │
//!   ├─ resolve metadata ── not found / error ─────────────────▶ Failed
//!   │
//!   ├─ probe by canonical id
//!   │     ├─ Existing ─ diff fields ─ tags ───────────────────▶ Updated | Unchanged
//!   │     └─ Absent ─ download ─ insert ─ upload ─ patch ─ tags ▶ Created
//!   │                              │        └ fail: delete row ▶ Failed
//!   │                              └ unique conflict ─────────▶ Existing
//! ```
//!
//! The outcome is derived from the path taken; nothing is re-queried after
//! the fact to classify it. The only rollback is deleting a freshly inserted
//! row whose avatar upload failed.

use lineup_core::{CanonicalRecord, EntityId, RemoteEntity};
use serde::Serialize;

use crate::error::{StoreError, SyncError};
use crate::ports::{ChannelMetadata, Clock, EntityPatch, MetadataSource, NewEntity, ObjectStorage, RemoteStore};
use crate::reader::RemoteStateReader;
use crate::tags::TagSynchronizer;

/// An entity field the engine may update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DisplayName,
    ExternalTitle,
    /// Repaired avatar of an entity left without one by an interrupted run.
    AssetPath,
}

/// Result of reconciling one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Created {
        entity: EntityId,
    },
    Updated {
        entity: EntityId,
        fields: Vec<Field>,
        tags_replaced: bool,
    },
    /// Entity exists and already matched the record.
    Unchanged {
        entity: EntityId,
    },
    /// Record has no external id.
    Skipped,
    Failed(SyncError),
}

impl RecordOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RecordOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Created { .. } => "created",
            RecordOutcome::Updated { .. } => "updated",
            RecordOutcome::Unchanged { .. } => "unchanged",
            RecordOutcome::Skipped => "skipped",
            RecordOutcome::Failed(_) => "failed",
        }
    }

    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            RecordOutcome::Created { entity }
            | RecordOutcome::Updated { entity, .. }
            | RecordOutcome::Unchanged { entity } => Some(entity),
            RecordOutcome::Skipped | RecordOutcome::Failed(_) => None,
        }
    }
}

/// Anything that can turn a record into an outcome. The sequencer drives
/// records through this seam.
pub trait Reconcile {
    fn reconcile(&self, record: &CanonicalRecord) -> RecordOutcome;
}

/// Storage key of an avatar: `{entity_id}/avatar/{creation_timestamp}`.
pub fn avatar_path(entity: &EntityId, created_at_millis: i64) -> String {
    format!("{entity}/avatar/{created_at_millis}")
}

/// The engine, wired to its capabilities.
pub struct Reconciler<'a> {
    store: &'a dyn RemoteStore,
    storage: &'a dyn ObjectStorage,
    metadata: &'a dyn MetadataSource,
    clock: &'a dyn Clock,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        storage: &'a dyn ObjectStorage,
        metadata: &'a dyn MetadataSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            storage,
            metadata,
            clock,
        }
    }

    fn run(&self, record: &CanonicalRecord) -> Result<RecordOutcome, SyncError> {
        let external_id = match record.parsed_external_id() {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(RecordOutcome::Skipped),
            Err(e) => return Err(SyncError::Resolution(e.into())),
        };

        let meta = self
            .metadata
            .resolve(&external_id)
            .map_err(SyncError::Resolution)?;
        if external_id.is_handle() {
            tracing::debug!(handle = %external_id, channel = %meta.canonical_id, "resolved handle");
        }

        let reader = RemoteStateReader::new(self.store);
        match reader.lookup_by_external_id(&meta.canonical_id)? {
            Some(entity) => self.converge_existing(record, &meta, entity),
            None => self.create(record, &meta),
        }
    }

    fn converge_existing(
        &self,
        record: &CanonicalRecord,
        meta: &ChannelMetadata,
        entity: RemoteEntity,
    ) -> Result<RecordOutcome, SyncError> {
        let mut patch = EntityPatch::default();
        let mut fields = Vec::new();
        if entity.display_name != record.display_name {
            patch.display_name = Some(record.display_name.clone());
            fields.push(Field::DisplayName);
        }
        if entity.external_title != meta.title {
            patch.external_title = Some(meta.title.clone());
            fields.push(Field::ExternalTitle);
        }
        if entity.asset_path.is_empty() {
            patch.asset_path = Some(self.store_avatar(&entity.id, meta)?);
            fields.push(Field::AssetPath);
        }

        if !patch.is_empty() {
            self.store
                .update_entity(&entity.id, &patch)
                .map_err(SyncError::StoreWrite)?;
            tracing::info!(entity = %entity.id, ?fields, "updated entity");
        }

        let tags = TagSynchronizer::new(self.store)
            .replace_associations(&entity.id, &record.desired_tags())?;

        if fields.is_empty() && !tags.changed() {
            tracing::debug!(entity = %entity.id, "entity already converged");
            return Ok(RecordOutcome::Unchanged { entity: entity.id });
        }
        Ok(RecordOutcome::Updated {
            entity: entity.id,
            fields,
            tags_replaced: tags.changed(),
        })
    }

    fn create(
        &self,
        record: &CanonicalRecord,
        meta: &ChannelMetadata,
    ) -> Result<RecordOutcome, SyncError> {
        // Nothing has been written yet, so a failed download needs no cleanup.
        let asset = self
            .metadata
            .download_asset(&meta.avatar_url)
            .map_err(SyncError::AssetDownload)?;

        let new = NewEntity {
            display_name: record.display_name.clone(),
            external_id: meta.canonical_id.clone(),
            external_title: meta.title.clone(),
            asset_path: String::new(),
        };
        let entity = match self.store.insert_entity(&new) {
            Ok(entity) => entity,
            Err(StoreError::Conflict(reason)) => {
                // Another writer inserted this channel after our probe.
                tracing::warn!(channel = %meta.canonical_id, %reason, "insert lost a race, converging existing entity");
                let existing = RemoteStateReader::new(self.store)
                    .lookup_by_external_id(&meta.canonical_id)?
                    .ok_or(SyncError::StoreWrite(StoreError::Conflict(reason)))?;
                return self.converge_existing(record, meta, existing);
            }
            Err(e) => return Err(SyncError::StoreWrite(e)),
        };
        tracing::info!(entity = %entity.id, channel = %meta.canonical_id, "inserted entity");

        let path = avatar_path(&entity.id, self.clock.now_millis());
        let stored = match self.storage.upload(&path, &asset.bytes, &asset.content_type) {
            Ok(stored) => stored,
            Err(source) => {
                let rolled_back = self.compensate(&entity.id);
                return Err(SyncError::AssetUpload {
                    source,
                    rolled_back,
                });
            }
        };

        // From here on the row is valid; failures are reported, not undone.
        self.store
            .update_entity(&entity.id, &EntityPatch::asset_path(stored))
            .map_err(SyncError::StoreWrite)?;
        TagSynchronizer::new(self.store)
            .replace_associations(&entity.id, &record.desired_tags())?;

        Ok(RecordOutcome::Created { entity: entity.id })
    }

    /// Upload a fresh avatar for an existing entity that has none.
    fn store_avatar(&self, entity: &EntityId, meta: &ChannelMetadata) -> Result<String, SyncError> {
        let asset = self
            .metadata
            .download_asset(&meta.avatar_url)
            .map_err(SyncError::AssetDownload)?;
        let path = avatar_path(entity, self.clock.now_millis());
        self.storage
            .upload(&path, &asset.bytes, &asset.content_type)
            .map_err(SyncError::AssetRepair)
    }

    fn compensate(&self, entity: &EntityId) -> bool {
        match self.store.delete_entity(entity) {
            Ok(()) => {
                tracing::warn!(entity = %entity, "avatar upload failed, deleted inserted entity");
                true
            }
            Err(e) => {
                tracing::error!(entity = %entity, error = %e, "avatar upload failed and rollback failed");
                false
            }
        }
    }
}

impl Reconcile for Reconciler<'_> {
    fn reconcile(&self, record: &CanonicalRecord) -> RecordOutcome {
        match self.run(record) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    record = %record.display_name,
                    external_id = %record.external_id,
                    kind = error.kind(),
                    %error,
                    "record failed"
                );
                RecordOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FixedClock, MemoryMetadata, MemoryStorage, MemoryStore};

    #[test]
    fn avatar_path_layout() {
        assert_eq!(
            avatar_path(&EntityId::from("entity-7"), 1_700_000_000_000),
            "entity-7/avatar/1700000000000"
        );
    }

    #[test]
    fn invalid_authored_id_fails_resolution_without_calls() {
        let store = MemoryStore::new();
        let storage = MemoryStorage::new();
        let metadata = MemoryMetadata::new();
        let clock = FixedClock(0);
        let engine = Reconciler::new(&store, &storage, &metadata, &clock);

        let record = CanonicalRecord {
            category: "Creators".into(),
            group: "Alpha".into(),
            display_name: "Broken".into(),
            external_id: "not-an-id".into(),
            option_tags: Default::default(),
        };
        let outcome = engine.reconcile(&record);
        assert!(matches!(outcome, RecordOutcome::Failed(SyncError::Resolution(_))));
        assert_eq!(metadata.resolves(), 0);
        assert_eq!(store.calls().entity_lookups, 0);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(RecordOutcome::Skipped.label(), "skipped");
        assert!(RecordOutcome::Failed(SyncError::StoreRead(StoreError::Unavailable("x".into())))
            .is_failure());
    }
}
