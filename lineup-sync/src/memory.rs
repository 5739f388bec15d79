//! In-memory backends for every capability in [`crate::ports`].
//!
//! They honour the same contracts as the HTTP backends (unique external ids,
//! unique tag names, write-once storage) and additionally count calls, inject
//! failures and simulate a concurrent writer, which is what the engine tests
//! need. Single-threaded by construction.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;

use lineup_core::{EntityId, ExternalId, RemoteEntity, Tag, TagId};

use crate::error::{DownloadError, ResolveError, StorageError, StoreError};
use crate::ports::{
    Asset, ChannelMetadata, Clock, EntityPatch, EntityStore, MetadataSource, NewEntity,
    ObjectStorage, TagStore,
};
use crate::sequencer::Pacer;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindEntity,
    InsertEntity,
    UpdateEntity,
    DeleteEntity,
    TagNames,
    FindTag,
    InsertTag,
    DeleteAssociations,
    InsertAssociations,
}

/// Number of calls received per operation, failed calls included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub entity_lookups: usize,
    pub entity_inserts: usize,
    pub entity_updates: usize,
    pub entity_deletes: usize,
    pub tag_reads: usize,
    pub tag_lookups: usize,
    pub tag_inserts: usize,
    pub association_deletes: usize,
    pub association_inserts: usize,
}

impl CallCounts {
    /// Every insert, update or delete issued.
    pub fn writes(&self) -> usize {
        self.entity_inserts
            + self.entity_updates
            + self.entity_deletes
            + self.tag_inserts
            + self.association_deletes
            + self.association_inserts
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entities: BTreeMap<EntityId, RemoteEntity>,
    tags: BTreeMap<String, Tag>,
    links: BTreeSet<(EntityId, TagId)>,
    next_id: u64,
    calls: CallCounts,
    failing: HashSet<StoreOp>,
    rival_entity: Option<NewEntity>,
    rival_tags: BTreeSet<String>,
    patches: Vec<(EntityId, EntityPatch)>,
}

impl StoreState {
    fn next_key(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        if self.failing.contains(&op) {
            return Err(StoreError::Unavailable(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn insert_row(&mut self, entity: &NewEntity) -> Result<RemoteEntity, StoreError> {
        if self
            .entities
            .values()
            .any(|e| e.external_id == entity.external_id)
        {
            return Err(StoreError::Conflict(format!(
                "external_id {} already exists",
                entity.external_id
            )));
        }
        let id = EntityId::from(self.next_key("entity"));
        let row = RemoteEntity {
            id: id.clone(),
            display_name: entity.display_name.clone(),
            external_id: entity.external_id.clone(),
            external_title: entity.external_title.clone(),
            asset_path: entity.asset_path.clone(),
        };
        self.entities.insert(id, row.clone());
        Ok(row)
    }

    fn tag_row(&mut self, name: &str) -> Tag {
        if let Some(tag) = self.tags.get(name) {
            return tag.clone();
        }
        let tag = Tag {
            id: TagId::from(self.next_key("tag")),
            name: name.to_string(),
        };
        self.tags.insert(name.to_string(), tag.clone());
        tag
    }
}

/// Relational store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity directly, bypassing call counting.
    pub fn seed_entity(
        &self,
        display_name: &str,
        external_id: &str,
        external_title: &str,
        asset_path: &str,
    ) -> EntityId {
        let mut state = self.state.borrow_mut();
        let row = state
            .insert_row(&NewEntity {
                display_name: display_name.to_string(),
                external_id: external_id.to_string(),
                external_title: external_title.to_string(),
                asset_path: asset_path.to_string(),
            })
            .unwrap_or_else(|e| panic!("seed_entity: {e}"));
        row.id
    }

    /// Associate `names` with `entity`, creating tags as needed.
    pub fn seed_tags(&self, entity: &EntityId, names: &[&str]) {
        let mut state = self.state.borrow_mut();
        for name in names {
            let tag = state.tag_row(name);
            state.links.insert((entity.clone(), tag.id));
        }
    }

    /// Make every call to `op` fail until [`MemoryStore::recover`].
    pub fn fail(&self, op: StoreOp) {
        self.state.borrow_mut().failing.insert(op);
    }

    pub fn recover(&self, op: StoreOp) {
        self.state.borrow_mut().failing.remove(&op);
    }

    /// Simulate another writer committing `rival` just before the next
    /// `insert_entity` call lands.
    pub fn race_next_insert(&self, rival: NewEntity) {
        self.state.borrow_mut().rival_entity = Some(rival);
    }

    /// Simulate another writer creating tag `name` just before this store's
    /// next attempt to insert it.
    pub fn race_tag(&self, name: &str) {
        self.state.borrow_mut().rival_tags.insert(name.to_string());
    }

    pub fn calls(&self) -> CallCounts {
        self.state.borrow().calls
    }

    pub fn reset_calls(&self) {
        self.state.borrow_mut().calls = CallCounts::default();
    }

    /// Every patch applied through `update_entity`, in order.
    pub fn patches(&self) -> Vec<(EntityId, EntityPatch)> {
        self.state.borrow().patches.clone()
    }

    pub fn entity_count(&self) -> usize {
        self.state.borrow().entities.len()
    }

    pub fn entities_with_external_id(&self, external_id: &str) -> Vec<RemoteEntity> {
        self.state
            .borrow()
            .entities
            .values()
            .filter(|e| e.external_id == external_id)
            .cloned()
            .collect()
    }

    pub fn entity(&self, id: &EntityId) -> Option<RemoteEntity> {
        self.state.borrow().entities.get(id).cloned()
    }

    /// Tag names linked to `entity`.
    pub fn tags_of(&self, entity: &EntityId) -> BTreeSet<String> {
        let state = self.state.borrow();
        let names: HashMap<&TagId, &str> = state
            .tags
            .values()
            .map(|t| (&t.id, t.name.as_str()))
            .collect();
        state
            .links
            .iter()
            .filter(|(e, _)| e == entity)
            .filter_map(|(_, t)| names.get(t).map(|n| n.to_string()))
            .collect()
    }

    pub fn tag_count(&self) -> usize {
        self.state.borrow().tags.len()
    }
}

impl EntityStore for MemoryStore {
    fn find_entity_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<RemoteEntity>, StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.entity_lookups += 1;
        state.check(StoreOp::FindEntity)?;
        Ok(state
            .entities
            .values()
            .find(|e| e.external_id == external_id)
            .cloned())
    }

    fn insert_entity(&self, entity: &NewEntity) -> Result<RemoteEntity, StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.entity_inserts += 1;
        state.check(StoreOp::InsertEntity)?;
        if let Some(rival) = state.rival_entity.take() {
            state.insert_row(&rival)?;
        }
        state.insert_row(entity)
    }

    fn update_entity(&self, id: &EntityId, patch: &EntityPatch) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.entity_updates += 1;
        state.check(StoreOp::UpdateEntity)?;
        let row = state
            .entities
            .get_mut(id)
            .ok_or_else(|| StoreError::Rejected {
                status: 404,
                message: format!("no entity {id}"),
            })?;
        if let Some(name) = &patch.display_name {
            row.display_name = name.clone();
        }
        if let Some(title) = &patch.external_title {
            row.external_title = title.clone();
        }
        if let Some(path) = &patch.asset_path {
            row.asset_path = path.clone();
        }
        state.patches.push((id.clone(), patch.clone()));
        Ok(())
    }

    fn delete_entity(&self, id: &EntityId) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.entity_deletes += 1;
        state.check(StoreOp::DeleteEntity)?;
        state.entities.remove(id);
        state.links.retain(|(e, _)| e != id);
        Ok(())
    }
}

impl TagStore for MemoryStore {
    fn tag_names_for(&self, entity: &EntityId) -> Result<BTreeSet<String>, StoreError> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.tag_reads += 1;
            state.check(StoreOp::TagNames)?;
        }
        Ok(self.tags_of(entity))
    }

    fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.tag_lookups += 1;
        state.check(StoreOp::FindTag)?;
        Ok(state.tags.get(name).cloned())
    }

    fn insert_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.tag_inserts += 1;
        state.check(StoreOp::InsertTag)?;
        if state.rival_tags.remove(name) {
            state.tag_row(name);
        }
        if state.tags.contains_key(name) {
            return Err(StoreError::Conflict(format!("tag '{name}' already exists")));
        }
        Ok(state.tag_row(name))
    }

    fn delete_associations(&self, entity: &EntityId) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.association_deletes += 1;
        state.check(StoreOp::DeleteAssociations)?;
        state.links.retain(|(e, _)| e != entity);
        Ok(())
    }

    fn insert_associations(&self, entity: &EntityId, tags: &[TagId]) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.calls.association_inserts += 1;
        state.check(StoreOp::InsertAssociations)?;
        for tag in tags {
            state.links.insert((entity.clone(), tag.clone()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// Write-once object storage held in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RefCell<BTreeMap<String, Asset>>,
    uploads: Cell<usize>,
    failing: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn uploads(&self) -> usize {
        self.uploads.get()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }

    pub fn object(&self, path: &str) -> Option<Asset> {
        self.objects.borrow().get(path).cloned()
    }
}

impl ObjectStorage for MemoryStorage {
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.uploads.set(self.uploads.get() + 1);
        if self.failing.get() {
            return Err(StorageError::Unavailable("injected upload failure".to_string()));
        }
        let mut objects = self.objects.borrow_mut();
        if objects.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        objects.insert(
            path.to_string(),
            Asset {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(path.to_string())
    }
}

// ---------------------------------------------------------------------------
// Metadata source
// ---------------------------------------------------------------------------

/// Scripted metadata API keyed by the authored id.
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    channels: HashMap<String, Result<ChannelMetadata, ResolveError>>,
    assets: HashMap<String, Result<Asset, DownloadError>>,
    resolves: Cell<usize>,
    downloads: Cell<usize>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `authored` (channel id or handle) as resolving to
    /// `canonical_id`, with a downloadable JPEG avatar.
    pub fn with_channel(mut self, authored: &str, canonical_id: &str, title: &str) -> Self {
        let avatar_url = format!("https://img.example/{canonical_id}/s800.jpg");
        self.assets.insert(
            avatar_url.clone(),
            Ok(Asset {
                bytes: canonical_id.as_bytes().to_vec(),
                content_type: "image/jpeg".to_string(),
            }),
        );
        self.channels.insert(
            authored.to_string(),
            Ok(ChannelMetadata {
                canonical_id: canonical_id.to_string(),
                title: title.to_string(),
                avatar_url,
            }),
        );
        self
    }

    /// Make resolving `authored` fail with `error`.
    pub fn with_resolve_error(mut self, authored: &str, error: ResolveError) -> Self {
        self.channels.insert(authored.to_string(), Err(error));
        self
    }

    /// Make downloading the avatar of `canonical_id` fail.
    pub fn with_broken_avatar(mut self, canonical_id: &str) -> Self {
        let url = format!("https://img.example/{canonical_id}/s800.jpg");
        self.assets.insert(
            url.clone(),
            Err(DownloadError::Status { status: 404, url }),
        );
        self
    }

    pub fn resolves(&self) -> usize {
        self.resolves.get()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }
}

impl MetadataSource for MemoryMetadata {
    fn resolve(&self, id: &ExternalId) -> Result<ChannelMetadata, ResolveError> {
        self.resolves.set(self.resolves.get() + 1);
        self.channels
            .get(id.as_str())
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::NotFound(id.to_string())))
    }

    fn download_asset(&self, url: &str) -> Result<Asset, DownloadError> {
        self.downloads.set(self.downloads.get() + 1);
        self.assets
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(DownloadError::Status { status: 404, url: url.to_string() }))
    }
}

// ---------------------------------------------------------------------------
// Clock and pacer
// ---------------------------------------------------------------------------

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Pacer that records requested pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pub pauses: Vec<Duration>,
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}
