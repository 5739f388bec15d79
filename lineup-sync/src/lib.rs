//! # lineup-sync
//!
//! Reconciles catalog records against the remote store.
//!
//! Build a [`Reconciler`] from the four capabilities in [`ports`], then hand
//! it to a [`Sequencer`] together with a loaded catalog. The returned
//! [`RunReport`] carries per-record outcomes, per-group and overall counts and
//! the process exit code.

pub mod engine;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod ports;
pub mod reader;
pub mod report;
pub mod sequencer;
pub mod tags;

pub use engine::{avatar_path, Field, Reconcile, RecordOutcome, Reconciler};
pub use error::{
    DownloadError, ResolveError, StorageError, StoreError, SyncError, TagSyncError,
};
pub use ports::{
    Asset, ChannelMetadata, Clock, EntityPatch, EntityStore, MetadataSource, NewEntity,
    ObjectStorage, RemoteStore, SystemClock, TagStore,
};
pub use report::{GroupReport, RecordReport, RunReport, SyncSummary, EXIT_INTERRUPTED};
pub use sequencer::{Pacer, Sequencer, ThreadPacer, DEFAULT_DELAY};
pub use tags::{TagSyncResult, TagSynchronizer};
