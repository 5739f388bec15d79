//! Error types for lineup-sync.
//!
//! The backend errors ([`StoreError`], [`StorageError`], [`ResolveError`],
//! [`DownloadError`]) are what capability implementations return. The engine
//! folds them into a [`SyncError`], which names the step of the record's state
//! machine that failed. A `SyncError` never aborts a run; it only marks one
//! record as failed.

use thiserror::Error;

use lineup_core::InvalidExternalId;

/// Failure of a remote store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// The store answered with an error status.
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected store response: {0}")]
    Decode(String),
}

/// Failure of an object storage upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Write-once storage refused to overwrite an existing object.
    #[error("object already exists at {0}")]
    AlreadyExists(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Failure to resolve an external id into channel metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no channel found for {0}")]
    NotFound(String),

    /// The metadata API quota is exhausted.
    #[error("metadata API rate limit reached")]
    RateLimited,

    /// The channel exists but exposes no usable avatar.
    #[error("channel {0} has no thumbnail in any quality tier")]
    NoThumbnail(String),

    #[error(transparent)]
    InvalidId(#[from] InvalidExternalId),

    #[error("metadata request failed: {0}")]
    Transport(String),

    #[error("unexpected metadata response: {0}")]
    Decode(String),
}

/// Failure to download avatar bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("asset download failed with status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("asset download failed: {0}")]
    Transport(String),

    #[error("asset at {0} is empty")]
    Empty(String),

    #[error("asset at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
}

/// Failure while converging an entity's tag associations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagSyncError {
    #[error("failed to get or create tag '{name}': {source}")]
    EnsureTag {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Associations may now be empty; the next run repairs them.
    #[error("failed to clear tag associations: {0}")]
    Clear(#[source] StoreError),

    #[error("failed to link tags: {0}")]
    Link(#[source] StoreError),
}

/// Why a single record failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("resolution failed: {0}")]
    Resolution(#[source] ResolveError),

    #[error("store read failed: {0}")]
    StoreRead(#[source] StoreError),

    #[error("store write failed: {0}")]
    StoreWrite(#[source] StoreError),

    #[error("avatar download failed: {0}")]
    AssetDownload(#[source] DownloadError),

    /// The entity row inserted before the upload was deleted again when
    /// `rolled_back` is true.
    #[error("avatar upload failed ({}): {source}", rollback_note(.rolled_back))]
    AssetUpload {
        #[source]
        source: StorageError,
        rolled_back: bool,
    },

    /// Uploading a replacement avatar for an existing entity failed. Nothing
    /// was inserted, so nothing is rolled back; the entity keeps its empty
    /// avatar path until the next run.
    #[error("avatar repair upload failed: {0}")]
    AssetRepair(#[source] StorageError),

    #[error("tag sync failed: {0}")]
    TagSync(#[from] TagSyncError),
}

fn rollback_note(rolled_back: &bool) -> &'static str {
    if *rolled_back {
        "entity rolled back"
    } else {
        "rollback failed, entity left without avatar"
    }
}

impl SyncError {
    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Resolution(_) => "resolution",
            SyncError::StoreRead(_) => "store_read",
            SyncError::StoreWrite(_) => "store_write",
            SyncError::AssetDownload(_) => "asset_download",
            SyncError::AssetUpload { .. } | SyncError::AssetRepair(_) => "asset_upload",
            SyncError::TagSync(_) => "tag_sync",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_mentions_rollback_state() {
        let err = SyncError::AssetUpload {
            source: StorageError::Unavailable("timeout".into()),
            rolled_back: true,
        };
        assert!(err.to_string().contains("entity rolled back"));

        let err = SyncError::AssetUpload {
            source: StorageError::Unavailable("timeout".into()),
            rolled_back: false,
        };
        assert!(err.to_string().contains("rollback failed"));
    }

    #[test]
    fn repair_upload_error_does_not_mention_rollback() {
        let err = SyncError::AssetRepair(StorageError::Unavailable("timeout".into()));
        assert_eq!(err.to_string(), "avatar repair upload failed: storage unavailable: timeout");
        assert_eq!(err.kind(), "asset_upload");
    }

    #[test]
    fn kind_names_are_stable() {
        let err = SyncError::from(TagSyncError::Clear(StoreError::Unavailable("x".into())));
        assert_eq!(err.kind(), "tag_sync");
    }
}
