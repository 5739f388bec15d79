//! Write-once avatar bucket.
//!
//! Uploads go to `POST /storage/v1/object/{bucket}/{path}` with
//! `x-upsert: false`, so an existing object is never overwritten.

use lineup_sync::{ObjectStorage, StorageError};

use crate::http::{error_message, trim_base, Failure};

#[derive(Clone)]
pub struct SupabaseStorage {
    agent: ureq::Agent,
    base_url: String,
    key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(agent: ureq::Agent, base_url: &str, key: &str, bucket: &str) -> Self {
        Self {
            agent,
            base_url: trim_base(base_url),
            key: key.to_string(),
            bucket: bucket.trim_matches('/').to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

/// Map a failed upload onto storage error kinds. The storage API reports a
/// duplicate either as a 409 or as a 400 whose body names the duplicate.
pub(crate) fn storage_error(path: &str, failure: Failure) -> StorageError {
    match failure {
        Failure::Status { status, body } if status == 409 || body.contains("Duplicate") => {
            StorageError::AlreadyExists(path.to_string())
        }
        Failure::Status { status, body } => StorageError::Rejected {
            status,
            message: error_message(&body),
        },
        Failure::Transport(reason) => StorageError::Unavailable(reason),
    }
}

impl ObjectStorage for SupabaseStorage {
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.agent
            .post(&self.object_url(path))
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
            .set("Content-Type", content_type)
            .set("x-upsert", "false")
            .send_bytes(bytes)
            .map_err(|e| storage_error(path, Failure::from(e)))?;

        tracing::debug!(bucket = %self.bucket, %path, size = bytes.len(), "uploaded object");
        Ok(path.to_string())
    }
}
