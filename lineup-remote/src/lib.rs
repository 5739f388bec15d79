//! # lineup-remote
//!
//! HTTP implementations of the `lineup-sync` capabilities:
//!
//! - [`SupabaseStore`] — entity and tag tables over PostgREST
//! - [`SupabaseStorage`] — write-once avatar bucket
//! - [`YouTubeClient`] — channel metadata and thumbnail downloads
//!
//! All three share one blocking `ureq` agent whose timeout comes from
//! [`Settings::timeout`]. A timed-out call is an ordinary error for the record
//! that issued it.

mod http;
pub mod storage;
pub mod store;
pub mod youtube;

use std::time::Duration;

use lineup_core::{ConfigError, Settings};

pub use storage::SupabaseStorage;
pub use store::SupabaseStore;
pub use youtube::YouTubeClient;

/// Blocking agent shared by every backend.
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("lineup/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// The three HTTP backends, built from one set of settings.
pub struct Remote {
    pub store: SupabaseStore,
    pub storage: SupabaseStorage,
    pub metadata: YouTubeClient,
}

impl Remote {
    /// Fails with the name of the first missing credential.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let url = settings.require_store_url()?;
        let key = settings.require_store_key()?;
        let api_key = settings.require_youtube_api_key()?;
        let agent = agent(settings.timeout());

        Ok(Self {
            store: SupabaseStore::new(agent.clone(), url, key),
            storage: SupabaseStorage::new(agent.clone(), url, key, &settings.bucket),
            metadata: YouTubeClient::new(agent, api_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            store_url: Some("https://demo.supabase.co/".into()),
            store_key: Some("service-key".into()),
            youtube_api_key: Some("yt-key".into()),
            ..Settings::default()
        }
    }

    #[test]
    fn builds_all_backends_from_complete_settings() {
        let remote = Remote::from_settings(&settings()).unwrap();
        assert_eq!(remote.store.base_url(), "https://demo.supabase.co");
        assert_eq!(remote.storage.bucket(), "avatars");
    }

    #[test]
    fn names_the_missing_credential() {
        let mut s = settings();
        s.youtube_api_key = Some("  ".into());
        let err = Remote::from_settings(&s).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("youtube_api_key")));
    }
}
