pub mod catalog;
pub mod config;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use lineup_core::{catalog as catalog_files, config as config_file, Catalog, Settings};

/// Catalog location, shared by every command that reads it.
#[derive(Args, Debug, Default, Clone)]
pub struct CatalogArgs {
    /// Catalog root directory (defaults to `catalog_dir` from config.yaml).
    #[arg(long, value_name = "DIR", env = "LINEUP_CATALOG")]
    pub catalog: Option<PathBuf>,
}

impl CatalogArgs {
    pub fn load(&self, settings: &Settings) -> Result<Catalog> {
        let root = self.root(settings);
        catalog_files::load_at(&root)
            .with_context(|| format!("failed to load catalog from {}", root.display()))
    }

    pub fn root(&self, settings: &Settings) -> PathBuf {
        self.catalog
            .clone()
            .unwrap_or_else(|| settings.catalog_dir.clone())
    }
}

/// Credentials and targets layered over config.yaml. Each one falls back to
/// its environment variable.
#[derive(Args, Debug, Default, Clone)]
pub struct RemoteArgs {
    /// Base URL of the remote store.
    #[arg(long, env = "LINEUP_STORE_URL")]
    pub store_url: Option<String>,

    /// Service key for the remote store.
    #[arg(long, env = "LINEUP_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Storage bucket for avatars.
    #[arg(long, env = "LINEUP_BUCKET")]
    pub bucket: Option<String>,

    /// YouTube Data API key.
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,
}

impl RemoteArgs {
    /// Overwrite settings with whatever was given on the command line or in
    /// the environment.
    pub fn apply(self, settings: &mut Settings) {
        if self.store_url.is_some() {
            settings.store_url = self.store_url;
        }
        if self.store_key.is_some() {
            settings.store_key = self.store_key;
        }
        if let Some(bucket) = self.bucket {
            settings.bucket = bucket;
        }
        if self.youtube_api_key.is_some() {
            settings.youtube_api_key = self.youtube_api_key;
        }
    }
}

/// Settings from `~/.lineup/config.yaml`, or defaults when absent.
pub fn load_settings() -> Result<Settings> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    config_file::load_at(&home).with_context(|| {
        format!(
            "failed to read {}",
            config_file::config_path_at(&home).display()
        )
    })
}
