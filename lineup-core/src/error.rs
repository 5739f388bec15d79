//! Error types for lineup-core.

use std::path::PathBuf;

use thiserror::Error;

/// A string that is neither a stable channel id nor a handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid external id '{0}': expected a UC… channel id or an @handle")]
pub struct InvalidExternalId(pub String);

/// All errors that can arise while loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying I/O failure, with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error — includes file path and line context from serde_json.
    #[error("failed to parse catalog file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but violates the catalog schema.
    #[error("invalid catalog file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    /// The catalog root directory does not exist.
    #[error("catalog not found at {path}")]
    RootNotFound { path: PathBuf },
}

/// Errors from reading `config.yaml` or resolving required settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting was not provided by the file, flags or environment.
    #[error("missing setting `{0}`; set it in config.yaml or via its environment variable")]
    Missing(&'static str),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CatalogError {
    CatalogError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> CatalogError {
    CatalogError::Invalid {
        path: path.into(),
        reason: reason.into(),
    }
}
