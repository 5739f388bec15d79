//! Domain types for the Lineup catalog and the remote store.
//!
//! Catalog-side types are immutable for the duration of a sync run. Remote-side
//! types mirror rows of the remote store and are never cached across calls.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidExternalId;

/// Length of a stable channel id, `UC` prefix included.
pub const CHANNEL_ID_LEN: usize = 24;

const HANDLE_MIN: usize = 3;
const HANDLE_MAX: usize = 30;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Primary key of an entity row in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Primary key of a tag row in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub String);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// External identifiers
// ---------------------------------------------------------------------------

/// An authored reference to an external account.
///
/// `Channel` is the platform's stable identifier and the canonical join key;
/// `Handle` is human-chosen and must be resolved to a `Channel` before it can
/// be matched against the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalId {
    Channel(String),
    Handle(String),
}

impl ExternalId {
    pub fn as_str(&self) -> &str {
        match self {
            ExternalId::Channel(id) => id,
            ExternalId::Handle(handle) => handle,
        }
    }

    pub fn is_handle(&self) -> bool {
        matches!(self, ExternalId::Handle(_))
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExternalId {
    type Err = InvalidExternalId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_channel_id(s) {
            return Ok(ExternalId::Channel(s.to_owned()));
        }
        if is_handle(s) {
            return Ok(ExternalId::Handle(s.to_owned()));
        }
        Err(InvalidExternalId(s.to_owned()))
    }
}

fn is_channel_id(s: &str) -> bool {
    s.len() == CHANNEL_ID_LEN
        && s.starts_with("UC")
        && s[2..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_handle(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('@') else {
        return false;
    };
    (HANDLE_MIN..=HANDLE_MAX).contains(&rest.len())
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

// ---------------------------------------------------------------------------
// Catalog side
// ---------------------------------------------------------------------------

/// A validated, flattened description of one creator to be synchronised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub category: String,
    pub group: String,
    pub display_name: String,
    /// Authored channel id or handle. Empty when the creator has no
    /// linkable account.
    pub external_id: String,
    #[serde(default)]
    pub option_tags: BTreeSet<String>,
}

impl CanonicalRecord {
    /// `None` when the record has no external account and must be skipped.
    pub fn parsed_external_id(&self) -> Result<Option<ExternalId>, InvalidExternalId> {
        let raw = self.external_id.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }

    /// The full tag set an entity for this record must carry.
    ///
    /// Category and group are included when non-empty; option tags follow
    /// verbatim. Ordering and duplicates are irrelevant.
    pub fn desired_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for fixed in [&self.category, &self.group] {
            if !fixed.trim().is_empty() {
                tags.insert(fixed.clone());
            }
        }
        tags.extend(self.option_tags.iter().cloned());
        tags
    }
}

// ---------------------------------------------------------------------------
// Remote side
// ---------------------------------------------------------------------------

/// An entity row as currently committed in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub id: EntityId,
    pub display_name: String,
    /// Canonical channel id, never a handle.
    pub external_id: String,
    pub external_title: String,
    /// Storage path of the avatar; empty until the upload has succeeded.
    pub asset_path: String,
}

/// A named label, unique by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, group: &str, tags: &[&str]) -> CanonicalRecord {
        CanonicalRecord {
            category: category.to_string(),
            group: group.to_string(),
            display_name: "Someone".to_string(),
            external_id: "@someone".to_string(),
            option_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(EntityId::from("e-1").to_string(), "e-1");
        assert_eq!(TagId::from("t-1").to_string(), "t-1");
    }

    #[test]
    fn parses_channel_ids_and_handles() {
        let channel: ExternalId = "UC_x5XG1OV2P6uZZ5FSM9Ttw".parse().unwrap();
        assert_eq!(
            channel,
            ExternalId::Channel("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string())
        );
        let handle: ExternalId = "@google.dev".parse().unwrap();
        assert!(handle.is_handle());
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["UCshort", "google", "@ab", "@has space", "XC_x5XG1OV2P6uZZ5FSM9Ttw"] {
            assert!(raw.parse::<ExternalId>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn empty_external_id_parses_to_none() {
        let mut rec = record("Creators", "Alpha", &[]);
        rec.external_id = "  ".to_string();
        assert_eq!(rec.parsed_external_id().unwrap(), None);
    }

    #[test]
    fn desired_tags_include_category_group_and_options() {
        let rec = record("Creators", "Alpha", &["2023", "Alpha"]);
        let tags: Vec<_> = rec.desired_tags().into_iter().collect();
        assert_eq!(tags, vec!["2023", "Alpha", "Creators"]);
    }

    #[test]
    fn desired_tags_skip_blank_group() {
        let rec = record("Creators", "", &[]);
        assert_eq!(rec.desired_tags().len(), 1);
    }
}
