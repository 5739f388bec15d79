//! On-disk catalog of creators.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   <category>/
//!     <group>.json     (one file per group)
//! ```
//!
//! Each group file names its own `category` and `group`, which must agree with
//! the directory and file stem. Directories and files are visited in sorted
//! order so that a run always processes records in the same sequence.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{invalid, io_err, CatalogError};
use crate::types::{CanonicalRecord, ExternalId};

/// All groups of the catalog, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub groups: Vec<CatalogGroup>,
}

/// One `(category, group)` bucket and its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogGroup {
    pub category: String,
    pub group: String,
    /// File the group was loaded from.
    pub source: PathBuf,
    pub records: Vec<CanonicalRecord>,
}

impl CatalogGroup {
    /// `Category/Group`, used in logs and summaries.
    pub fn label(&self) -> String {
        format!("{}/{}", self.category, self.group)
    }

    /// Records without a linkable account.
    pub fn unlinked_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.external_id.trim().is_empty())
            .count()
    }
}

impl Catalog {
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    /// Keep only groups named `group`.
    pub fn retain_group(&mut self, group: &str) {
        self.groups.retain(|g| g.group == group);
    }
}

// ---------------------------------------------------------------------------
// File schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupFile {
    category: String,
    group: String,
    #[serde(default)]
    creators: Vec<CreatorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreatorEntry {
    name: String,
    channel: String,
    #[serde(default)]
    tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Walk `<root>/*/*.json` and return every group, validated.
///
/// Returns `CatalogError::RootNotFound` if `root` is absent,
/// `CatalogError::Parse` (with path + line context) for malformed JSON and
/// `CatalogError::Invalid` for schema violations.
pub fn load_at(root: &Path) -> Result<Catalog, CatalogError> {
    if !root.is_dir() {
        return Err(CatalogError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut category_dirs: Vec<_> = std::fs::read_dir(root)
        .map_err(|e| io_err(root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    category_dirs.sort_by_key(|e| e.file_name());

    let mut groups = Vec::new();
    for dir in category_dirs {
        let dir_path = dir.path();
        let mut files: Vec<_> = std::fs::read_dir(&dir_path)
            .map_err(|e| io_err(&dir_path, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for file in files {
            groups.push(load_group_at(&file)?);
        }
    }
    Ok(Catalog { groups })
}

/// Load and validate a single `<category>/<group>.json` file.
pub fn load_group_at(path: &Path) -> Result<CatalogGroup, CatalogError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let file: GroupFile = serde_json::from_str(&contents).map_err(|e| CatalogError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let category = required(path, "category", &file.category)?;
    let group = required(path, "group", &file.group)?;

    let expected_group = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if group != expected_group {
        return Err(invalid(
            path,
            format!("group '{group}' does not match file name '{expected_group}'"),
        ));
    }
    let expected_category = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if category != expected_category {
        return Err(invalid(
            path,
            format!("category '{category}' does not match directory '{expected_category}'"),
        ));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(file.creators.len());
    for (index, entry) in file.creators.into_iter().enumerate() {
        let record = validate_entry(path, index, &category, &group, entry)?;
        if !record.external_id.is_empty() && !seen.insert(record.external_id.clone()) {
            return Err(invalid(
                path,
                format!(
                    "creators[{index}]: channel '{}' appears more than once",
                    record.external_id
                ),
            ));
        }
        records.push(record);
    }

    Ok(CatalogGroup {
        category,
        group,
        source: path.to_path_buf(),
        records,
    })
}

fn validate_entry(
    path: &Path,
    index: usize,
    category: &str,
    group: &str,
    entry: CreatorEntry,
) -> Result<CanonicalRecord, CatalogError> {
    let display_name = required(path, &format!("creators[{index}].name"), &entry.name)?;

    let channel = entry.channel.trim();
    if !channel.is_empty() {
        channel
            .parse::<ExternalId>()
            .map_err(|e| invalid(path, format!("creators[{index}]: {e}")))?;
    }

    let mut option_tags = std::collections::BTreeSet::new();
    for tag in entry.tags {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(invalid(path, format!("creators[{index}]: blank tag")));
        }
        option_tags.insert(tag.to_string());
    }

    Ok(CanonicalRecord {
        category: category.to_string(),
        group: group.to_string(),
        display_name,
        external_id: channel.to_string(),
        option_tags,
    })
}

fn required(path: &Path, field: &str, value: &str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(path, format!("`{field}` must not be blank")));
    }
    Ok(trimmed.to_string())
}
