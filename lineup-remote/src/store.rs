//! Entity and tag tables over PostgREST.
//!
//! ```text
//! creators     (id, name, channel_id UNIQUE, channel_title, avatar_path)
//! tags         (id, name UNIQUE)
//! creator_tags (creator_id, tag_id)
//! ```
//!
//! Every method is one request and is atomic on its own. A 409 answer to an
//! insert is the unique constraint firing and maps to `StoreError::Conflict`.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use lineup_core::{EntityId, RemoteEntity, Tag, TagId};
use lineup_sync::{EntityPatch, EntityStore, NewEntity, StoreError, TagStore};

use crate::http::{error_message, read_json, trim_base, Failure};

const CREATORS: &str = "creators";
const TAGS: &str = "tags";
const CREATOR_TAGS: &str = "creator_tags";
const CREATOR_COLUMNS: &str = "id,name,channel_id,channel_title,avatar_path";

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

/// Primary keys may be serial integers or uuids depending on the schema.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Text(String),
    Number(i64),
}

impl RowId {
    fn into_string(self) -> String {
        match self {
            RowId::Text(s) => s,
            RowId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatorRow {
    id: RowId,
    name: String,
    channel_id: String,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    avatar_path: Option<String>,
}

impl From<CreatorRow> for RemoteEntity {
    fn from(row: CreatorRow) -> Self {
        RemoteEntity {
            id: EntityId::from(row.id.into_string()),
            display_name: row.name,
            external_id: row.channel_id,
            external_title: row.channel_title.unwrap_or_default(),
            asset_path: row.avatar_path.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatorInsert<'a> {
    name: &'a str,
    channel_id: &'a str,
    channel_title: &'a str,
    avatar_path: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatorUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_path: Option<&'a str>,
}

impl<'a> From<&'a EntityPatch> for CreatorUpdate<'a> {
    fn from(patch: &'a EntityPatch) -> Self {
        CreatorUpdate {
            name: patch.display_name.as_deref(),
            channel_title: patch.external_title.as_deref(),
            avatar_path: patch.asset_path.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagRow {
    id: RowId,
    name: String,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: TagId::from(row.id.into_string()),
            name: row.name,
        }
    }
}

/// `creator_tags?select=tags(name)` embeds the joined tag row.
#[derive(Debug, Deserialize)]
struct LinkedTag {
    tags: Option<TagName>,
}

#[derive(Debug, Deserialize)]
struct TagName {
    name: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// PostgREST client for the creators schema.
#[derive(Clone)]
pub struct SupabaseStore {
    agent: ureq::Agent,
    base_url: String,
    key: String,
}

impl SupabaseStore {
    pub fn new(agent: ureq::Agent, base_url: &str, key: &str) -> Self {
        Self {
            agent,
            base_url: trim_base(base_url),
            key: key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, table: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}/rest/v1/{table}", self.base_url))
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
            .set("Accept", "application/json")
    }

    fn call(&self, request: ureq::Request) -> Result<ureq::Response, StoreError> {
        request
            .call()
            .map_err(|e| store_error(Failure::from(e)))
    }

    fn send(&self, request: ureq::Request, body: impl Serialize) -> Result<ureq::Response, StoreError> {
        request
            .send_json(body)
            .map_err(|e| store_error(Failure::from(e)))
    }

    fn rows<T: DeserializeOwned>(response: ureq::Response) -> Result<Vec<T>, StoreError> {
        read_json(response).map_err(StoreError::Decode)
    }

    fn first<T: DeserializeOwned>(response: ureq::Response) -> Result<T, StoreError> {
        Self::rows(response)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))
    }
}

/// Map a failed call onto the store's error kinds.
pub(crate) fn store_error(failure: Failure) -> StoreError {
    match failure {
        Failure::Status { status: 409, body } => StoreError::Conflict(error_message(&body)),
        Failure::Status { status, body } => StoreError::Rejected {
            status,
            message: error_message(&body),
        },
        Failure::Transport(reason) => StoreError::Unavailable(reason),
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

impl EntityStore for SupabaseStore {
    fn find_entity_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<RemoteEntity>, StoreError> {
        let response = self.call(
            self.request("GET", CREATORS)
                .query("select", CREATOR_COLUMNS)
                .query("channel_id", &eq(external_id))
                .query("limit", "1"),
        )?;
        let rows: Vec<CreatorRow> = Self::rows(response)?;
        Ok(rows.into_iter().next().map(RemoteEntity::from))
    }

    fn insert_entity(&self, entity: &NewEntity) -> Result<RemoteEntity, StoreError> {
        let body = CreatorInsert {
            name: &entity.display_name,
            channel_id: &entity.external_id,
            channel_title: &entity.external_title,
            avatar_path: &entity.asset_path,
        };
        let response = self.send(
            self.request("POST", CREATORS)
                .query("select", CREATOR_COLUMNS)
                .set("Prefer", "return=representation"),
            body,
        )?;
        Self::first::<CreatorRow>(response).map(RemoteEntity::from)
    }

    fn update_entity(&self, id: &EntityId, patch: &EntityPatch) -> Result<(), StoreError> {
        self.send(
            self.request("PATCH", CREATORS)
                .query("id", &eq(&id.0))
                .set("Prefer", "return=minimal"),
            CreatorUpdate::from(patch),
        )?;
        Ok(())
    }

    fn delete_entity(&self, id: &EntityId) -> Result<(), StoreError> {
        self.call(self.request("DELETE", CREATORS).query("id", &eq(&id.0)))?;
        Ok(())
    }
}

impl TagStore for SupabaseStore {
    fn tag_names_for(&self, entity: &EntityId) -> Result<BTreeSet<String>, StoreError> {
        let response = self.call(
            self.request("GET", CREATOR_TAGS)
                .query("select", "tags(name)")
                .query("creator_id", &eq(&entity.0)),
        )?;
        let rows: Vec<LinkedTag> = Self::rows(response)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.tags.map(|t| t.name))
            .collect())
    }

    fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let response = self.call(
            self.request("GET", TAGS)
                .query("select", "id,name")
                .query("name", &eq(name))
                .query("limit", "1"),
        )?;
        let rows: Vec<TagRow> = Self::rows(response)?;
        Ok(rows.into_iter().next().map(Tag::from))
    }

    fn insert_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let response = self.send(
            self.request("POST", TAGS)
                .query("select", "id,name")
                .set("Prefer", "return=representation"),
            json!({ "name": name }),
        )?;
        Self::first::<TagRow>(response).map(Tag::from)
    }

    fn delete_associations(&self, entity: &EntityId) -> Result<(), StoreError> {
        self.call(
            self.request("DELETE", CREATOR_TAGS)
                .query("creator_id", &eq(&entity.0)),
        )?;
        Ok(())
    }

    fn insert_associations(&self, entity: &EntityId, tags: &[TagId]) -> Result<(), StoreError> {
        if tags.is_empty() {
            return Ok(());
        }
        let rows: Vec<serde_json::Value> = tags
            .iter()
            .map(|tag| json!({ "creator_id": entity.0, "tag_id": tag.0 }))
            .collect();
        self.send(
            self.request("POST", CREATOR_TAGS)
                .set("Prefer", "return=minimal"),
            rows,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_status_maps_to_conflict() {
        let err = store_error(Failure::Status {
            status: 409,
            body: r#"{"code":"23505","message":"duplicate key value"}"#.into(),
        });
        assert_eq!(err, StoreError::Conflict("duplicate key value".into()));
    }

    #[test]
    fn other_statuses_are_rejections() {
        let err = store_error(Failure::Status {
            status: 401,
            body: r#"{"message":"JWT expired"}"#.into(),
        });
        assert_eq!(
            err,
            StoreError::Rejected {
                status: 401,
                message: "JWT expired".into()
            }
        );
    }

    #[test]
    fn transport_failures_mean_unavailable() {
        let err = store_error(Failure::Transport("timed out reading response".into()));
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn creator_row_accepts_numeric_ids_and_null_columns() {
        let rows: Vec<CreatorRow> = serde_json::from_str(
            r#"[{"id":42,"name":"Jane","channel_id":"UCxxxxxxxxxxxxxxxxxxxxxx","channel_title":null,"avatar_path":null}]"#,
        )
        .unwrap();
        let entity = RemoteEntity::from(rows.into_iter().next().unwrap());
        assert_eq!(entity.id, EntityId::from("42"));
        assert_eq!(entity.external_title, "");
        assert_eq!(entity.asset_path, "");
    }

    #[test]
    fn update_body_carries_only_changed_columns() {
        let patch = EntityPatch {
            display_name: Some("Jane".into()),
            ..EntityPatch::default()
        };
        assert_eq!(json!(CreatorUpdate::from(&patch)), json!({ "name": "Jane" }));
    }

    #[test]
    fn embedded_tag_names_skip_dangling_links() {
        let rows: Vec<LinkedTag> =
            serde_json::from_str(r#"[{"tags":{"name":"Alpha"}},{"tags":null}]"#).unwrap();
        let names: Vec<_> = rows.into_iter().filter_map(|r| r.tags.map(|t| t.name)).collect();
        assert_eq!(names, vec!["Alpha"]);
    }
}
