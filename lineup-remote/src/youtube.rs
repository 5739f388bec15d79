//! YouTube Data API v3 metadata source.
//!
//! Stable channel ids are looked up with `channels?id=`, handles with
//! `channels?forHandle=`. Either way the `id` of the returned item is the
//! canonical id the store is keyed by.

use std::io::Read;

use serde::Deserialize;

use lineup_core::ExternalId;
use lineup_sync::{Asset, ChannelMetadata, DownloadError, MetadataSource, ResolveError};

use crate::http::{error_message, trim_base, Failure};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Largest avatar we accept.
pub const MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

/// Error reasons that mean "slow down", not "broken request".
const RATE_LIMIT_REASONS: &[&str] = &["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"];

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    /// First present tier, highest resolution first.
    fn best(&self) -> Option<&str> {
        [
            &self.maxres,
            &self.standard,
            &self.high,
            &self.medium,
            &self.default,
        ]
        .into_iter()
        .flatten()
        .map(|t| t.url.as_str())
        .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

// ---------------------------------------------------------------------------
// Pure mapping
// ---------------------------------------------------------------------------

/// Turn a `channels.list` body into metadata for `requested`.
pub(crate) fn parse_channel(requested: &ExternalId, body: &str) -> Result<ChannelMetadata, ResolveError> {
    let list: ChannelList =
        serde_json::from_str(body).map_err(|e| ResolveError::Decode(e.to_string()))?;
    let item = list
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::NotFound(requested.to_string()))?;
    let avatar_url = item
        .snippet
        .thumbnails
        .best()
        .map(str::to_string)
        .ok_or_else(|| ResolveError::NoThumbnail(item.id.clone()))?;

    Ok(ChannelMetadata {
        canonical_id: item.id,
        title: item.snippet.title,
        avatar_url,
    })
}

/// Map a failed API call onto resolution error kinds.
pub(crate) fn resolve_error(requested: &ExternalId, failure: Failure) -> ResolveError {
    match failure {
        Failure::Transport(reason) => ResolveError::Transport(reason),
        Failure::Status { status: 429, .. } => ResolveError::RateLimited,
        Failure::Status { status: 404, .. } => ResolveError::NotFound(requested.to_string()),
        Failure::Status { status, body } => {
            let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
            let rate_limited = parsed.as_ref().is_some_and(|b| {
                b.error
                    .errors
                    .iter()
                    .any(|d| RATE_LIMIT_REASONS.contains(&d.reason.as_str()))
            });
            if status == 403 && rate_limited {
                return ResolveError::RateLimited;
            }
            let message = parsed
                .map(|b| b.error.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| error_message(&body));
            ResolveError::Transport(format!("HTTP {status}: {message}"))
        }
    }
}

/// Read a whole asset body, failing instead of truncating past `limit`.
pub(crate) fn read_capped(
    reader: impl Read,
    limit: u64,
    url: &str,
) -> Result<Vec<u8>, DownloadError> {
    let mut bytes = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| DownloadError::Transport(e.to_string()))?;
    if bytes.len() as u64 > limit {
        return Err(DownloadError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    if bytes.is_empty() {
        return Err(DownloadError::Empty(url.to_string()));
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct YouTubeClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(agent: ureq::Agent, api_key: &str) -> Self {
        Self {
            agent,
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base(base_url);
        self
    }
}

impl MetadataSource for YouTubeClient {
    fn resolve(&self, id: &ExternalId) -> Result<ChannelMetadata, ResolveError> {
        let lookup = match id {
            ExternalId::Channel(_) => "id",
            ExternalId::Handle(_) => "forHandle",
        };
        let response = self
            .agent
            .get(&format!("{}/channels", self.base_url))
            .query("part", "snippet")
            .query(lookup, id.as_str())
            .query("key", &self.api_key)
            .call()
            .map_err(|e| resolve_error(id, Failure::from(e)))?;

        let body = response
            .into_string()
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        let meta = parse_channel(id, &body)?;
        tracing::debug!(external_id = %id, channel = %meta.canonical_id, title = %meta.title, "resolved channel");
        Ok(meta)
    }

    fn download_asset(&self, url: &str) -> Result<Asset, DownloadError> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => DownloadError::Status {
                status,
                url: url.to_string(),
            },
            ureq::Error::Transport(t) => DownloadError::Transport(t.to_string()),
        })?;

        let content_type = response.content_type().to_string();
        let bytes = read_capped(response.into_reader(), MAX_ASSET_BYTES, url)?;

        Ok(Asset {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn handle() -> ExternalId {
        "@jane".parse().unwrap()
    }

    #[test]
    fn picks_highest_available_tier() {
        let body = r#"{"items":[{"id":"UCjjjjjjjjjjjjjjjjjjjjjj","snippet":{"title":"Jane Plays","thumbnails":{
            "default":{"url":"https://yt3/d.jpg"},
            "high":{"url":"https://yt3/h.jpg"},
            "medium":{"url":"https://yt3/m.jpg"}}}}]}"#;
        let meta = parse_channel(&handle(), body).unwrap();
        assert_eq!(meta.canonical_id, "UCjjjjjjjjjjjjjjjjjjjjjj");
        assert_eq!(meta.title, "Jane Plays");
        assert_eq!(meta.avatar_url, "https://yt3/h.jpg");
    }

    #[test]
    fn empty_item_list_is_not_found() {
        let err = parse_channel(&handle(), r#"{"kind":"youtube#channelListResponse","pageInfo":{"totalResults":0}}"#)
            .unwrap_err();
        assert_eq!(err, ResolveError::NotFound("@jane".into()));
    }

    #[test]
    fn channel_without_thumbnails_is_an_error() {
        let body = r#"{"items":[{"id":"UCjjjjjjjjjjjjjjjjjjjjjj","snippet":{"title":"Jane","thumbnails":{}}}]}"#;
        assert!(matches!(
            parse_channel(&handle(), body),
            Err(ResolveError::NoThumbnail(_))
        ));
    }

    #[rstest]
    #[case::quota(403, r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"quotaExceeded"}]}}"#)]
    #[case::rate(403, r#"{"error":{"code":403,"message":"slow","errors":[{"reason":"rateLimitExceeded"}]}}"#)]
    #[case::too_many(429, "")]
    fn quota_answers_are_rate_limits(#[case] status: u16, #[case] body: &str) {
        let err = resolve_error(&handle(), Failure::Status { status, body: body.into() });
        assert_eq!(err, ResolveError::RateLimited);
    }

    #[rstest]
    #[case::under(9, Ok(9))]
    #[case::at_limit(10, Ok(10))]
    #[case::over(11, Err(DownloadError::TooLarge { url: "u".into(), limit: 10 }))]
    #[case::empty(0, Err(DownloadError::Empty("u".into())))]
    fn asset_body_is_capped_not_truncated(
        #[case] served: usize,
        #[case] expected: Result<usize, DownloadError>,
    ) {
        let body = vec![7u8; served];
        let got = read_capped(body.as_slice(), 10, "u").map(|b| b.len());
        assert_eq!(got, expected);
    }

    #[test]
    fn forbidden_for_other_reasons_is_not_a_rate_limit() {
        let body = r#"{"error":{"code":403,"message":"API key not valid","errors":[{"reason":"forbidden"}]}}"#;
        let err = resolve_error(&handle(), Failure::Status { status: 403, body: body.into() });
        assert_eq!(err, ResolveError::Transport("HTTP 403: API key not valid".into()));
    }
}
