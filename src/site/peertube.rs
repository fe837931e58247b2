//! PeerTube handler.
//!
//! PeerTube instances expose a clean JSON API: one
//! `GET /api/v1/videos/{id}` returns metadata, progressive `files[]`,
//! and HLS `streamingPlaylists[]`. Instances are federated, so the
//! handler matches a configurable host list rather than one domain.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{HandlerError, MatchRule, WebsiteHandler};
use crate::client::RequestOptions;
use crate::fetch::Fetcher;
use crate::manifest::{api, hls, ParseError};
use crate::model::MediaInfo;

/// Instances matched by default.
const DEFAULT_INSTANCES: &[&str] = &[
    "framatube.org",
    "video.blender.org",
    "tilvids.com",
    "peertube.tv",
];

/// Handler for PeerTube instances.
pub struct PeerTubeHandler {
    instances: Vec<String>,
}

impl PeerTubeHandler {
    /// Handler matching the default instance list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instances: DEFAULT_INSTANCES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Handler matching a custom instance list.
    #[must_use]
    pub fn with_instances(instances: Vec<String>) -> Self {
        Self { instances }
    }

    /// Video id from `/w/{id}` or `/videos/watch/{id}` paths.
    fn video_id(uri: &Url) -> Option<String> {
        let segments: Vec<_> = uri.path_segments()?.filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["w", id] => Some((*id).to_string()),
            ["videos", "watch", id] => Some((*id).to_string()),
            _ => None,
        }
    }
}

impl Default for PeerTubeHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebsiteHandler for PeerTubeHandler {
    fn name(&self) -> &'static str {
        "peertube"
    }

    fn match_rule(&self) -> MatchRule {
        let instances = self.instances.clone();
        MatchRule::Custom(std::sync::Arc::new(move |url: &Url| {
            super::host_matches(url, &instances) && Self::video_id(url).is_some()
        }))
    }

    async fn extract(
        &self,
        uri: &Url,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<MediaInfo, HandlerError> {
        let id = Self::video_id(uri).ok_or_else(|| {
            HandlerError::parse("api", ParseError::MissingField { field: "video id" })
        })?;
        let mut api_url = uri.clone();
        api_url.set_path(&format!("/api/v1/videos/{id}"));
        api_url.set_query(None);
        api_url.set_fragment(None);
        let api_url = api_url.to_string();
        debug!(api_url, "fetching peertube video");

        let payload = fetcher
            .fetch(&api_url, &options.fetch_options())
            .await
            .map_err(|e| HandlerError::fetch("api", e))?;
        let value: Value = payload
            .json()
            .map_err(|e| HandlerError::parse("api", e.into()))?;
        let metadata: VideoMetadata = serde_json::from_value(value.clone())
            .map_err(|e| HandlerError::parse("api", e.into()))?;

        let mut builder = MediaInfo::builder()
            .id(id)
            .title(metadata.name.unwrap_or_default())
            .duration(metadata.duration.unwrap_or(0));
        if let Some(description) = metadata.description.filter(|d| !d.is_empty()) {
            builder = builder.description(description);
        }

        // Progressive files, when the instance publishes them.
        let has_files = value
            .get("files")
            .and_then(Value::as_array)
            .is_some_and(|f| !f.is_empty());
        if has_files {
            let parsed = api::parse(&value, &api_url).map_err(|e| HandlerError::parse("api", e))?;
            builder.extend_streams(parsed.streams);
        }

        // HLS playlists are independent of each other, so they are
        // fetched concurrently; any one failing is fatal.
        let playlists = try_join_all(metadata.streaming_playlists.iter().map(|p| async {
            let text = fetcher
                .fetch_text(&p.playlist_url, &options.fetch_options())
                .await
                .map_err(|e| HandlerError::fetch("playlist", e))?;
            hls::parse(&text, &p.playlist_url).map_err(|e| HandlerError::parse("playlist", e))
        }))
        .await?;
        for parsed in playlists {
            builder.extend_streams(parsed.streams);
            builder.extend_adaptive_streams(parsed.adaptive);
        }

        let info = builder.build();
        if info.is_empty() {
            return Err(HandlerError::parse("api", ParseError::NoPlayableStreams));
        }
        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct VideoMetadata {
    name: Option<String>,
    description: Option<String>,
    duration: Option<u64>,
    #[serde(rename = "streamingPlaylists", default)]
    streaming_playlists: Vec<StreamingPlaylist>,
}

#[derive(Debug, Deserialize)]
struct StreamingPlaylist {
    #[serde(rename = "playlistUrl")]
    playlist_url: String,
}
