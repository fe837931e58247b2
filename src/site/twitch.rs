//! Twitch handler.
//!
//! Covers live channels (`twitch.tv/<login>`) and VODs
//! (`twitch.tv/videos/<id>`). Three ordered steps against the GraphQL
//! API and the usher CDN:
//!
//! 1. metadata query — title and, for VODs, the duration;
//! 2. playback access token query — token + signature;
//! 3. usher HLS master playlist — parsed into variants, with Twitch's
//!    quality labels (`720p60`) filling in dimensions the playlist
//!    leaves out.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{HandlerError, MatchRule, WebsiteHandler};
use crate::client::RequestOptions;
use crate::codec::parse_quality_label;
use crate::fetch::{FetchOptions, Fetcher, RequestMethod};
use crate::manifest::{hls, ParseError};
use crate::model::MediaInfo;

const GQL_URL: &str = "https://gql.twitch.tv/gql";
// Public web player client id, required by the GraphQL endpoint.
const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h0ko";
const USHER_BASE: &str = "https://usher.ttvnw.net";

/// What a Twitch URI points at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Channel(String),
    Vod(String),
}

impl Target {
    fn from_url(url: &Url) -> Option<Self> {
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let first = segments.next()?;
        match first {
            "videos" => {
                let id = segments.next()?;
                id.chars()
                    .all(|c| c.is_ascii_digit())
                    .then(|| Self::Vod(id.to_string()))
            }
            // Reserved top-level pages are not media.
            "directory" | "downloads" | "p" | "settings" => None,
            login => segments
                .next()
                .is_none()
                .then(|| Self::Channel(login.to_ascii_lowercase())),
        }
    }
}

/// Handler for `twitch.tv` channels and VODs.
pub struct TwitchHandler;

impl TwitchHandler {
    fn gql_options(body: String, base: &RequestOptions) -> FetchOptions {
        let mut options = base.fetch_options();
        options.method = RequestMethod::Post;
        options.body = Some(body);
        options.content_type = Some("application/json".to_string());
        options.headers.push(("Client-ID".into(), CLIENT_ID.into()));
        options
    }

    async fn fetch_metadata(
        &self,
        target: &Target,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<(String, u64), HandlerError> {
        let query = match target {
            Target::Channel(login) => format!(
                "query {{ user(login: \"{login}\") {{ broadcastSettings {{ title }} }} }}"
            ),
            Target::Vod(id) => {
                format!("query {{ video(id: \"{id}\") {{ title lengthSeconds }} }}")
            }
        };
        let body = serde_json::json!({ "query": query }).to_string();

        let payload = fetcher
            .fetch(GQL_URL, &Self::gql_options(body, options))
            .await
            .map_err(|e| HandlerError::fetch("metadata", e))?;
        let response: MetadataResponse = payload
            .json()
            .map_err(|e| HandlerError::parse("metadata", e.into()))?;

        match target {
            Target::Channel(_) => {
                let title = response
                    .data
                    .user
                    .and_then(|u| u.broadcast_settings)
                    .map(|b| b.title)
                    .ok_or_else(|| {
                        HandlerError::parse("metadata", ParseError::MissingField { field: "user" })
                    })?;
                // Live broadcast: duration unknown.
                Ok((title, 0))
            }
            Target::Vod(_) => {
                let video = response.data.video.ok_or_else(|| {
                    HandlerError::parse("metadata", ParseError::MissingField { field: "video" })
                })?;
                Ok((video.title, video.length_seconds.unwrap_or(0)))
            }
        }
    }

    async fn fetch_access_token(
        &self,
        target: &Target,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<AccessToken, HandlerError> {
        let (is_live, login, is_vod, vod_id) = match target {
            Target::Channel(login) => (true, login.as_str(), false, ""),
            Target::Vod(id) => (false, "", true, id.as_str()),
        };
        let body = serde_json::json!({
            "operationName": "PlaybackAccessToken",
            "variables": {
                "isLive": is_live,
                "login": login,
                "isVod": is_vod,
                "vodID": vod_id,
                "playerType": "embed",
            },
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": "0828119ded1c13477966434e15800ff57ddacf13ba1911c129dc2200705b0712",
                }
            }
        });

        let payload = fetcher
            .fetch(GQL_URL, &Self::gql_options(body.to_string(), options))
            .await
            .map_err(|e| HandlerError::fetch("access_token", e))?;
        let response: TokenResponse = payload
            .json()
            .map_err(|e| HandlerError::parse("access_token", e.into()))?;

        response
            .data
            .stream_playback_access_token
            .or(response.data.video_playback_access_token)
            .ok_or_else(|| {
                HandlerError::parse(
                    "access_token",
                    ParseError::MissingField {
                        field: "playbackAccessToken",
                    },
                )
            })
    }

    fn usher_url(target: &Target, token: &AccessToken) -> String {
        let (path, extra) = match target {
            Target::Channel(login) => (format!("api/channel/hls/{login}.m3u8"), "&allow_source=true&allow_audio_only=true"),
            Target::Vod(id) => (format!("vod/{id}.m3u8"), "&allow_source=true"),
        };
        format!(
            "{USHER_BASE}/{path}?client_id={CLIENT_ID}&token={}&sig={}{extra}",
            urlencoding::encode(&token.value),
            urlencoding::encode(&token.signature),
        )
    }
}

#[async_trait]
impl WebsiteHandler for TwitchHandler {
    fn name(&self) -> &'static str {
        "twitch"
    }

    fn match_rule(&self) -> MatchRule {
        MatchRule::Custom(std::sync::Arc::new(|url: &Url| {
            super::host_matches(url, &["twitch.tv".to_string()]) && Target::from_url(url).is_some()
        }))
    }

    async fn extract(
        &self,
        uri: &Url,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<MediaInfo, HandlerError> {
        let target = Target::from_url(uri).ok_or_else(|| {
            HandlerError::parse("target", ParseError::MissingField { field: "channel" })
        })?;
        debug!(?target, "twitch extraction");

        let (title, duration) = self.fetch_metadata(&target, fetcher, options).await?;
        let token = self.fetch_access_token(&target, fetcher, options).await?;

        let usher_url = Self::usher_url(&target, &token);
        let playlist = fetcher
            .fetch_text(&usher_url, &options.fetch_options())
            .await
            .map_err(|e| HandlerError::fetch("manifest", e))?;
        let mut parsed =
            hls::parse(&playlist, &usher_url).map_err(|e| HandlerError::parse("manifest", e))?;

        // Usher playlists label variants ("720p60", "chunked") where
        // RESOLUTION/FRAME-RATE attributes may be missing.
        for stream in &mut parsed.streams {
            if let Some(label) = &stream.itag {
                let (height, fps) = parse_quality_label(label);
                if stream.height == 0 {
                    stream.height = height;
                }
                if stream.fps == 0 {
                    stream.fps = fps;
                }
            }
        }

        let id = match &target {
            Target::Channel(login) => login.clone(),
            Target::Vod(id) => id.clone(),
        };
        let mut builder = MediaInfo::builder().id(id).title(title).duration(duration);
        builder.extend_streams(parsed.streams);
        builder.extend_adaptive_streams(parsed.adaptive);
        Ok(builder.build())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    data: MetadataData,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    user: Option<UserData>,
    video: Option<VideoData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    #[serde(rename = "broadcastSettings")]
    broadcast_settings: Option<BroadcastSettings>,
}

#[derive(Debug, Deserialize)]
struct BroadcastSettings {
    title: String,
}

#[derive(Debug, Deserialize)]
struct VideoData {
    title: String,
    #[serde(rename = "lengthSeconds")]
    length_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(rename = "streamPlaybackAccessToken")]
    stream_playback_access_token: Option<AccessToken>,
    #[serde(rename = "videoPlaybackAccessToken")]
    video_playback_access_token: Option<AccessToken>,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    value: String,
    signature: String,
}
