//! Odysee (LBRY) handler.
//!
//! Talks to the LBRY JSON-RPC proxy in three ordered steps:
//!
//! 1. `resolve` — claim metadata: title, description, duration, and the
//!    source video dimensions (kept for the direct-file case);
//! 2. `get` — the streaming URL for the claim;
//! 3. fetch that URL — an HLS master playlist is parsed into variants,
//!    anything else is a single direct stream carrying the stored
//!    dimensions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{HandlerError, MatchRule, WebsiteHandler};
use crate::client::RequestOptions;
use crate::fetch::{FetchOptions, Fetcher, RequestMethod};
use crate::manifest::{hls, ParseError};
use crate::model::{MediaInfo, Stream};

const API_URL: &str = "https://api.na-backend.odysee.com/api/v1/proxy";

/// Handler for `odysee.com/@channel/video` pages.
pub struct OdyseeHandler;

impl OdyseeHandler {
    /// Claim path as the LBRY API expects it: `@channel/video`,
    /// keeping any fragment the page URL carried.
    fn claim_id(uri: &Url) -> String {
        let path = uri.path().trim_start_matches('/');
        match uri.fragment() {
            Some(fragment) => format!("{path}#{fragment}"),
            None => path.to_string(),
        }
    }

    fn rpc_options(method: &str, param_key: &str, claim: &str, base: &RequestOptions) -> FetchOptions {
        let body = serde_json::json!({
            "method": method,
            "params": { param_key: claim },
        });
        let mut options = base.fetch_options();
        options.method = RequestMethod::Post;
        options.body = Some(body.to_string());
        options.content_type = Some("application/json-rpc".to_string());
        options
    }
}

#[async_trait]
impl WebsiteHandler for OdyseeHandler {
    fn name(&self) -> &'static str {
        "odysee"
    }

    fn match_rule(&self) -> MatchRule {
        MatchRule::HostPath {
            hosts: vec!["odysee.com".into()],
            path_prefix: "/@".into(),
        }
    }

    async fn extract(
        &self,
        uri: &Url,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<MediaInfo, HandlerError> {
        let claim = Self::claim_id(uri);
        debug!(claim, "resolving odysee claim");

        // Step 1: claim metadata.
        let resolve = fetcher
            .fetch(API_URL, &Self::rpc_options("resolve", "urls", &claim, options))
            .await
            .map_err(|e| HandlerError::fetch("resolve", e))?;
        let resolve: Value = resolve
            .json()
            .map_err(|e| HandlerError::parse("resolve", e.into()))?;

        let value = resolve
            .get("result")
            .and_then(|r| r.get(&claim))
            .and_then(|c| c.get("value"))
            .ok_or_else(|| {
                HandlerError::parse("resolve", ParseError::MissingField { field: "result" })
            })?;

        let title = value.get("title").and_then(Value::as_str).unwrap_or("");
        let description = value.get("description").and_then(Value::as_str);
        let video = value.get("video");
        let duration = video
            .and_then(|v| v.get("duration"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let width = crate::manifest::json_u32(video.and_then(|v| v.get("width")));
        let height = crate::manifest::json_u32(video.and_then(|v| v.get("height")));

        // Step 2: streaming URL.
        let get = fetcher
            .fetch(API_URL, &Self::rpc_options("get", "uri", &claim, options))
            .await
            .map_err(|e| HandlerError::fetch("get", e))?;
        let get: GetResponse = get
            .json()
            .map_err(|e| HandlerError::parse("get", e.into()))?;
        let streaming_url = get
            .result
            .and_then(|r| r.streaming_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                HandlerError::parse("get", ParseError::MissingField {
                    field: "streaming_url",
                })
            })?;
        debug!(streaming_url, "got odysee streaming URL");

        // Step 3: the stream itself — HLS master or a direct file.
        let payload = fetcher
            .fetch(&streaming_url, &options.fetch_options())
            .await
            .map_err(|e| HandlerError::fetch("stream", e))?;

        let mut builder = MediaInfo::builder()
            .id(claim)
            .title(title)
            .duration(duration);
        if let Some(description) = description {
            builder = builder.description(description);
        }

        let body = payload.text();
        if body.starts_with("#EXTM3U") {
            let parsed = hls::parse(&body, &payload.final_url)
                .map_err(|e| HandlerError::parse("stream", e))?;
            builder.extend_streams(parsed.streams);
            builder.extend_adaptive_streams(parsed.adaptive);
        } else {
            builder.add_stream(Stream {
                uri: payload.final_url.clone(),
                width,
                height,
                ..Stream::default()
            });
        }

        Ok(builder.build())
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    result: Option<GetResult>,
}

#[derive(Debug, Deserialize)]
struct GetResult {
    streaming_url: Option<String>,
}
