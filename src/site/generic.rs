//! Generic manifest handler.
//!
//! Fallback for bare HLS/DASH manifest URIs with no site-specific
//! handler. Registered at a low priority so service handlers win for
//! hosts they claim.

use async_trait::async_trait;
use url::Url;

use super::{HandlerError, MatchRule, WebsiteHandler};
use crate::client::RequestOptions;
use crate::fetch::Fetcher;
use crate::manifest::{dash, hls};
use crate::model::MediaInfo;

/// Handler for direct `.m3u8` / `.mpd` URIs.
pub struct GenericHandler;

impl GenericHandler {
    /// Title fallback: the manifest's file stem.
    fn title_from_uri(uri: &Url) -> String {
        uri.path_segments()
            .and_then(|mut s| s.next_back())
            .and_then(|name| name.rsplit_once('.').map(|(stem, _)| stem))
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl WebsiteHandler for GenericHandler {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn match_rule(&self) -> MatchRule {
        MatchRule::PathSuffix(vec![".m3u8".into(), ".mpd".into()])
    }

    async fn extract(
        &self,
        uri: &Url,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<MediaInfo, HandlerError> {
        let payload = fetcher
            .fetch(uri.as_str(), &options.fetch_options())
            .await
            .map_err(|e| HandlerError::fetch("manifest", e))?;
        let body = payload.text();

        let parsed = if uri.path().ends_with(".mpd") || body.trim_start().starts_with('<') {
            dash::parse(&body, &payload.final_url)
        } else {
            hls::parse(&body, &payload.final_url)
        }
        .map_err(|e| HandlerError::parse("manifest", e))?;

        let mut builder = MediaInfo::builder()
            .title(Self::title_from_uri(uri))
            .duration(parsed.duration.unwrap_or(0));
        builder.extend_streams(parsed.streams);
        builder.extend_adaptive_streams(parsed.adaptive);
        Ok(builder.build())
    }
}
