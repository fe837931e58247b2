//! End-to-end extraction tests against mock HTTP servers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mediascout::site::peertube::PeerTubeHandler;
use mediascout::{Client, CodecTag, Error, HandlerRegistry, RequestOptions};

const MASTER_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,FRAME-RATE=60.000,CODECS=\"avc1.64002a,mp4a.40.2\"\n\
1080p60.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=1500000,RESOLUTION=852x480,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
480p.m3u8\n";

#[tokio::test]
async fn generic_handler_extracts_hls_manifest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_PLAYLIST))
        .mount(&server)
        .await;

    let client = Client::new().unwrap();
    let info = client
        .fetch_media_info(&format!("{}/live/master.m3u8", server.uri()))
        .await
        .unwrap();

    assert_eq!(info.title(), "master");
    assert_eq!(info.duration(), 0);
    assert_eq!(info.get_streams().len(), 2);

    let best = &info.get_streams()[0];
    assert_eq!((best.width, best.height, best.fps), (1920, 1080, 60));
    assert!(best.uri.ends_with("/live/1080p60.m3u8"));
    let (success, video, audio) = best.get_codecs();
    assert!(success);
    assert_eq!(video, CodecTag::Avc);
    assert_eq!(audio, CodecTag::Aac);

    // Every returned entry carries a non-empty URI.
    for stream in info.get_streams() {
        assert!(!stream.uri.is_empty());
    }
}

#[tokio::test]
async fn generic_handler_extracts_dash_manifest() {
    let mpd = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" mediaPresentationDuration="PT2M">
  <Period>
    <AdaptationSet contentType="video">
      <Representation id="v0" codecs="vp09.00.10.08" width="1280" height="720" frameRate="30" bandwidth="1800000">
        <BaseURL>v0.webm</BaseURL>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="audio">
      <Representation id="a0" codecs="opus" bandwidth="96000">
        <BaseURL>a0.webm</BaseURL>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vod/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mpd))
        .mount(&server)
        .await;

    let client = Client::new().unwrap();
    let info = client
        .fetch_media_info(&format!("{}/vod/manifest.mpd", server.uri()))
        .await
        .unwrap();

    assert_eq!(info.duration(), 120);
    assert!(info.get_streams().is_empty());
    assert_eq!(info.get_adaptive_streams().len(), 2);

    let video = &info.get_adaptive_streams()[0];
    assert_eq!(video.repr_id.as_deref(), Some("v0"));
    assert_eq!(video.stream.audio_codec, None);

    let audio = &info.get_adaptive_streams()[1];
    let (success, video_tag, audio_tag) = audio.get_codecs();
    assert!(success);
    assert_eq!(video_tag, CodecTag::Unknown);
    assert_eq!(audio_tag, CodecTag::Opus);
}

#[tokio::test]
async fn peertube_extraction_combines_files_and_playlists() {
    let server = MockServer::start().await;
    let api_body = serde_json::json!({
        "name": "Sintel trailer",
        "description": "Open movie trailer",
        "duration": 52,
        "files": [
            {
                "fileUrl": format!("{}/static/720.mp4", server.uri()),
                "resolution": { "id": 720, "label": "720p" },
                "fps": 24,
                "size": 10_000_000
            }
        ],
        "streamingPlaylists": [
            { "playlistUrl": format!("{}/static/hls/master.m3u8", server.uri()) }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api/v1/videos/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&api_body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/hls/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_PLAYLIST))
        .mount(&server)
        .await;

    let registry = Arc::new(HandlerRegistry::new());
    registry.register_default(
        Arc::new(PeerTubeHandler::with_instances(vec!["127.0.0.1".into()])),
        0,
    );
    let client = Client::builder().registry(registry).build().unwrap();

    let info = client
        .fetch_media_info(&format!("{}/w/abc123", server.uri()))
        .await
        .unwrap();

    assert_eq!(info.id(), Some("abc123"));
    assert_eq!(info.title(), "Sintel trailer");
    assert_eq!(info.duration(), 52);
    // One progressive file plus two HLS variants.
    assert_eq!(info.get_streams().len(), 3);
    assert_eq!(info.get_streams()[0].height, 720);
    assert_eq!(info.get_streams()[0].fps, 24);
}

#[tokio::test]
async fn upstream_4xx_maps_to_fetch_failed_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone/master.m3u8"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = Client::new().unwrap();
    let err = client
        .fetch_media_info(&format!("{}/gone/master.m3u8", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FetchFailed { .. }));
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn unparsable_manifest_maps_to_parse_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bad/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a playlist</html>"))
        .mount(&server)
        .await;

    let client = Client::new().unwrap();
    let err = client
        .fetch_media_info(&format!("{}/bad/master.m3u8", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ParseFailed { .. }));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn cancellation_yields_cancelled_not_partial_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow/master.m3u8"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(MASTER_PLAYLIST)
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let options = RequestOptions {
        cancel: Some(token.clone()),
        ..RequestOptions::default()
    };

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let client = Client::new().unwrap();
    let started = std::time::Instant::now();
    let err = client
        .fetch_media_info_with(&format!("{}/slow/master.m3u8", server.uri()), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    // Cancellation is prompt, not bound to the response delay.
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// A plugin-style handler for a site that embeds its player config as
/// JSON inside a `<script>` element.
struct EmbeddedPageHandler;

#[async_trait::async_trait]
impl mediascout::WebsiteHandler for EmbeddedPageHandler {
    fn name(&self) -> &'static str {
        "embedded-page"
    }

    fn match_rule(&self) -> mediascout::MatchRule {
        mediascout::MatchRule::hosts(&["127.0.0.1"])
    }

    async fn extract(
        &self,
        uri: &url::Url,
        fetcher: &mediascout::Fetcher,
        options: &RequestOptions,
    ) -> Result<mediascout::MediaInfo, mediascout::HandlerError> {
        let html = fetcher
            .fetch_text(uri.as_str(), &options.fetch_options())
            .await
            .map_err(|e| mediascout::HandlerError::Fetch {
                step: "page",
                source: e,
            })?;
        let parsed = mediascout::manifest::embedded::parse(&html, "window.playerConfig", uri.as_str())
            .map_err(|e| mediascout::HandlerError::Parse {
                step: "page",
                source: e,
            })?;

        let mut builder = mediascout::MediaInfo::builder().title("embedded");
        builder.extend_streams(parsed.streams);
        builder.extend_adaptive_streams(parsed.adaptive);
        Ok(builder.build())
    }
}

#[tokio::test]
async fn registered_plugin_handler_extracts_embedded_page_json() {
    let server = MockServer::start().await;
    let html = r#"<html><head><script>
        window.playerConfig = {"sources": [
            {"src": "/media/clip-720.mp4", "width": 1280, "height": 720, "fps": 30,
             "codecs": "avc1.64001f,mp4a.40.2"}
        ]};
    </script></head><body></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/watch/clip"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let registry = Arc::new(HandlerRegistry::new());
    let client = Client::builder().registry(registry).build().unwrap();
    client.registry().register(
        Arc::new(EmbeddedPageHandler),
        mediascout::MatchRule::hosts(&["127.0.0.1"]),
        10,
    );

    let info = client
        .fetch_media_info(&format!("{}/watch/clip", server.uri()))
        .await
        .unwrap();

    assert_eq!(info.get_streams().len(), 1);
    let stream = &info.get_streams()[0];
    assert!(stream.uri.ends_with("/media/clip-720.mp4"));
    assert!(stream.uri.starts_with("http://"));
    assert_eq!((stream.width, stream.height, stream.fps), (1280, 720, 30));
    let (success, video, audio) = stream.get_codecs();
    assert!(success);
    assert_eq!(video, CodecTag::Avc);
    assert_eq!(audio, CodecTag::Aac);
}

#[tokio::test]
async fn dispatch_scenarios_from_registry() {
    let client = Client::new().unwrap();

    let err = client
        .fetch_media_info("https://unknown.test/x")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}
