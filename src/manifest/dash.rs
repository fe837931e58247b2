//! DASH MPD manifest parsing.
//!
//! Deserializes the MPD document with quick-xml/serde into a minimal
//! structural model (unknown elements and attributes are ignored) and
//! flattens every `Representation` into an [`AdaptiveStream`]. A
//! representation's playable URI is its resolved `BaseURL`; without one
//! the manifest URL itself is used, since segment-template streams are
//! addressed through the manifest.

use serde::Deserialize;

use super::{coerce_dim, coerce_fps, resolve_reference, ParseError, ParsedStreams};
use crate::codec::split_codecs_attr;
use crate::model::{AdaptiveStream, ByteRange, ManifestFormat, Stream};

#[derive(Debug, Deserialize)]
struct Mpd {
    #[serde(rename = "@mediaPresentationDuration")]
    media_presentation_duration: Option<String>,
    #[serde(rename = "BaseURL")]
    base_url: Option<String>,
    #[serde(rename = "Period", default)]
    periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
struct Period {
    #[serde(rename = "BaseURL")]
    base_url: Option<String>,
    #[serde(rename = "AdaptationSet", default)]
    adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Deserialize)]
struct AdaptationSet {
    #[serde(rename = "@contentType")]
    content_type: Option<String>,
    #[serde(rename = "@mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "@codecs")]
    codecs: Option<String>,
    #[serde(rename = "@frameRate")]
    frame_rate: Option<String>,
    #[serde(rename = "Representation", default)]
    representations: Vec<Representation>,
}

#[derive(Debug, Deserialize)]
struct Representation {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@codecs")]
    codecs: Option<String>,
    #[serde(rename = "@width")]
    width: Option<String>,
    #[serde(rename = "@height")]
    height: Option<String>,
    #[serde(rename = "@frameRate")]
    frame_rate: Option<String>,
    #[serde(rename = "@bandwidth")]
    bandwidth: Option<String>,
    #[serde(rename = "@mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "BaseURL")]
    base_url: Option<String>,
    #[serde(rename = "SegmentBase")]
    segment_base: Option<SegmentBase>,
}

#[derive(Debug, Deserialize)]
struct SegmentBase {
    #[serde(rename = "@indexRange")]
    index_range: Option<String>,
    #[serde(rename = "Initialization")]
    initialization: Option<Initialization>,
}

#[derive(Debug, Deserialize)]
struct Initialization {
    #[serde(rename = "@range")]
    range: Option<String>,
}

/// Parse a DASH MPD fetched from `manifest_url`.
pub fn parse(text: &str, manifest_url: &str) -> Result<ParsedStreams, ParseError> {
    if !text.contains("<MPD") {
        return Err(ParseError::UnrecognizedFormat(
            "document has no MPD element".to_string(),
        ));
    }

    let mpd: Mpd = quick_xml::de::from_str(text)?;
    let mut result = ParsedStreams {
        duration: mpd
            .media_presentation_duration
            .as_deref()
            .and_then(parse_iso_duration),
        ..ParsedStreams::default()
    };

    for period in &mpd.periods {
        for set in &period.adaptation_sets {
            for rep in &set.representations {
                let base = rep
                    .base_url
                    .as_deref()
                    .or(period.base_url.as_deref())
                    .or(mpd.base_url.as_deref());
                let uri = match base {
                    Some(reference) => {
                        let Some(uri) = resolve_reference(manifest_url, reference) else {
                            continue;
                        };
                        uri
                    }
                    None => manifest_url.to_string(),
                };

                let codecs = rep.codecs.as_deref().or(set.codecs.as_deref());
                let (mut video_codec, mut audio_codec) =
                    codecs.map_or((None, None), split_codecs_attr);

                // contentType/mimeType settle which track a codec-less
                // representation carries; they never invent a codec tag.
                let kind = set
                    .content_type
                    .as_deref()
                    .or(rep.mime_type.as_deref())
                    .or(set.mime_type.as_deref())
                    .unwrap_or("");
                if kind.starts_with("audio") {
                    video_codec = None;
                } else if kind.starts_with("video") {
                    audio_codec = None;
                }

                let frame_rate = rep.frame_rate.as_deref().or(set.frame_rate.as_deref());

                let mut component = AdaptiveStream::new(
                    Stream {
                        uri,
                        itag: None,
                        width: rep.width.as_deref().map_or(0, coerce_dim),
                        height: rep.height.as_deref().map_or(0, coerce_dim),
                        fps: frame_rate.map_or(0, coerce_fps),
                        video_codec,
                        audio_codec,
                        bitrate: rep.bandwidth.as_deref().and_then(|b| b.parse().ok()),
                    },
                    ManifestFormat::Dash,
                );
                component.repr_id = rep.id.clone();

                if let Some(segment_base) = &rep.segment_base {
                    component.index_range = segment_base
                        .index_range
                        .as_deref()
                        .and_then(parse_byte_range);
                    component.init_range = segment_base
                        .initialization
                        .as_ref()
                        .and_then(|i| i.range.as_deref())
                        .and_then(parse_byte_range);
                }

                result.adaptive.push(component);
            }
        }
    }

    if result.adaptive.is_empty() {
        return Err(ParseError::NoPlayableStreams);
    }
    Ok(result)
}

/// Parse a `start-end` byte range attribute.
fn parse_byte_range(raw: &str) -> Option<ByteRange> {
    let (start, end) = raw.split_once('-')?;
    ByteRange::new(start.trim().parse().ok()?, end.trim().parse().ok()?)
}

/// ISO-8601 duration (`PT1H2M3.5S`, optionally with a day component)
/// to whole seconds. Year/month components are not supported.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_iso_duration(raw: &str) -> Option<u64> {
    let rest = raw.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = 0.0_f64;
    for (part, is_time) in [(date_part, false), (time_part, true)] {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() || c == '.' {
                number.push(c);
                continue;
            }
            let value: f64 = number.parse().ok()?;
            number.clear();
            total += match (c, is_time) {
                ('D', false) => value * 86_400.0,
                ('H', true) => value * 3_600.0,
                ('M', true) => value * 60.0,
                ('S', true) => value,
                _ => return None,
            };
        }
        if !number.is_empty() {
            return None;
        }
    }

    Some(total.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecTag;

    const MPD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT1M30.5S">
  <Period>
    <AdaptationSet contentType="video" frameRate="30000/1001">
      <Representation id="v1" codecs="avc1.64001f" width="1280" height="720" bandwidth="2500000">
        <BaseURL>video/720p.mp4</BaseURL>
        <SegmentBase indexRange="741-1208">
          <Initialization range="0-740"/>
        </SegmentBase>
      </Representation>
      <Representation id="v2" codecs="vp09.00.10.08" width="-1920" height="1080" bandwidth="4000000">
        <BaseURL>video/1080p.webm</BaseURL>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="audio">
      <Representation id="a1" codecs="mp4a.40.2" bandwidth="128000">
        <BaseURL>audio/main.m4a</BaseURL>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

    #[test]
    fn parses_representations() {
        let parsed = parse(MPD, "https://cdn.example.com/d/manifest.mpd").unwrap();
        assert_eq!(parsed.adaptive.len(), 3);
        assert_eq!(parsed.duration, Some(91));

        let video = &parsed.adaptive[0];
        assert_eq!(video.repr_id.as_deref(), Some("v1"));
        assert_eq!(video.stream.uri, "https://cdn.example.com/d/video/720p.mp4");
        assert_eq!((video.stream.width, video.stream.height), (1280, 720));
        assert_eq!(video.stream.fps, 30);
        assert_eq!(video.init_range, Some(ByteRange { start: 0, end: 740 }));
        assert_eq!(
            video.index_range,
            Some(ByteRange {
                start: 741,
                end: 1208
            })
        );
        // Video-only component: audio codec absent, not a placeholder.
        let (success, video_tag, audio_tag) = video.get_codecs();
        assert!(success);
        assert_eq!(video_tag, CodecTag::Avc);
        assert_eq!(audio_tag, CodecTag::Unknown);
        assert_eq!(video.stream.audio_codec, None);
    }

    #[test]
    fn negative_width_coerces_to_zero() {
        let parsed = parse(MPD, "https://cdn.example.com/d/manifest.mpd").unwrap();
        let v2 = &parsed.adaptive[1];
        assert_eq!(v2.stream.width, 0);
        assert_eq!(v2.stream.height, 1080);
    }

    #[test]
    fn audio_representation_has_no_video_codec() {
        let parsed = parse(MPD, "https://cdn.example.com/d/manifest.mpd").unwrap();
        let audio = &parsed.adaptive[2];
        assert_eq!(audio.stream.video_codec, None);
        assert_eq!(audio.stream.audio_codec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(audio.stream.width, 0);
    }

    #[test]
    fn rejects_non_mpd_document() {
        let err = parse("{\"not\": \"xml\"}", "https://cdn.example.com/x").unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedFormat(_)));
    }

    #[test]
    fn empty_mpd_is_parse_error() {
        let err = parse(
            "<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\"></MPD>",
            "https://cdn.example.com/x",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::NoPlayableStreams));
    }

    #[test]
    fn iso_durations() {
        assert_eq!(parse_iso_duration("PT90S"), Some(90));
        assert_eq!(parse_iso_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso_duration("soon"), None);
    }
}
