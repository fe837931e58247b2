//! HLS master playlist parsing.
//!
//! Muxed `#EXT-X-STREAM-INF` variants become progressive [`Stream`]s;
//! alternate audio renditions (`#EXT-X-MEDIA:TYPE=AUDIO` with a URI)
//! become audio-only [`AdaptiveStream`]s. A media-level playlist (one
//! with `#EXTINF` segments and no variants) is itself playable, so it
//! yields a single progressive entry pointing at the playlist URL.

use std::collections::HashMap;

use tracing::debug;

use super::{coerce_dim, coerce_fps, resolve_reference, ParseError, ParsedStreams};
use crate::codec::split_codecs_attr;
use crate::model::{AdaptiveStream, ManifestFormat, Stream};

/// Parse an HLS playlist fetched from `manifest_url`.
pub fn parse(text: &str, manifest_url: &str) -> Result<ParsedStreams, ParseError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err(ParseError::UnrecognizedFormat(
            "not an M3U playlist".to_string(),
        ));
    }

    if !text.contains("#EXT-X-STREAM-INF:") {
        if text.contains("#EXTINF:") {
            // Media playlist: directly playable as a single variant.
            let mut result = ParsedStreams::default();
            result.streams.push(Stream {
                uri: manifest_url.to_string(),
                ..Stream::default()
            });
            return Ok(result);
        }
        return Err(ParseError::UnrecognizedFormat(
            "playlist has neither variants nor segments".to_string(),
        ));
    }

    let mut result = ParsedStreams::default();
    let mut lines = text.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let attrs = parse_attributes(rest);

            // Variant URI is the next non-comment line.
            let uri_line = loop {
                match lines.peek() {
                    Some(l) if l.is_empty() => {
                        lines.next();
                    }
                    Some(l) if l.starts_with('#') => break None,
                    Some(_) => break lines.next(),
                    None => break None,
                }
            };
            let Some(uri_line) = uri_line else {
                debug!("variant without URI line, dropping");
                continue;
            };
            let Some(uri) = resolve_reference(manifest_url, uri_line) else {
                debug!(reference = uri_line, "unresolvable variant URI, dropping");
                continue;
            };

            let (width, height) = attrs
                .get("RESOLUTION")
                .and_then(|r| r.split_once('x'))
                .map_or((0, 0), |(w, h)| (coerce_dim(w), coerce_dim(h)));
            let (video_codec, audio_codec) = attrs
                .get("CODECS")
                .map_or((None, None), |c| split_codecs_attr(c));

            result.streams.push(Stream {
                uri,
                // Rendition group reference doubles as a service-specific
                // variant label (e.g. Twitch "720p60").
                itag: attrs.get("VIDEO").cloned(),
                width,
                height,
                fps: attrs.get("FRAME-RATE").map_or(0, |f| coerce_fps(f)),
                video_codec,
                audio_codec,
                bitrate: attrs.get("BANDWIDTH").and_then(|b| b.parse().ok()),
            });
        } else if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA:") {
            let attrs = parse_attributes(rest);
            if attrs.get("TYPE").map(String::as_str) != Some("AUDIO") {
                continue;
            }
            let Some(uri) = attrs
                .get("URI")
                .and_then(|u| resolve_reference(manifest_url, u))
            else {
                continue;
            };

            let repr_id = attrs
                .get("GROUP-ID")
                .or_else(|| attrs.get("NAME"))
                .cloned();
            let mut component = AdaptiveStream::new(
                Stream {
                    uri,
                    ..Stream::default()
                },
                ManifestFormat::Hls,
            );
            component.repr_id = repr_id;
            result.adaptive.push(component);
        }
    }

    if result.is_empty() {
        return Err(ParseError::NoPlayableStreams);
    }
    Ok(result)
}

/// Parse an HLS attribute list, honoring quoted values.
fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let v: String = chars.by_ref().take_while(|&c| c != '"').collect();
            chars.next(); // trailing comma, if present
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }

    attrs
}
