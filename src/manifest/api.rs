//! Loosely-structured JSON API responses.
//!
//! Services publish stream tables under different keys (`formats`,
//! `streams`, `sources`, `files`) with half-standardized field names.
//! This parser scans the common spellings, coerces numerics
//! best-effort, and drops entries without a resolvable URI instead of
//! failing the document.

use serde_json::Value;
use tracing::debug;

use super::{coerce_dim, json_u32, json_u64, resolve_reference, ParseError, ParsedStreams};
use crate::codec::split_codecs_attr;
use crate::model::Stream;

const TABLE_KEYS: &[&str] = &["formats", "streams", "sources", "files"];
const URI_KEYS: &[&str] = &["url", "uri", "src", "fileUrl", "file"];
const ITAG_KEYS: &[&str] = &["itag", "format_id", "formatId"];

/// Parse a JSON stream table relative to `base_url`.
///
/// Accepts either a bare entry array or an object holding one under a
/// known key (a top-level `data` wrapper is looked through).
pub fn parse(value: &Value, base_url: &str) -> Result<ParsedStreams, ParseError> {
    let entries = find_entries(value).ok_or_else(|| {
        ParseError::UnrecognizedFormat("no stream table found in response".to_string())
    })?;

    let mut result = ParsedStreams::default();
    let mut seen_entries = 0usize;
    for entry in entries {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        seen_entries += 1;
        match parse_entry(entry, base_url) {
            Some(stream) => result.streams.push(stream),
            None => debug!("stream table entry without usable URI, dropping"),
        }
    }

    if result.streams.is_empty() {
        // A table that exists but yields nothing playable is a parse
        // failure, not an empty success.
        if seen_entries > 0 {
            return Err(ParseError::NoPlayableStreams);
        }
        return Err(ParseError::UnrecognizedFormat(
            "stream table is empty".to_string(),
        ));
    }
    Ok(result)
}

fn find_entries(value: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = value.as_array() {
        return Some(array);
    }
    let object = value.as_object()?;
    for key in TABLE_KEYS {
        if let Some(array) = object.get(*key).and_then(Value::as_array) {
            return Some(array);
        }
    }
    object.get("data").and_then(find_entries)
}

fn parse_entry(entry: &serde_json::Map<String, Value>, base_url: &str) -> Option<Stream> {
    let reference = URI_KEYS
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
        .filter(|u| !u.is_empty())?;
    let uri = resolve_reference(base_url, reference)?;

    let (mut width, mut height) = (json_u32(entry.get("width")), json_u32(entry.get("height")));
    // PeerTube-style: resolution as an object with a numeric `id`.
    if height == 0 {
        if let Some(resolution) = entry.get("resolution") {
            height = json_u32(resolution.get("id").or(Some(resolution)));
        }
    }
    if width == 0 && height == 0 {
        // "1920x1080" spelling.
        if let Some((w, h)) = entry
            .get("resolution")
            .and_then(Value::as_str)
            .and_then(|r| r.split_once('x'))
        {
            width = coerce_dim(w);
            height = coerce_dim(h);
        }
    }

    let (mut video_codec, mut audio_codec) = entry
        .get("codecs")
        .and_then(Value::as_str)
        .map_or((None, None), split_codecs_attr);
    // Explicit per-track fields win; "none" means the track is absent.
    if let Some(vcodec) = entry.get("vcodec").and_then(Value::as_str) {
        video_codec = (vcodec != "none" && !vcodec.is_empty()).then(|| vcodec.to_string());
    }
    if let Some(acodec) = entry.get("acodec").and_then(Value::as_str) {
        audio_codec = (acodec != "none" && !acodec.is_empty()).then(|| acodec.to_string());
    }

    let itag = ITAG_KEYS.iter().find_map(|k| {
        let v = entry.get(*k)?;
        v.as_str()
            .map(ToString::to_string)
            .or_else(|| v.as_u64().map(|n| n.to_string()))
    });

    Some(Stream {
        uri,
        itag,
        width,
        height,
        fps: json_u32(entry.get("fps").or_else(|| entry.get("framerate"))),
        video_codec,
        audio_codec,
        bitrate: json_u64(entry.get("bitrate").or_else(|| entry.get("bandwidth"))),
    })
}
