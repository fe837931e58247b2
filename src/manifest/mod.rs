//! Format-specific manifest and API-response parsers.
//!
//! One parser per upstream format:
//!
//! - [`hls`]: HLS master playlists (text)
//! - [`dash`]: DASH MPD manifests (XML)
//! - [`embedded`]: JSON objects embedded in page HTML
//! - [`api`]: loosely-structured JSON API stream tables
//!
//! All parsers share the same contract: unknown fields are ignored,
//! individually malformed entries are dropped, and a [`ParseError`] is
//! returned only when the document's top-level structure is
//! unrecognizable or not a single entry yields a playable URI.

pub mod api;
pub mod dash;
pub mod embedded;
pub mod hls;

use thiserror::Error;
use url::Url;

use crate::model::{AdaptiveStream, Stream};

/// Structural parse failure. Entry-level problems never produce one.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized document structure: {0}")]
    UnrecognizedFormat(String),

    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("no entry yielded a playable URI")]
    NoPlayableStreams,

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// Streams recovered from one parsed document.
#[derive(Debug, Default)]
pub struct ParsedStreams {
    pub streams: Vec<Stream>,
    pub adaptive: Vec<AdaptiveStream>,
    /// Presentation duration in seconds, when the manifest declares one.
    pub duration: Option<u64>,
}

impl ParsedStreams {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.adaptive.is_empty()
    }
}

/// Resolve a possibly-relative reference against the document URL.
/// Returns `None` for references that cannot form an absolute URL.
#[must_use]
pub fn resolve_reference(base: &str, reference: &str) -> Option<String> {
    if let Ok(url) = Url::parse(reference) {
        return Some(url.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(reference).ok().map(|u| u.to_string())
}

/// Best-effort pixel dimension: negative or non-numeric input is 0.
pub(crate) fn coerce_dim(raw: &str) -> u32 {
    raw.trim().parse::<i64>().map_or(0, |n| {
        if n < 0 {
            0
        } else {
            u32::try_from(n).unwrap_or(0)
        }
    })
}

/// Best-effort frame rate: accepts integers, decimals, and `num/den`
/// fractions; anything else (or negative) is 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn coerce_fps(raw: &str) -> u32 {
    let raw = raw.trim();
    let value = if let Some((num, den)) = raw.split_once('/') {
        match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(n), Ok(d)) if d > 0.0 => n / d,
            _ => return 0,
        }
    } else {
        match raw.parse::<f64>() {
            Ok(v) => v,
            Err(_) => return 0,
        }
    };
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

/// Best-effort u32 from a JSON value (number or numeric string).
pub(crate) fn json_u32(value: Option<&serde_json::Value>) -> u32 {
    let Some(value) = value else { return 0 };
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).unwrap_or(0);
    }
    if let Some(f) = value.as_f64() {
        return coerce_fps(&f.to_string());
    }
    value.as_str().map_or(0, coerce_dim)
}

/// Best-effort u64 from a JSON value; `None` for absent/invalid/negative.
pub(crate) fn json_u64(value: Option<&serde_json::Value>) -> Option<u64> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value.as_str().and_then(|s| s.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_references() {
        assert_eq!(
            resolve_reference("https://cdn.example.com/v/master.m3u8", "720p.m3u8").as_deref(),
            Some("https://cdn.example.com/v/720p.m3u8")
        );
        assert_eq!(
            resolve_reference("https://cdn.example.com/v/master.m3u8", "/other/a.m3u8").as_deref(),
            Some("https://cdn.example.com/other/a.m3u8")
        );
        assert_eq!(
            resolve_reference("https://cdn.example.com/x", "https://b.example.com/y").as_deref(),
            Some("https://b.example.com/y")
        );
    }

    #[test]
    fn coerces_dimensions() {
        assert_eq!(coerce_dim("1920"), 1920);
        assert_eq!(coerce_dim("-480"), 0);
        assert_eq!(coerce_dim("wide"), 0);
    }

    #[test]
    fn coerces_frame_rates() {
        assert_eq!(coerce_fps("25"), 25);
        assert_eq!(coerce_fps("29.97"), 30);
        assert_eq!(coerce_fps("30000/1001"), 30);
        assert_eq!(coerce_fps("-24"), 0);
        assert_eq!(coerce_fps("fast"), 0);
    }
}
