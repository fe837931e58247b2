//! Codec and quality-label normalization.
//!
//! Services describe the same codecs with wildly different vocabulary:
//! RFC 6381 fourcc strings (`avc1.64001f`, `mp4a.40.2`), bare names
//! (`h264`, `opus`), or full MIME types with a `codecs` parameter.
//! [`CodecTag::parse`] folds all of them onto one small canonical
//! enumeration; anything unrecognized becomes [`CodecTag::Unknown`],
//! never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Canonical codec identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecTag {
    Avc,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Aac,
    Opus,
    Vorbis,
    Mp3,
    Unknown,
}

impl CodecTag {
    /// Map a raw upstream codec string onto the canonical vocabulary.
    ///
    /// Idempotent: feeding a canonical name back in yields the same tag.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        // MIME-style input: classify the first entry of the codecs
        // parameter.
        if let Some(params) = raw.find(';').map(|i| &raw[i + 1..]) {
            if let Some(list) = extract_codecs_param(params) {
                if let Some(first) = list.split(',').next() {
                    return Self::parse(first);
                }
            }
        }

        let lower = raw.to_ascii_lowercase();
        // Strip profile suffix from fourcc-style tags: "avc1.64001f" -> "avc1".
        let fourcc = lower.split('.').next().unwrap_or(&lower);

        match fourcc {
            "avc" | "avc1" | "avc3" | "h264" | "x264" => Self::Avc,
            "hev1" | "hvc1" | "h265" | "hevc" | "x265" => Self::Hevc,
            "vp8" | "vp08" => Self::Vp8,
            "vp9" | "vp09" => Self::Vp9,
            "av01" | "av1" => Self::Av1,
            "mp4a" => match lower.as_str() {
                // mp4a.69 / mp4a.6b are MPEG-1 layer 3 in an MP4 box.
                "mp4a.69" | "mp4a.6b" => Self::Mp3,
                _ => Self::Aac,
            },
            "aac" | "aacl" | "aach" => Self::Aac,
            "opus" => Self::Opus,
            "vorbis" => Self::Vorbis,
            "mp3" | "mpga" => Self::Mp3,
            _ => Self::Unknown,
        }
    }

    /// True for tags that describe a video track.
    #[must_use]
    pub fn is_video(self) -> bool {
        matches!(
            self,
            Self::Avc | Self::Hevc | Self::Vp8 | Self::Vp9 | Self::Av1
        )
    }

    /// True for tags that describe an audio track.
    #[must_use]
    pub fn is_audio(self) -> bool {
        matches!(self, Self::Aac | Self::Opus | Self::Vorbis | Self::Mp3)
    }

    /// Canonical lowercase name; `"unknown"` for [`Self::Unknown`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Avc => "avc",
            Self::Hevc => "hevc",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Mp3 => "mp3",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CodecTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pull the value of a `codecs="..."` parameter out of a MIME parameter
/// list, with or without quotes.
fn extract_codecs_param(params: &str) -> Option<&str> {
    for param in params.split(';') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("codecs") {
            return Some(value.trim().trim_matches('"'));
        }
    }
    None
}

/// Split a `CODECS` attribute list (HLS/DASH style, e.g.
/// `"avc1.64001f,mp4a.40.2"`) into raw (video, audio) tags.
///
/// Entries that classify as neither video nor audio are ignored; a list
/// with only one side present leaves the other `None`.
#[must_use]
pub fn split_codecs_attr(attr: &str) -> (Option<String>, Option<String>) {
    let mut video = None;
    let mut audio = None;

    for entry in attr.split(',') {
        let entry = entry.trim().trim_matches('"');
        if entry.is_empty() {
            continue;
        }
        let tag = CodecTag::parse(entry);
        if tag.is_video() && video.is_none() {
            video = Some(entry.to_string());
        } else if tag.is_audio() && audio.is_none() {
            audio = Some(entry.to_string());
        }
    }

    (video, audio)
}

static QUALITY_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3,4})p(\d{2,3})?$").expect("valid regex"));

/// Parse a service quality label like `"1080p60"`, `"720p"` or
/// `"audio_only"` into `(height, fps)`; unknown shapes yield `(0, 0)`.
#[must_use]
pub fn parse_quality_label(label: &str) -> (u32, u32) {
    let label = label.trim().to_ascii_lowercase();
    if let Some(caps) = QUALITY_LABEL.captures(&label) {
        let height = caps[1].parse().unwrap_or(0);
        let fps = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        return (height, fps);
    }
    (0, 0)
}
