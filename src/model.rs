//! Normalized media and stream model.
//!
//! A [`MediaInfo`] is the immutable result of one extraction: title,
//! duration, and the playable stream variants discovered for a media
//! item. Progressive variants ([`Stream`]) reference a single file that
//! carries every track; adaptive variants ([`AdaptiveStream`]) are
//! single-track manifest components that a player muxes client-side.
//!
//! Handlers assemble results through [`MediaInfoBuilder`]; once built,
//! a `MediaInfo` only hands out shared references.

use serde::Serialize;

use crate::codec::CodecTag;

/// Byte range within a remote resource (inclusive offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a range. Returns `None` unless `end > start`, so an unset
    /// or zeroed range never surfaces as a valid one.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }
}

/// Which manifest format an adaptive component came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    Hls,
    Dash,
}

/// A progressive stream variant: one URI serving audio+video together,
/// or a single audio-only/video-only file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stream {
    /// Absolute playable URI. Never empty on a returned entry.
    pub uri: String,
    /// Service-specific container/format identifier (opaque).
    pub itag: Option<String>,
    /// Width in pixels, 0 if unknown or audio-only.
    pub width: u32,
    /// Height in pixels, 0 if unknown or audio-only.
    pub height: u32,
    /// Frames per second, 0 if unknown or not video.
    pub fps: u32,
    /// Raw upstream video codec tag, absent when no video track.
    pub video_codec: Option<String>,
    /// Raw upstream audio codec tag, absent when no audio track.
    pub audio_codec: Option<String>,
    /// Bitrate in bits per second.
    pub bitrate: Option<u64>,
}

impl Stream {
    /// Normalized codec pair for this stream.
    ///
    /// The flag is `true` iff at least one of the two tags resolved to a
    /// known codec. Absent or unrecognized tags come back as
    /// [`CodecTag::Unknown`]; codec identification failure never hides
    /// the stream's URI or dimensions.
    #[must_use]
    pub fn get_codecs(&self) -> (bool, CodecTag, CodecTag) {
        let video = self
            .video_codec
            .as_deref()
            .map_or(CodecTag::Unknown, CodecTag::parse);
        let audio = self
            .audio_codec
            .as_deref()
            .map_or(CodecTag::Unknown, CodecTag::parse);
        let success = video != CodecTag::Unknown || audio != CodecTag::Unknown;
        (success, video, audio)
    }
}

/// A single-track component of an adaptive manifest.
///
/// Carries the same shape as [`Stream`] plus the manifest-relative
/// identifier and optional shared initialization/index segment ranges.
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveStream {
    /// Common stream fields (URI, dimensions, codec tags, bitrate).
    #[serde(flatten)]
    pub stream: Stream,
    /// Manifest format this component was described in.
    pub manifest: ManifestFormat,
    /// Manifest-relative identifier (e.g. DASH `Representation@id`).
    pub repr_id: Option<String>,
    /// Byte range of the shared initialization segment, if any.
    pub init_range: Option<ByteRange>,
    /// Byte range of the segment index, if any.
    pub index_range: Option<ByteRange>,
}

impl AdaptiveStream {
    /// New adaptive component wrapping common stream fields.
    #[must_use]
    pub fn new(stream: Stream, manifest: ManifestFormat) -> Self {
        Self {
            stream,
            manifest,
            repr_id: None,
            init_range: None,
            index_range: None,
        }
    }

    /// Normalized codec pair, see [`Stream::get_codecs`].
    #[must_use]
    pub fn get_codecs(&self) -> (bool, CodecTag, CodecTag) {
        self.stream.get_codecs()
    }
}

/// Immutable result of a media info extraction.
#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    id: Option<String>,
    title: String,
    description: Option<String>,
    duration: u64,
    streams: Vec<Stream>,
    adaptive_streams: Vec<AdaptiveStream>,
}

impl MediaInfo {
    /// Start building a new media info aggregate.
    #[must_use]
    pub fn builder() -> MediaInfoBuilder {
        MediaInfoBuilder::default()
    }

    /// Service-specific media identifier, if the service exposes one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Media title; empty when the service did not provide one.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Longer description, if available.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Duration in seconds; 0 means unknown (e.g. live).
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Progressive stream variants, in discovery order.
    #[must_use]
    pub fn get_streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Adaptive stream components, in discovery order.
    #[must_use]
    pub fn get_adaptive_streams(&self) -> &[AdaptiveStream] {
        &self.adaptive_streams
    }

    /// True when not a single playable variant was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.adaptive_streams.is_empty()
    }
}

/// Append-only builder for [`MediaInfo`].
///
/// Entries with an empty URI are dropped at this boundary rather than
/// returned malformed.
#[derive(Debug, Default)]
pub struct MediaInfoBuilder {
    id: Option<String>,
    title: String,
    description: Option<String>,
    duration: u64,
    streams: Vec<Stream>,
    adaptive_streams: Vec<AdaptiveStream>,
}

impl MediaInfoBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Duration in seconds; pass 0 when unknown.
    #[must_use]
    pub fn duration(mut self, seconds: u64) -> Self {
        self.duration = seconds;
        self
    }

    /// Append a progressive stream. Silently dropped if its URI is empty.
    pub fn add_stream(&mut self, stream: Stream) {
        if stream.uri.is_empty() {
            tracing::debug!("dropping progressive entry without URI");
            return;
        }
        self.streams.push(stream);
    }

    /// Append an adaptive component. Silently dropped if its URI is empty.
    pub fn add_adaptive_stream(&mut self, stream: AdaptiveStream) {
        if stream.stream.uri.is_empty() {
            tracing::debug!("dropping adaptive entry without URI");
            return;
        }
        self.adaptive_streams.push(stream);
    }

    /// Append a batch of progressive streams.
    pub fn extend_streams(&mut self, streams: impl IntoIterator<Item = Stream>) {
        for s in streams {
            self.add_stream(s);
        }
    }

    /// Append a batch of adaptive components.
    pub fn extend_adaptive_streams(&mut self, streams: impl IntoIterator<Item = AdaptiveStream>) {
        for s in streams {
            self.add_adaptive_stream(s);
        }
    }

    /// Freeze into an immutable [`MediaInfo`].
    #[must_use]
    pub fn build(self) -> MediaInfo {
        MediaInfo {
            id: self.id,
            title: self.title,
            description: self.description,
            duration: self.duration,
            streams: self.streams,
            adaptive_streams: self.adaptive_streams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_requires_end_after_start() {
        assert_eq!(ByteRange::new(0, 0), None);
        assert_eq!(ByteRange::new(100, 50), None);
        assert_eq!(
            ByteRange::new(0, 742),
            Some(ByteRange { start: 0, end: 742 })
        );
    }

    #[test]
    fn builder_drops_entries_without_uri() {
        let mut builder = MediaInfo::builder().title("t");
        builder.add_stream(Stream {
            uri: String::new(),
            ..Stream::default()
        });
        builder.add_stream(Stream {
            uri: "https://cdn.example.com/v.mp4".into(),
            ..Stream::default()
        });
        builder.add_adaptive_stream(AdaptiveStream::new(Stream::default(), ManifestFormat::Dash));

        let info = builder.build();
        assert_eq!(info.get_streams().len(), 1);
        assert!(info.get_adaptive_streams().is_empty());
    }

    #[test]
    fn codecs_flag_false_when_both_unknown() {
        let stream = Stream {
            uri: "https://cdn.example.com/v".into(),
            video_codec: Some("mystery-codec".into()),
            ..Stream::default()
        };
        let (success, video, audio) = stream.get_codecs();
        assert!(!success);
        assert_eq!(video, CodecTag::Unknown);
        assert_eq!(audio, CodecTag::Unknown);
    }

    #[test]
    fn codecs_flag_true_when_one_side_resolves() {
        let stream = Stream {
            uri: "https://cdn.example.com/v".into(),
            video_codec: Some("avc1.64001f".into()),
            ..Stream::default()
        };
        let (success, video, audio) = stream.get_codecs();
        assert!(success);
        assert_eq!(video, CodecTag::Avc);
        assert_eq!(audio, CodecTag::Unknown);
    }
}
