//! `mediascout` - Pluggable media information extraction
//!
//! Given a media-page or media-resource URI, `mediascout` determines
//! which site handler can process it, fetches and parses that service's
//! metadata (JSON APIs, embedded-page JSON, HLS/DASH manifests), and
//! normalizes the results into a uniform stream-description model.
//!
//! # Features
//!
//! - **Handler dispatch**: priority-ordered registry mapping URIs to
//!   site handlers, extensible at runtime
//! - **Resilient fetching**: bounded retries with backoff, per-call
//!   cancellation, typed network failures
//! - **Manifest parsing**: HLS master playlists, DASH MPD, embedded
//!   player JSON, loosely-structured API stream tables
//! - **Normalization**: canonical codec tags across service vocabularies
//!
//! # Example
//!
//! ```rust,no_run
//! use mediascout::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new()?;
//!     let info = client
//!         .fetch_media_info("https://odysee.com/@channel/some-video")
//!         .await?;
//!
//!     println!("{} ({} streams)", info.title(), info.get_streams().len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod model;
pub mod site;

pub use client::{Client, ClientBuilder, RequestOptions};
pub use codec::CodecTag;
pub use error::Error;
pub use fetch::{FetchError, FetchOptions, Fetcher, Payload};
pub use manifest::{ParseError, ParsedStreams};
pub use model::{AdaptiveStream, ByteRange, ManifestFormat, MediaInfo, MediaInfoBuilder, Stream};
pub use site::{HandlerError, HandlerRegistry, MatchRule, WebsiteHandler};

/// Version of mediascout
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
