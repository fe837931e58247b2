//! Stable error taxonomy for the client facade.
//!
//! Everything a caller can observe from [`crate::Client`] is one of
//! four kinds. Fetcher- and parser-internal errors are re-wrapped at
//! the handler boundary, so the set below is the whole contract.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::manifest::ParseError;
use crate::site::HandlerError;

/// Extraction failure as surfaced to callers.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered handler claims the URI. A normal outcome for URIs
    /// outside the supported services, not a programming error.
    #[error("no handler for URI `{0}`")]
    NotSupported(String),

    /// The network layer failed after exhausting retries.
    #[error("fetch failed during `{step}`: {source}")]
    FetchFailed {
        step: &'static str,
        #[source]
        source: FetchError,
    },

    /// An upstream document was unrecognizable or yielded nothing
    /// playable.
    #[error("parse failed during `{step}`: {source}")]
    ParseFailed {
        step: &'static str,
        #[source]
        source: ParseError,
    },

    /// The caller's cancellation signal aborted the extraction.
    #[error("extraction cancelled")]
    Cancelled,
}

impl Error {
    /// Upstream HTTP status code, when the failure carries one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::FetchFailed { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<HandlerError> for Error {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Fetch {
                source: FetchError::Cancelled,
                ..
            } => Self::Cancelled,
            HandlerError::Fetch { step, source } => Self::FetchFailed { step, source },
            HandlerError::Parse { step, source } => Self::ParseFailed { step, source },
        }
    }
}
