//! Website handlers and the dispatch registry.
//!
//! A [`WebsiteHandler`] encapsulates one service's quirks: which fetch
//! calls to issue, which manifest parsers to run on each payload, and
//! how to assemble the final [`MediaInfo`]. Handlers are registered in
//! a [`HandlerRegistry`] together with a [`MatchRule`] and a priority;
//! [`HandlerRegistry::dispatch`] picks the handler for a URI.
//!
//! # Dispatch order
//!
//! Handlers are evaluated in descending priority; among equal
//! priorities, the first registered wins. This is deterministic and
//! part of the contract, since two handlers may both claim a host.
//!
//! # Example
//!
//! ```rust,no_run
//! use mediascout::site::HandlerRegistry;
//! use url::Url;
//!
//! let registry = HandlerRegistry::with_default_handlers();
//! let url = Url::parse("https://odysee.com/@channel/video")?;
//!
//! if let Some(handler) = registry.dispatch(&url) {
//!     println!("handled by {}", handler.name());
//! }
//! # Ok::<(), url::ParseError>(())
//! ```

pub mod generic;
pub mod odysee;
pub mod peertube;
pub mod twitch;

use std::cmp::Reverse;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::client::RequestOptions;
use crate::fetch::{FetchError, Fetcher};
use crate::manifest::ParseError;
use crate::model::MediaInfo;

/// Extraction failure inside a handler, naming the failed step.
///
/// Multi-step handlers treat any step failure as fatal: no partial
/// [`MediaInfo`] is ever returned.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("fetch step `{step}` failed: {source}")]
    Fetch {
        step: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("parse step `{step}` failed: {source}")]
    Parse {
        step: &'static str,
        #[source]
        source: ParseError,
    },
}

impl HandlerError {
    pub(crate) fn fetch(step: &'static str, source: FetchError) -> Self {
        Self::Fetch { step, source }
    }

    pub(crate) fn parse(step: &'static str, source: ParseError) -> Self {
        Self::Parse { step, source }
    }
}

/// Capability interface implemented by every site handler.
#[async_trait]
pub trait WebsiteHandler: Send + Sync {
    /// Short lowercase handler name (e.g. `"odysee"`).
    fn name(&self) -> &'static str;

    /// Rule used when the handler is registered without an explicit one.
    fn match_rule(&self) -> MatchRule;

    /// Fetch and assemble the media info for a URI this handler claimed.
    async fn extract(
        &self,
        uri: &Url,
        fetcher: &Fetcher,
        options: &RequestOptions,
    ) -> Result<MediaInfo, HandlerError>;
}

/// Predicate deciding whether a handler can process a URI.
#[derive(Clone)]
pub enum MatchRule {
    /// Host equals, or is a subdomain of, any listed host
    /// (case-insensitive, `www.`-agnostic).
    Hosts(Vec<String>),
    /// Host match plus a required path prefix.
    HostPath {
        hosts: Vec<String>,
        path_prefix: String,
    },
    /// URI path ends with one of the listed suffixes, any host.
    PathSuffix(Vec<String>),
    /// Arbitrary predicate.
    Custom(Arc<dyn Fn(&Url) -> bool + Send + Sync>),
}

impl MatchRule {
    /// Convenience constructor for a host list.
    #[must_use]
    pub fn hosts(hosts: &[&str]) -> Self {
        Self::Hosts(hosts.iter().map(ToString::to_string).collect())
    }

    /// Evaluate the rule against a parsed URI.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Self::Hosts(hosts) => host_matches(url, hosts),
            Self::HostPath { hosts, path_prefix } => {
                host_matches(url, hosts) && url.path().starts_with(path_prefix.as_str())
            }
            Self::PathSuffix(suffixes) => {
                let path = url.path();
                suffixes.iter().any(|s| path.ends_with(s.as_str()))
            }
            Self::Custom(predicate) => predicate(url),
        }
    }
}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosts(hosts) => f.debug_tuple("Hosts").field(hosts).finish(),
            Self::HostPath { hosts, path_prefix } => f
                .debug_struct("HostPath")
                .field("hosts", hosts)
                .field("path_prefix", path_prefix)
                .finish(),
            Self::PathSuffix(suffixes) => f.debug_tuple("PathSuffix").field(suffixes).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn host_matches(url: &Url, hosts: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    hosts.iter().any(|candidate| {
        let candidate = candidate.to_ascii_lowercase();
        host == candidate || host.ends_with(&format!(".{candidate}"))
    })
}

struct Entry {
    handler: Arc<dyn WebsiteHandler>,
    rule: MatchRule,
    priority: i32,
    seq: usize,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    next_seq: usize,
}

/// Priority-ordered handler registry.
///
/// Reads (dispatch) are concurrent; registration takes a write lock,
/// so plugins may still be added while other threads dispatch.
#[derive(Default)]
pub struct HandlerRegistry {
    inner: RwLock<Inner>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in handlers.
    ///
    /// The generic manifest handler is registered at a low priority so
    /// that service handlers win for URIs they both claim.
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let registry = Self::new();
        registry.register_default(Arc::new(odysee::OdyseeHandler), 0);
        registry.register_default(Arc::new(twitch::TwitchHandler), 0);
        registry.register_default(Arc::new(peertube::PeerTubeHandler::new()), 0);
        registry.register_default(Arc::new(generic::GenericHandler), -100);
        registry
    }

    /// Register a handler under an explicit match rule and priority.
    pub fn register(&self, handler: Arc<dyn WebsiteHandler>, rule: MatchRule, priority: i32) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(Entry {
            handler,
            rule,
            priority,
            seq,
        });
        inner.entries.sort_by_key(|e| (Reverse(e.priority), e.seq));
    }

    /// Register a handler under its own default match rule.
    pub fn register_default(&self, handler: Arc<dyn WebsiteHandler>, priority: i32) {
        let rule = handler.match_rule();
        self.register(handler, rule, priority);
    }

    /// Select the handler for a URI.
    ///
    /// `None` is the normal "nobody speaks for this URI" outcome, not a
    /// programming error.
    #[must_use]
    pub fn dispatch(&self, url: &Url) -> Option<Arc<dyn WebsiteHandler>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        for entry in &inner.entries {
            if entry.rule.matches(url) {
                debug!(handler = entry.handler.name(), %url, "matched handler");
                return Some(Arc::clone(&entry.handler));
            }
        }
        None
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .entries
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
