//! Client facade: the single entry point for callers.
//!
//! A [`Client`] owns the shared [`Fetcher`] and the handler registry.
//! [`Client::fetch_media_info`] dispatches the URI to a handler, runs
//! its extraction, and maps every internal failure onto the stable
//! [`Error`] taxonomy. Concurrent calls are independent: the only
//! shared state is the connection pool and the read-mostly registry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::error::Error;
use crate::fetch::{FetchOptions, Fetcher, FetcherConfig};
use crate::model::MediaInfo;
use crate::site::{HandlerRegistry, MatchRule, WebsiteHandler};

/// Per-call options for [`Client::fetch_media_info_with`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra HTTP headers sent with every fetch of this call.
    pub headers: Vec<(String, String)>,
    /// `Cookie` header value sent with every fetch of this call.
    pub cookies: Option<String>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
    /// Cancels in-flight fetches; the call fails with
    /// [`Error::Cancelled`].
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Base fetch options (GET) carrying this call's headers, cookies,
    /// timeout, and cancellation token. Handlers adjust method/body per
    /// step.
    #[must_use]
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            ..FetchOptions::default()
        }
    }
}

/// Media information extraction client.
///
/// # Example
///
/// ```rust,no_run
/// use mediascout::Client;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new()?;
/// let info = client
///     .fetch_media_info("https://odysee.com/@channel/some-video")
///     .await?;
///
/// println!("{} ({}s)", info.title(), info.duration());
/// for stream in info.get_streams() {
///     println!("  {}x{} {}", stream.width, stream.height, stream.uri);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    fetcher: Fetcher,
    registry: Arc<HandlerRegistry>,
}

impl Client {
    /// Client with the default fetcher configuration and the built-in
    /// handlers.
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The handler registry, e.g. for registering plugins at runtime.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Extract media info for a URI with default options.
    pub async fn fetch_media_info(&self, uri: &str) -> Result<MediaInfo, Error> {
        self.fetch_media_info_with(uri, &RequestOptions::default())
            .await
    }

    /// Extract media info for a URI.
    ///
    /// Success is all-or-nothing: on any failure the call returns an
    /// [`Error`] and never a partially-populated result (individually
    /// malformed stream entries inside an otherwise valid document are
    /// dropped by the parsers, which is not a failure).
    #[instrument(skip(self, options), fields(uri = %uri))]
    pub async fn fetch_media_info_with(
        &self,
        uri: &str,
        options: &RequestOptions,
    ) -> Result<MediaInfo, Error> {
        let url = Url::parse(uri).map_err(|_| Error::NotSupported(uri.to_string()))?;
        let handler = self
            .registry
            .dispatch(&url)
            .ok_or_else(|| Error::NotSupported(uri.to_string()))?;

        debug!(handler = handler.name(), "dispatched");
        let info = handler
            .extract(&url, &self.fetcher, options)
            .await
            .map_err(Error::from)?;

        debug!(
            streams = info.get_streams().len(),
            adaptive = info.get_adaptive_streams().len(),
            "extraction complete"
        );
        Ok(info)
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: FetcherConfig,
    registry: Option<Arc<HandlerRegistry>>,
    extra: Vec<(Arc<dyn WebsiteHandler>, MatchRule, i32)>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: FetcherConfig::default(),
            registry: None,
            extra: Vec::new(),
        }
    }
}

impl ClientBuilder {
    /// Override the User-Agent sent with every request.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Default timeout for each fetch attempt.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Retries after the first attempt for transient failures.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Replace the whole registry (skips the built-in handlers).
    #[must_use]
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an extra handler on top of the built-ins.
    #[must_use]
    pub fn handler(
        mut self,
        handler: Arc<dyn WebsiteHandler>,
        rule: MatchRule,
        priority: i32,
    ) -> Self {
        self.extra.push((handler, rule, priority));
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        let fetcher = Fetcher::with_config(&self.config).map_err(|source| Error::FetchFailed {
            step: "init",
            source,
        })?;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(HandlerRegistry::with_default_handlers()));
        for (handler, rule, priority) in self.extra {
            registry.register(handler, rule, priority);
        }
        Ok(Client { fetcher, registry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_host_is_not_supported() {
        let client = Client::new().unwrap();
        let err = client
            .fetch_media_info("https://unknown.test/x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn invalid_uri_is_not_supported() {
        let client = Client::new().unwrap();
        let err = client.fetch_media_info("not a uri").await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }
}
