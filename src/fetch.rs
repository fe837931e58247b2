//! Resilient HTTP fetching.
//!
//! [`Fetcher`] wraps a shared `reqwest` connection pool and gives
//! website handlers one call: [`Fetcher::fetch`]. It retries transient
//! failures (timeouts, connection errors, 5xx) with linear backoff,
//! surfaces 4xx immediately, and races every attempt against an
//! optional cancellation token. Payloads come back as raw bytes plus
//! response metadata; interpreting the content is the caller's job.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("mediascout/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Network-layer failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("upstream returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("invalid request URL `{0}`")]
    InvalidUrl(String),

    #[error("HTTP client initialization failed: {0}")]
    Init(String),
}

impl FetchError {
    /// Upstream HTTP status, when the failure carries one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether retrying the same request can reasonably succeed.
    /// 4xx means the request itself is wrong and is never retried.
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpStatus(code) => *code >= 500,
            Self::Cancelled | Self::InvalidUrl(_) | Self::Init(_) => false,
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_builder() {
            Self::InvalidUrl(err.url().map(ToString::to_string).unwrap_or_default())
        } else {
            Self::ConnectionFailed(err.to_string())
        }
    }
}

/// HTTP method for a fetch. Handlers only ever need these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
}

/// Per-request options for [`Fetcher::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: RequestMethod,
    /// Extra headers appended to the client defaults.
    pub headers: Vec<(String, String)>,
    /// Value for the `Cookie` header, if any.
    pub cookies: Option<String>,
    /// Request body (POST).
    pub body: Option<String>,
    /// `Content-Type` for the body.
    pub content_type: Option<String>,
    /// Overrides the client-level timeout for this request.
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
    /// Cancels in-flight attempts and skips further retries.
    pub cancel: Option<CancellationToken>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: RequestMethod::Get,
            headers: Vec::new(),
            cookies: None,
            body: None,
            content_type: None,
            timeout: None,
            follow_redirects: true,
            cancel: None,
        }
    }
}

impl FetchOptions {
    /// Plain GET with defaults.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with the given body and content type.
    #[must_use]
    pub fn post(body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Post,
            body: Some(body.into()),
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    /// Append one extra header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Raw fetch result: body bytes plus response metadata.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Bytes,
    pub status: u16,
    pub headers: HeaderMap,
    /// URL after redirects.
    pub final_url: String,
}

impl Payload {
    /// Body decoded as UTF-8 (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }

    /// `Content-Type` response header, if present and valid UTF-8.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Configuration for building a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base backoff; attempt N sleeps `backoff * N`.
    pub backoff: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// HTTP fetcher shared by all handlers of a client.
pub struct Fetcher {
    client: Client,
    no_redirect: Client,
    max_retries: u32,
    backoff: Duration,
}

impl Fetcher {
    /// Fetcher with default configuration.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(&FetcherConfig::default())
    }

    pub fn with_config(config: &FetcherConfig) -> Result<Self, FetchError> {
        let builder = |redirects: bool| {
            Client::builder()
                .user_agent(config.user_agent.clone())
                .use_rustls_tls()
                .brotli(true)
                .zstd(true)
                .gzip(true)
                .deflate(true)
                .cookie_store(true)
                .tcp_nodelay(true)
                .pool_max_idle_per_host(8)
                .pool_idle_timeout(Duration::from_secs(90))
                .connect_timeout(config.connect_timeout)
                .timeout(config.timeout)
                .redirect(if redirects {
                    reqwest::redirect::Policy::limited(10)
                } else {
                    reqwest::redirect::Policy::none()
                })
                .build()
                .map_err(|e| FetchError::Init(e.to_string()))
        };

        Ok(Self {
            client: builder(true)?,
            no_redirect: builder(false)?,
            max_retries: config.max_retries,
            backoff: config.backoff,
        })
    }

    /// Fetch a URL, retrying transient failures.
    ///
    /// Returns the raw payload without interpreting the content. Any
    /// non-2xx status is an error; 4xx is surfaced immediately while
    /// timeouts, connection failures, and 5xx are retried up to the
    /// configured count.
    #[instrument(skip(self, options), fields(url = %url))]
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Payload, FetchError> {
        url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let mut attempt = 0;
        loop {
            if let Some(token) = &options.cancel {
                if token.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
            }

            let result = if let Some(token) = &options.cancel {
                tokio::select! {
                    () = token.cancelled() => Err(FetchError::Cancelled),
                    result = self.send_once(url, options) => result,
                }
            } else {
                self.send_once(url, options).await
            };

            match result {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "transient fetch failure, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetch and return the body as text.
    pub async fn fetch_text(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<String, FetchError> {
        Ok(self.fetch(url, options).await?.text())
    }

    async fn send_once(&self, url: &str, options: &FetchOptions) -> Result<Payload, FetchError> {
        let client = if options.follow_redirects {
            &self.client
        } else {
            &self.no_redirect
        };

        let method = match options.method {
            RequestMethod::Get => Method::GET,
            RequestMethod::Post => Method::POST,
        };

        let mut request = client.request(method, url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = &options.cookies {
            request = request.header(COOKIE, cookies.as_str());
        }
        if let Some(content_type) = &options.content_type {
            request = request.header(CONTENT_TYPE, content_type.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        debug!(status = status.as_u16(), len = bytes.len(), "response received");

        Ok(Payload {
            bytes,
            status: status.as_u16(),
            headers,
            final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_fetcher() -> Fetcher {
        Fetcher::with_config(&FetcherConfig {
            backoff: Duration::from_millis(10),
            ..FetcherConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn transient_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::HttpStatus(503).is_transient());
        assert!(!FetchError::HttpStatus(404).is_transient());
        assert!(!FetchError::Cancelled.is_transient());
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let payload = quick_fetcher()
            .fetch(&format!("{}/flaky", server.uri()), &FetchOptions::get())
            .await
            .unwrap();
        assert_eq!(payload.text(), "ok");
    }

    #[tokio::test]
    async fn does_not_retry_4xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = quick_fetcher()
            .fetch(&format!("{}/missing", server.uri()), &FetchOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn post_sends_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(header("content-type", "application/json-rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let options = FetchOptions::post(r#"{"method":"get"}"#, "application/json-rpc");
        quick_fetcher()
            .fetch(&format!("{}/rpc", server.uri()), &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn redirects_can_be_disabled_per_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let fetcher = quick_fetcher();
        let url = format!("{}/old", server.uri());

        let followed = fetcher.fetch(&url, &FetchOptions::get()).await.unwrap();
        assert_eq!(followed.text(), "moved");
        assert!(followed.final_url.ends_with("/new"));

        let options = FetchOptions {
            follow_redirects: false,
            ..FetchOptions::get()
        };
        let err = fetcher.fetch(&url, &options).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(302)));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_send() {
        let token = CancellationToken::new();
        token.cancel();

        let err = quick_fetcher()
            .fetch(
                "https://unreachable.invalid/x",
                &FetchOptions::get().cancel(token),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[test]
    fn rejects_invalid_url() {
        let fetcher = quick_fetcher();
        let err =
            tokio_test::block_on(fetcher.fetch("not a url", &FetchOptions::get())).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
