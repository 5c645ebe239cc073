//! Transport strategies used by the batch fetcher.
//!
//! A [`Transport`] turns one [`Request`] into one [`Response`]. It does not
//! judge whether the body is usable CSS; that is the fetcher's job. Two
//! strategies exist and one is picked when the fetcher is built:
//!
//! - [`StandardTransport`]: `http(s)` through `reqwest`, `data:` through
//!   `data-url`, and `file:` through `tokio::fs` (reported with status 0).
//! - [`LegacyCorsTransport`]: wraps the standard one for environments where
//!   cross-origin requests cannot be customized and must keep the document's
//!   protocol.

use crate::config::{CorsSupport, FetcherConfig};
use crate::error::FetchError;
use async_trait::async_trait;
use data_url::DataUrl;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// An outgoing request, open to annotation by `before_send` hooks.
#[derive(Debug, Clone)]
pub struct Request {
    url: Url,
    /// Extra headers to send.
    pub headers: HeaderMap,
    /// Decode the body as this MIME type regardless of what the server says.
    pub mime_type: Option<String>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            mime_type: None,
            timeout: None,
        }
    }

    /// Absolute target URL. Hooks may annotate a request but not retarget it.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Add a header. Returns `false` and leaves the request unchanged when the
    /// name or value is not a valid HTTP header.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                true
            }
            _ => false,
        }
    }

    /// The same target with every annotation stripped.
    fn plain(&self) -> Self {
        Self {
            url: self.url.clone(),
            headers: HeaderMap::new(),
            mime_type: None,
            timeout: self.timeout,
        }
    }
}

/// Raw outcome of a request that reached its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status; `0` when the scheme has no status (local files).
    pub status: u16,
    /// Decoded body text.
    pub body: String,
}

/// Loads the body behind a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, FetchError>;
}

/// Build the transport strategy matching `config`.
pub fn transport_for(config: &FetcherConfig) -> Result<Arc<dyn Transport>, FetchError> {
    let standard = StandardTransport::new(config)?;
    match (config.cors, config.origin_url()) {
        (CorsSupport::Full, _) => Ok(Arc::new(standard)),
        (CorsSupport::SameProtocolOnly, Some(origin)) => {
            Ok(Arc::new(LegacyCorsTransport::new(standard, origin)))
        }
        (CorsSupport::SameProtocolOnly, None) => {
            warn!("legacy cross-origin transport requested without an origin, using standard transport");
            Ok(Arc::new(standard))
        }
    }
}

// ── Standard ────────────────────────────────────────────────────────────────

/// Default transport: `http`, `https`, `data` and `file` URLs.
#[derive(Debug, Clone)]
pub struct StandardTransport {
    client: reqwest::Client,
}

impl StandardTransport {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send_http(&self, request: Request) -> Result<Response, FetchError> {
        let mut builder = self.client.get(request.url).headers(request.headers);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // With an override the declared content type is irrelevant: decode the
        // raw bytes as text, as a browser does after overrideMimeType().
        let body = if request.mime_type.is_some() {
            decode_text(&response.bytes().await?)
        } else {
            strip_bom(response.text().await?)
        };

        Ok(Response { status, body })
    }
}

#[async_trait]
impl Transport for StandardTransport {
    async fn send(&self, request: Request) -> Result<Response, FetchError> {
        match request.url.scheme() {
            "http" | "https" => self.send_http(request).await,
            "data" => {
                let data_url = DataUrl::process(request.url.as_str())
                    .map_err(|e| FetchError::DataUrl(format!("{e:?}")))?;
                let (bytes, _fragment) = data_url
                    .decode_to_vec()
                    .map_err(|e| FetchError::DataUrl(format!("{e:?}")))?;
                Ok(Response {
                    status: 200,
                    body: decode_text(&bytes),
                })
            }
            "file" => {
                let path = request
                    .url
                    .to_file_path()
                    .map_err(|()| FetchError::InvalidUrl {
                        url: request.url.to_string(),
                        reason: "not a local file path".to_string(),
                    })?;
                let bytes = tokio::fs::read(&path).await?;
                Ok(Response {
                    status: 0,
                    body: decode_text(&bytes),
                })
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

// ── Legacy cross-origin ─────────────────────────────────────────────────────

/// Transport for environments without full cross-origin support.
///
/// Same-origin requests go through untouched. Cross-origin requests are sent
/// bare (no headers, no MIME override) and only when they keep the origin's
/// scheme; otherwise they fail immediately without touching the network.
#[derive(Debug, Clone)]
pub struct LegacyCorsTransport {
    inner: StandardTransport,
    origin: Url,
}

impl LegacyCorsTransport {
    pub fn new(inner: StandardTransport, origin: Url) -> Self {
        Self { inner, origin }
    }

    /// Hosts are compared without ports. Schemes without a host (`data:`,
    /// `file:`) never count as cross-origin.
    fn is_cross_origin(&self, url: &Url) -> bool {
        match (url.host_str(), self.origin.host_str()) {
            (Some(target), Some(origin)) => !target.eq_ignore_ascii_case(origin),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

#[async_trait]
impl Transport for LegacyCorsTransport {
    async fn send(&self, request: Request) -> Result<Response, FetchError> {
        if !self.is_cross_origin(&request.url) {
            return self.inner.send(request).await;
        }

        if request.url.scheme() != self.origin.scheme() {
            warn!(
                url = %request.url,
                origin = %self.origin,
                "cross-origin requests must use the same protocol"
            );
            return Err(FetchError::ProtocolMismatch {
                url: request.url.to_string(),
                origin: self.origin.origin().ascii_serialization(),
            });
        }

        debug!(url = %request.url, "sending bare cross-origin request");
        self.inner.send(request.plain()).await
    }
}

fn decode_text(bytes: &[u8]) -> String {
    strip_bom(String::from_utf8_lossy(bytes).into_owned())
}

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}
