//! Batch fetching of stylesheet text.
//!
//! [`BatchFetcher`] requests every URL of a batch at once, checks that each
//! body looks like CSS, and reports results in the order the URLs were given,
//! whatever order the responses arrive in. A failed URL still produces a
//! slot (an empty string), so a batch always completes.

pub mod transport;

pub use transport::{LegacyCorsTransport, Request, Response, StandardTransport, Transport};

use crate::config::FetcherConfig;
use crate::error::FetchError;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// What a success hook wants done with the text it was shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HookOutcome {
    /// Use the text unchanged.
    #[default]
    Keep,
    /// Use this text instead. An empty replacement counts as [`Keep`](Self::Keep).
    Replace(String),
    /// Drop the text; the slot becomes an empty string. Not an error.
    Discard,
}

impl HookOutcome {
    /// Apply the outcome to `text`.
    pub fn apply(self, text: String) -> String {
        match self {
            Self::Discard => String::new(),
            Self::Replace(replacement) if !replacement.is_empty() => replacement,
            Self::Replace(_) | Self::Keep => text,
        }
    }
}

impl From<bool> for HookOutcome {
    fn from(keep: bool) -> Self {
        if keep {
            Self::Keep
        } else {
            Self::Discard
        }
    }
}

impl From<String> for HookOutcome {
    fn from(text: String) -> Self {
        Self::Replace(text)
    }
}

impl From<&str> for HookOutcome {
    fn from(text: &str) -> Self {
        Self::Replace(text.to_string())
    }
}

impl From<Option<String>> for HookOutcome {
    fn from(text: Option<String>) -> Self {
        text.map_or(Self::Keep, Self::Replace)
    }
}

/// Per-request callbacks invoked while a batch runs.
///
/// `index` is the URL's position in the batch. `url` is the URL exactly as it
/// was handed to the fetcher.
pub trait FetchHooks {
    /// Runs synchronously right before dispatch.
    fn before_send(&self, _request: &mut Request, _url: &str, _index: usize) {}

    /// Runs when a valid body arrives.
    fn on_success(&self, _text: &str, _url: &str, _index: usize) -> HookOutcome {
        HookOutcome::Keep
    }

    /// Runs once per failed URL.
    fn on_error(&self, _error: &FetchError, _url: &str, _index: usize) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl FetchHooks for NoHooks {}

type BeforeSendFn = Box<dyn Fn(&mut Request, &str, usize) + Send + Sync>;
type SuccessFn = Box<dyn Fn(&str, &str, usize) -> HookOutcome + Send + Sync>;
type ErrorFn = Box<dyn Fn(&FetchError, &str, usize) + Send + Sync>;
type CompleteFn = Box<dyn Fn(&[String]) + Send + Sync>;

/// Options for [`BatchFetcher::fetch_all`].
#[derive(Default)]
pub struct FetchOptions {
    mime_type: Option<String>,
    before_send: Option<BeforeSendFn>,
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every response as this MIME type.
    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn before_send<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, &str, usize) + Send + Sync + 'static,
    {
        self.before_send = Some(Box::new(f));
        self
    }

    pub fn on_success<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, usize) -> R + Send + Sync + 'static,
        R: Into<HookOutcome>,
    {
        self.on_success = Some(Box::new(move |text, url, i| f(text, url, i).into()));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&FetchError, &str, usize) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Runs once, after every URL has either succeeded or failed.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl FetchHooks for FetchOptions {
    fn before_send(&self, request: &mut Request, url: &str, index: usize) {
        if let Some(f) = &self.before_send {
            f(request, url, index);
        }
    }

    fn on_success(&self, text: &str, url: &str, index: usize) -> HookOutcome {
        self.on_success
            .as_ref()
            .map_or(HookOutcome::Keep, |f| f(text, url, index))
    }

    fn on_error(&self, error: &FetchError, url: &str, index: usize) {
        if let Some(f) = &self.on_error {
            f(error, url, index);
        }
    }
}

/// Fetches batches of URLs concurrently through one [`Transport`].
#[derive(Clone)]
pub struct BatchFetcher {
    transport: Arc<dyn Transport>,
}

impl BatchFetcher {
    /// Build a fetcher whose transport strategy is chosen from `config`.
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        Ok(Self {
            transport: transport::transport_for(config)?,
        })
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch `urls` and return their texts in input order.
    ///
    /// Failed URLs come back as empty strings after `on_error` has been told
    /// about them. `on_complete` fires exactly once, with the same list that
    /// is returned.
    pub async fn fetch_all<I, S>(&self, urls: I, options: &FetchOptions) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        let texts: Vec<String> = self
            .fetch_each(&urls, options.mime_type.as_deref(), options)
            .await
            .into_iter()
            .map(Result::unwrap_or_default)
            .collect();

        if let Some(complete) = &options.on_complete {
            complete(&texts);
        }
        texts
    }

    /// Fetch `urls` concurrently, keeping each outcome.
    ///
    /// `hooks` fire as individual requests settle. The returned vector is
    /// index-aligned with `urls`.
    pub async fn fetch_each(
        &self,
        urls: &[String],
        mime_type: Option<&str>,
        hooks: &dyn FetchHooks,
    ) -> Vec<Result<String, FetchError>> {
        debug!(count = urls.len(), "fetching batch");

        let results = join_all(
            urls.iter()
                .enumerate()
                .map(|(index, url)| self.fetch_one(index, url, mime_type, hooks)),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(count = urls.len(), failed, "batch complete");
        results
    }

    async fn fetch_one(
        &self,
        index: usize,
        raw_url: &str,
        mime_type: Option<&str>,
        hooks: &dyn FetchHooks,
    ) -> Result<String, FetchError> {
        let result = match Url::parse(raw_url) {
            Ok(url) => {
                let mut request = Request::new(url);
                request.mime_type = mime_type.map(String::from);
                hooks.before_send(&mut request, raw_url, index);

                self.transport
                    .send(request)
                    .await
                    .and_then(validate_response)
            }
            Err(e) => Err(FetchError::InvalidUrl {
                url: raw_url.to_string(),
                reason: e.to_string(),
            }),
        };

        match result {
            Ok(text) => Ok(hooks.on_success(&text, raw_url, index).apply(text)),
            Err(err) => {
                warn!(url = raw_url, error = %err, "fetch failed");
                hooks.on_error(&err, raw_url, index);
                Err(err)
            }
        }
    }
}

/// Accept a response only when its status is 2xx (or `0`, for schemes
/// without statuses) and its body plausibly is CSS.
pub fn validate_response(response: Response) -> Result<String, FetchError> {
    let Response { status, body } = response;

    if !(status == 0 || (200..300).contains(&status)) {
        return Err(FetchError::Status { status });
    }

    match body_problem(&body) {
        None => Ok(body),
        Some(reason) => Err(FetchError::InvalidPayload { status, reason }),
    }
}

/// Empty bodies and bodies starting with `<` (an HTML error page served with
/// a success status) are not stylesheets.
fn body_problem(body: &str) -> Option<&'static str> {
    match body.trim_start().chars().next() {
        None => Some("empty body"),
        Some('<') => Some("html document"),
        Some(_) => None,
    }
}
