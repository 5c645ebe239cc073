//! Collect the CSS of an HTML document in document order.
//!
//! Two layers:
//!
//! - [`BatchFetcher`] fetches lists of stylesheet URLs concurrently and
//!   reports the results in input order.
//! - [`CssAggregator`] finds every `<style>` and stylesheet `<link>` in a
//!   [`Document`], obtains its text, inlines nested `@import`s and returns one
//!   entry per node, joined in discovery order.
//!
//! ```no_run
//! use css_harvest::{BatchFetcher, CssAggregator, Document, FetcherConfig, HtmlDocument, Options};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = HtmlDocument::parse_at("<style>@import 'base.css';</style>", "https://example.com/")?;
//! let fetcher = BatchFetcher::new(&FetcherConfig::from_env().with_origin(doc.base_url()))?;
//!
//! let harvest = CssAggregator::new(&doc, &fetcher)
//!     .aggregate(Options::new().on_error(|err, _node, url| eprintln!("{url}: {err}")))
//!     .await?;
//! println!("{}", harvest.css_text);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod imports;

#[cfg(test)]
mod test_support;

pub use aggregate::{CssAggregator, Harvest, Options};
pub use config::{CorsSupport, FetcherConfig};
pub use document::{Document, HtmlDocument};
pub use error::{FetchError, HarvestError};
pub use fetch::{BatchFetcher, FetchHooks, FetchOptions, HookOutcome, Request, Transport};
