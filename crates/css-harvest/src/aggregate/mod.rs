//! Document-wide CSS aggregation.
//!
//! [`CssAggregator`] finds every `<style>` and stylesheet `<link>` under a
//! root, obtains each node's text, inlines its `@import`s and returns the
//! results in discovery order. Nodes run concurrently on the caller's task;
//! each owns one slot of the result, so completion order never leaks into
//! the output.

pub mod options;

pub use options::{Options, DEFAULT_INCLUDE, DEFAULT_MAX_IMPORT_PASSES};

use crate::document::Document;
use crate::error::{FetchError, HarvestError};
use crate::fetch::{BatchFetcher, FetchHooks, HookOutcome, Request};
use crate::imports::{ImportResolver, Resolution, CSS_MIME};
use futures::future::join_all;
use tracing::{debug, trace};
use url::Url;

/// Result of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvest<N> {
    /// Every slot joined in order.
    pub css_text: String,
    /// One entry per discovered node. Skipped, failed and filtered nodes hold
    /// an empty string.
    pub css: Vec<String>,
    /// Discovered nodes, index-aligned with `css`.
    pub nodes: Vec<N>,
}

impl<N> Harvest<N> {
    /// Nodes that contributed text, with their text.
    pub fn contributing(&self) -> impl Iterator<Item = (&N, &str)> {
        self.nodes
            .iter()
            .zip(&self.css)
            .filter(|(_, css)| !css.is_empty())
            .map(|(node, css)| (node, css.as_str()))
    }

    /// True when no node contributed any text.
    pub fn is_empty(&self) -> bool {
        self.css_text.is_empty()
    }
}

/// How a discovered node is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Link(String),
    Style,
    Ignored,
}

#[derive(Debug, Clone, Copy)]
enum NodePhase {
    Discovered,
    Fetching,
    ResolvingImports,
    Finalized,
}

/// Routes fetch callbacks for one node to the invocation's hooks.
struct NodeHooks<'a, N> {
    options: &'a Options<N>,
    node: &'a N,
}

impl<N> FetchHooks for NodeHooks<'_, N> {
    fn before_send(&self, request: &mut Request, url: &str, _index: usize) {
        self.options.run_before_send(request, self.node, url);
    }

    fn on_success(&self, text: &str, url: &str, _index: usize) -> HookOutcome {
        self.options.run_on_success(text, self.node, url)
    }

    fn on_error(&self, error: &FetchError, url: &str, _index: usize) {
        self.options.run_on_error(error, self.node, url);
    }
}

/// Collects the CSS of one document.
pub struct CssAggregator<'a, D: Document> {
    document: &'a D,
    fetcher: &'a BatchFetcher,
}

impl<'a, D: Document> CssAggregator<'a, D> {
    pub fn new(document: &'a D, fetcher: &'a BatchFetcher) -> Self {
        Self { document, fetcher }
    }

    /// Harvest every source node selected by `options`.
    ///
    /// Per-node failures are reported through `on_error` and leave an empty
    /// slot. Only an invalid selector fails the whole call, in which case
    /// `on_complete` does not run.
    pub async fn aggregate(
        &self,
        options: Options<D::Node>,
    ) -> Result<Harvest<D::Node>, HarvestError> {
        let nodes = self.discover(&options)?;
        debug!(nodes = nodes.len(), "discovered source nodes");

        let css: Vec<String> = join_all(
            nodes
                .iter()
                .enumerate()
                .map(|(index, node)| self.harvest_node(index, node, &options)),
        )
        .await;

        let css_text = css.concat();
        debug!(
            nodes = nodes.len(),
            bytes = css_text.len(),
            "aggregation complete"
        );
        options.run_on_complete(&css_text, &css, &nodes);

        Ok(Harvest {
            css_text,
            css,
            nodes,
        })
    }

    fn discover(&self, options: &Options<D::Node>) -> Result<Vec<D::Node>, HarvestError> {
        let found = self
            .document
            .query_all(options.root.as_ref(), &options.include)?;

        let Some(exclude) = &options.exclude else {
            return Ok(found);
        };

        let mut kept = Vec::with_capacity(found.len());
        for node in found {
            if !self.document.matches(&node, exclude)? {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn classify(&self, node: &D::Node, options: &Options<D::Node>) -> Source {
        if options.skip_disabled && self.document.is_disabled(node) {
            return Source::Ignored;
        }

        match self.document.tag_name(node).as_str() {
            "link" => {
                let href = self.document.attr(node, "href").unwrap_or_default();
                let is_stylesheet = self.document.attr(node, "rel").is_some_and(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                });
                if is_stylesheet && !href.trim().is_empty() {
                    Source::Link(href)
                } else {
                    Source::Ignored
                }
            }
            "style" => Source::Style,
            _ => Source::Ignored,
        }
    }

    /// Run one node from discovery to its final slot value.
    async fn harvest_node(
        &self,
        index: usize,
        node: &D::Node,
        options: &Options<D::Node>,
    ) -> String {
        trace!(index, phase = ?NodePhase::Discovered);
        let hooks = NodeHooks { options, node };

        let (text, base) = match self.classify(node, options) {
            Source::Ignored => {
                trace!(index, phase = ?NodePhase::Finalized, "not a stylesheet source");
                return String::new();
            }
            Source::Link(href) => match self.fetch_link(index, &href, &hooks).await {
                Some(fetched) => fetched,
                None => {
                    trace!(index, phase = ?NodePhase::Finalized, "link failed");
                    return String::new();
                }
            },
            Source::Style => {
                let text = self.inline_text(node, options);
                let base = self.document.base_url().clone();
                let text = options.run_on_success(&text, node, base.as_str()).apply(text);
                (text, base)
            }
        };

        trace!(index, phase = ?NodePhase::ResolvingImports, base = %base);
        let resolve = |href: &str, base: &Url| self.document.resolve_url(href, base);
        let Resolution {
            css,
            errors,
            passes,
        } = ImportResolver::new(self.fetcher, &hooks, &resolve, options.max_import_passes)
            .resolve(text, &base)
            .await;

        for record in &errors {
            options.run_on_error(&record.error, node, &record.url);
        }

        let css = if options.accepts(&css) {
            css
        } else {
            trace!(index, "filtered out");
            String::new()
        };

        trace!(
            index,
            phase = ?NodePhase::Finalized,
            passes,
            errors = errors.len(),
            bytes = css.len()
        );
        css
    }

    /// Fetch a linked stylesheet. The fetcher reports failures to the node's
    /// `on_error` as they happen.
    async fn fetch_link(
        &self,
        index: usize,
        href: &str,
        hooks: &NodeHooks<'_, D::Node>,
    ) -> Option<(String, Url)> {
        let base = self.document.base_url();
        let Some(url) = self.document.resolve_url(href.trim(), base) else {
            let error = FetchError::InvalidUrl {
                url: href.to_string(),
                reason: format!("cannot resolve against {base}"),
            };
            hooks.on_error(&error, href, index);
            return None;
        };

        trace!(index, phase = ?NodePhase::Fetching, url = %url);
        let urls = [url.to_string()];
        let mut results = self.fetcher.fetch_each(&urls, Some(CSS_MIME), hooks).await;
        match results.pop() {
            Some(Ok(text)) => Some((text, url)),
            _ => None,
        }
    }

    fn inline_text(&self, node: &D::Node, options: &Options<D::Node>) -> String {
        if options.use_live_rules {
            if let Some(rules) = self.document.live_rules(node) {
                return rules.concat();
            }
        }
        self.document.text_content(node)
    }
}
