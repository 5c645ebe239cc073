//! Invocation options for [`CssAggregator`](super::CssAggregator).

use crate::error::FetchError;
use crate::fetch::{HookOutcome, Request};
use regex::Regex;

/// Selector used when none is given.
pub const DEFAULT_INCLUDE: &str = "style,link[rel=\"stylesheet\"]";

/// Pass limit used when none is given.
pub const DEFAULT_MAX_IMPORT_PASSES: usize = 64;

type BeforeSendFn<N> = Box<dyn Fn(&mut Request, &N, &str)>;
type SuccessFn<N> = Box<dyn Fn(&str, &N, &str) -> HookOutcome>;
type ErrorFn<N> = Box<dyn Fn(&FetchError, &N, &str)>;
type CompleteFn<N> = Box<dyn Fn(&str, &[String], &[N])>;

/// What to harvest and which callbacks to run. `N` is the document's node
/// handle.
pub struct Options<N> {
    pub(crate) root: Option<N>,
    pub(crate) include: String,
    pub(crate) exclude: Option<String>,
    pub(crate) filter: Option<Regex>,
    pub(crate) skip_disabled: bool,
    pub(crate) use_live_rules: bool,
    pub(crate) max_import_passes: usize,
    before_send: Option<BeforeSendFn<N>>,
    on_success: Option<SuccessFn<N>>,
    on_error: Option<ErrorFn<N>>,
    on_complete: Option<CompleteFn<N>>,
}

impl<N> Default for Options<N> {
    fn default() -> Self {
        Self {
            root: None,
            include: DEFAULT_INCLUDE.to_string(),
            exclude: None,
            filter: None,
            skip_disabled: true,
            use_live_rules: false,
            max_import_passes: DEFAULT_MAX_IMPORT_PASSES,
            before_send: None,
            on_success: None,
            on_error: None,
            on_complete: None,
        }
    }
}

impl<N> Options<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only search below this node.
    pub fn root(mut self, node: N) -> Self {
        self.root = Some(node);
        self
    }

    pub fn include(mut self, selector: impl Into<String>) -> Self {
        self.include = selector.into();
        self
    }

    pub fn exclude(mut self, selector: impl Into<String>) -> Self {
        self.exclude = Some(selector.into());
        self
    }

    /// Keep a node's text only when the fully resolved text matches.
    pub fn filter(mut self, pattern: Regex) -> Self {
        self.filter = Some(pattern);
        self
    }

    pub fn skip_disabled(mut self, skip: bool) -> Self {
        self.skip_disabled = skip;
        self
    }

    /// Read inline stylesheets from the document's live rules when it has them.
    pub fn use_live_rules(mut self, enabled: bool) -> Self {
        self.use_live_rules = enabled;
        self
    }

    pub fn max_import_passes(mut self, passes: usize) -> Self {
        self.max_import_passes = passes;
        self
    }

    pub fn before_send<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, &N, &str) + 'static,
    {
        self.before_send = Some(Box::new(f));
        self
    }

    /// Runs once for every stylesheet text obtained: link bodies, inline
    /// text and each fetched import. The return value can replace or
    /// discard the text.
    pub fn on_success<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&str, &N, &str) -> R + 'static,
        R: Into<HookOutcome>,
    {
        self.on_success = Some(Box::new(move |text, node, url| f(text, node, url).into()));
        self
    }

    /// Runs once per failed link or import.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&FetchError, &N, &str) + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Runs once, with the joined text, the per-node texts and the nodes.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[String], &[N]) + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    // ── Hook dispatch ───────────────────────────────────────────────────────

    pub(crate) fn run_before_send(&self, request: &mut Request, node: &N, url: &str) {
        if let Some(f) = &self.before_send {
            f(request, node, url);
        }
    }

    pub(crate) fn run_on_success(&self, text: &str, node: &N, url: &str) -> HookOutcome {
        self.on_success
            .as_ref()
            .map_or(HookOutcome::Keep, |f| f(text, node, url))
    }

    pub(crate) fn run_on_error(&self, error: &FetchError, node: &N, url: &str) {
        if let Some(f) = &self.on_error {
            f(error, node, url);
        }
    }

    pub(crate) fn run_on_complete(&self, css_text: &str, css: &[String], nodes: &[N]) {
        if let Some(f) = &self.on_complete {
            f(css_text, css, nodes);
        }
    }

    /// True when `text` survives the content filter.
    pub(crate) fn accepts(&self, text: &str) -> bool {
        self.filter.as_ref().map_or(true, |re| re.is_match(text))
    }
}
