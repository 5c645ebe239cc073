//! Recursive `@import` resolution.
//!
//! An [`ImportResolver`] inlines one stylesheet's imports in passes. Every
//! pass fetches all directives that have not been attempted yet in a single
//! batch. Fetched text is spliced in place of its directive, with its own
//! nested imports made absolute first. Failed directives go into the ignore
//! set so the next pass skips them. Resolution stops when a pass finds
//! nothing left to fetch.

pub mod scan;

pub use scan::ImportRecord;

use crate::error::FetchError;
use crate::fetch::{BatchFetcher, FetchHooks, HookOutcome, Request};
use std::collections::HashSet;
use tracing::{debug, trace, warn};
use url::Url;

/// MIME type every stylesheet request is decoded as.
pub const CSS_MIME: &str = "text/css";

/// A failed import, kept until its stylesheet is fully resolved.
#[derive(Debug)]
pub struct ErrorRecord {
    pub error: FetchError,
    /// Absolute URL when one could be computed, otherwise the URL as written.
    pub url: String,
}

/// Outcome of resolving one stylesheet.
#[derive(Debug)]
pub struct Resolution {
    /// Text with every import inlined. Directives that failed are removed.
    pub css: String,
    /// Failures in the order they were observed.
    pub errors: Vec<ErrorRecord>,
    /// Number of fetch passes that ran.
    pub passes: usize,
}

/// Resolves a URL as written against a base URL.
pub type UrlResolver<'a> = &'a dyn Fn(&str, &Url) -> Option<Url>;

/// Forwards request and success hooks. Failures are held back: the resolver
/// records them and its owner reports them once resolution is done.
struct DeferErrors<'a>(&'a dyn FetchHooks);

impl FetchHooks for DeferErrors<'_> {
    fn before_send(&self, request: &mut Request, url: &str, index: usize) {
        self.0.before_send(request, url, index);
    }

    fn on_success(&self, text: &str, url: &str, index: usize) -> HookOutcome {
        self.0.on_success(text, url, index)
    }
}

/// Per-stylesheet import resolution state.
pub struct ImportResolver<'a> {
    fetcher: &'a BatchFetcher,
    hooks: &'a dyn FetchHooks,
    resolve_url: UrlResolver<'a>,
    max_passes: usize,
    ignored: HashSet<String>,
    errors: Vec<ErrorRecord>,
    passes: usize,
}

impl<'a> ImportResolver<'a> {
    pub fn new(
        fetcher: &'a BatchFetcher,
        hooks: &'a dyn FetchHooks,
        resolve_url: UrlResolver<'a>,
        max_passes: usize,
    ) -> Self {
        Self {
            fetcher,
            hooks,
            resolve_url,
            max_passes,
            ignored: HashSet::new(),
            errors: Vec::new(),
            passes: 0,
        }
    }

    /// Inline every import reachable from `css`. Relative URLs resolve
    /// against `base`.
    pub async fn resolve(mut self, css: String, base: &Url) -> Resolution {
        let mut css = css;

        loop {
            let pending: Vec<ImportRecord> = scan::find_imports(&css)
                .into_iter()
                .filter(|record| !self.ignored.contains(&record.directive))
                .collect();

            if pending.is_empty() {
                break;
            }

            if self.passes >= self.max_passes {
                warn!(
                    passes = self.passes,
                    remaining = pending.len(),
                    "import pass limit reached, dropping unresolved imports"
                );
                for record in pending {
                    self.fail(
                        record,
                        None,
                        FetchError::ImportLimit {
                            passes: self.passes,
                        },
                    );
                }
                break;
            }

            self.passes += 1;
            debug!(pass = self.passes, imports = pending.len(), "resolving imports");
            css = self.run_pass(css, base, pending).await;
        }

        let css = if self.ignored.is_empty() {
            css
        } else {
            scan::remove_directives(&css, self.ignored.iter().map(String::as_str))
        };

        Resolution {
            css,
            errors: self.errors,
            passes: self.passes,
        }
    }

    async fn run_pass(&mut self, css: String, base: &Url, pending: Vec<ImportRecord>) -> String {
        let mut targets: Vec<(ImportRecord, Url)> = Vec::with_capacity(pending.len());
        for record in pending {
            match (self.resolve_url)(&record.url, base) {
                Some(absolute) => targets.push((record, absolute)),
                None => {
                    let error = FetchError::InvalidUrl {
                        url: record.url.clone(),
                        reason: format!("cannot resolve against {base}"),
                    };
                    self.fail(record, None, error);
                }
            }
        }

        if targets.is_empty() {
            return css;
        }

        let urls: Vec<String> = targets.iter().map(|(_, url)| url.to_string()).collect();
        let results = self
            .fetcher
            .fetch_each(&urls, Some(CSS_MIME), &DeferErrors(self.hooks))
            .await;

        let mut edits = Vec::with_capacity(targets.len());
        for ((record, absolute), result) in targets.into_iter().zip(results) {
            match result {
                Ok(text) => {
                    trace!(url = %absolute, "import inlined");
                    let text = scan::absolutize_imports(&text, &absolute, self.resolve_url);
                    edits.push((record.range, text));
                }
                Err(error) => self.fail(record, Some(&absolute), error),
            }
        }

        if edits.is_empty() {
            css
        } else {
            scan::splice(&css, edits)
        }
    }

    fn fail(&mut self, record: ImportRecord, absolute: Option<&Url>, error: FetchError) {
        let url = absolute.map_or_else(|| record.url.clone(), Url::to_string);
        self.errors.push(ErrorRecord { error, url });
        self.ignored.insert(record.directive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NoHooks;
    use crate::test_support::ScriptedTransport;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn join(href: &str, base: &Url) -> Option<Url> {
        base.join(href).ok()
    }

    fn base() -> Url {
        Url::parse("https://x.test/index.html").unwrap()
    }

    async fn resolve_with(transport: ScriptedTransport, css: &str) -> Resolution {
        let fetcher = BatchFetcher::with_transport(Arc::new(transport));
        ImportResolver::new(&fetcher, &NoHooks, &join, 16)
            .resolve(css.to_string(), &base())
            .await
    }

    #[tokio::test]
    async fn test_text_without_imports_is_untouched() {
        let css = "/* @import \"nope.css\"; */ .a { color: red; }";
        let resolution = resolve_with(ScriptedTransport::new(), css).await;
        assert_eq!(resolution.css, css);
        assert_eq!(resolution.passes, 0);
        assert!(resolution.errors.is_empty());
    }

    #[tokio::test]
    async fn test_flat_imports_keep_textual_order_under_scrambled_latency() {
        let transport = ScriptedTransport::new()
            .css_after("https://x.test/a.css", ".a{}", Duration::from_millis(40))
            .css_after("https://x.test/b.css", ".b{}", Duration::from_millis(20))
            .css_after("https://x.test/c.css", ".c{}", Duration::from_millis(0));
        let css = "@import \"a.css\";@import \"b.css\";@import \"c.css\";.own{}";

        let resolution = resolve_with(transport, css).await;
        assert_eq!(resolution.css, ".a{}.b{}.c{}.own{}");
        assert_eq!(resolution.passes, 1);
    }

    #[tokio::test]
    async fn test_chained_imports_resolve_relative_to_their_own_directory() {
        let transport = ScriptedTransport::new()
            .css("https://x.test/css/a.css", "@import \"sub/b.css\";.a{}")
            .css("https://x.test/css/sub/b.css", "@import \"../../c.css\";.b{}")
            .css("https://x.test/c.css", ".c{}");

        let resolution = resolve_with(transport, "@import \"css/a.css\";").await;
        assert_eq!(resolution.css, ".c{}.b{}.a{}");
        assert_eq!(resolution.passes, 3);
        assert!(!scan::has_imports(&resolution.css));
    }

    #[tokio::test]
    async fn test_failed_import_is_reported_once_and_removed() {
        let transport = ScriptedTransport::new().css("https://x.test/ok.css", ".ok{}");
        let css = "@import \"missing.css\";@import \"ok.css\";.own{}";

        let resolution = resolve_with(transport, css).await;
        assert_eq!(resolution.css, ".ok{}.own{}");
        assert_eq!(resolution.errors.len(), 1);
        assert_eq!(resolution.errors[0].url, "https://x.test/missing.css");
        assert_eq!(resolution.errors[0].error.status(), Some(404));
    }

    #[tokio::test]
    async fn test_nested_failure_does_not_block_siblings() {
        let transport = ScriptedTransport::new()
            .css("https://x.test/a.css", "@import \"gone.css\";.a{}")
            .css("https://x.test/b.css", ".b{}");

        let resolution = resolve_with(transport, "@import \"a.css\";@import \"b.css\";").await;
        assert_eq!(resolution.css, ".a{}.b{}");
        assert_eq!(resolution.errors.len(), 1);
        assert_eq!(resolution.errors[0].url, "https://x.test/gone.css");
    }

    #[tokio::test]
    async fn test_cycle_stops_at_pass_limit() {
        let transport = ScriptedTransport::new()
            .css("https://x.test/a.css", "@import \"b.css\";.a{}")
            .css("https://x.test/b.css", "@import \"a.css\";.b{}");
        let fetcher = BatchFetcher::with_transport(Arc::new(transport));

        let resolution = ImportResolver::new(&fetcher, &NoHooks, &join, 4)
            .resolve("@import \"a.css\";".to_string(), &base())
            .await;

        assert_eq!(resolution.passes, 4);
        assert_eq!(resolution.errors.len(), 1);
        assert!(matches!(
            resolution.errors[0].error,
            FetchError::ImportLimit { passes: 4 }
        ));
        assert_eq!(resolution.css, ".b{}.a{}.b{}.a{}");
    }

    #[tokio::test]
    async fn test_unresolvable_url_is_an_error() {
        let fetcher = BatchFetcher::with_transport(Arc::new(ScriptedTransport::new()));
        let data_base = Url::parse("data:text/css,@import%20%22rel.css%22%3B").unwrap();

        let resolution = ImportResolver::new(&fetcher, &NoHooks, &join, 8)
            .resolve("@import \"rel.css\";.x{}".to_string(), &data_base)
            .await;

        assert_eq!(resolution.css, ".x{}");
        assert_eq!(resolution.errors.len(), 1);
        assert!(matches!(resolution.errors[0].error, FetchError::InvalidUrl { .. }));
        assert_eq!(resolution.errors[0].url, "rel.css");
    }

    struct NewlineAfter(Arc<Mutex<Vec<String>>>);

    impl FetchHooks for NewlineAfter {
        fn on_success(&self, text: &str, url: &str, _index: usize) -> HookOutcome {
            self.0.lock().unwrap().push(url.to_string());
            HookOutcome::Replace(format!("{text}\n"))
        }
    }

    #[tokio::test]
    async fn test_success_hook_sees_every_import() {
        let transport = ScriptedTransport::new()
            .css("https://x.test/a.css", "@import \"b.css\";.a{}")
            .css("https://x.test/b.css", ".b{}");
        let fetcher = BatchFetcher::with_transport(Arc::new(transport));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hooks = NewlineAfter(seen.clone());

        let resolution = ImportResolver::new(&fetcher, &hooks, &join, 8)
            .resolve("@import \"a.css\";".to_string(), &base())
            .await;

        assert_eq!(resolution.css, ".b{}\n.a{}\n");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["https://x.test/a.css", "https://x.test/b.css"]
        );
    }

    struct CountErrors(Arc<Mutex<usize>>);

    impl FetchHooks for CountErrors {
        fn on_error(&self, _error: &FetchError, _url: &str, _index: usize) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_reported() {
        let fetcher = BatchFetcher::with_transport(Arc::new(ScriptedTransport::new()));
        let reported = Arc::new(Mutex::new(0));
        let hooks = CountErrors(reported.clone());

        let resolution = ImportResolver::new(&fetcher, &hooks, &join, 8)
            .resolve("@import \"a.css\";@import \"b.css\";".to_string(), &base())
            .await;

        assert_eq!(resolution.errors.len(), 2);
        assert_eq!(*reported.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolved_output_is_a_fixed_point() {
        let transport = ScriptedTransport::new()
            .css("https://x.test/a.css", "@import \"b.css\";.a{}")
            .css("https://x.test/b.css", ".b{}");
        let first = resolve_with(transport, "@import \"a.css\";@import \"nope.css\";.own{}").await;

        let second = resolve_with(ScriptedTransport::new(), &first.css).await;
        assert_eq!(second.css, first.css);
        assert_eq!(second.passes, 0);
    }
}
