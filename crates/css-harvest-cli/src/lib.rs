//! `css-harvest <SOURCE>`: print the resolved CSS of an HTML page.

pub mod harvest_cmd;
pub mod output;

use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// Print the CSS of every <style> and stylesheet <link> in a page, with
/// @import rules inlined, in document order.
#[derive(Parser, Debug, Clone)]
#[command(name = "css-harvest", version, about)]
pub struct Cli {
    /// HTML page: an http(s) URL or a path to a local file
    pub source: String,

    /// Treat the page as if it was loaded from this URL
    #[arg(long)]
    pub base: Option<Url>,

    /// Selector for source nodes
    #[arg(long, default_value = css_harvest::aggregate::DEFAULT_INCLUDE)]
    pub include: String,

    /// Selector for source nodes to leave out
    #[arg(long)]
    pub exclude: Option<String>,

    /// Keep only nodes whose resolved CSS matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Also harvest nodes with a `disabled` attribute
    #[arg(long)]
    pub include_disabled: bool,

    /// Print a JSON report instead of the joined CSS
    #[arg(long)]
    pub json: bool,

    /// Per-request timeout in milliseconds (0 disables)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Only allow cross-origin stylesheets that keep the page's protocol
    #[arg(long)]
    pub legacy_cors: bool,

    /// Log fetch progress to stderr
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Where the page comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Remote(Url),
    File(PathBuf),
}

impl Cli {
    pub fn page_source(&self) -> PageSource {
        match Url::parse(&self.source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => PageSource::Remote(url),
            _ => PageSource::File(PathBuf::from(&self.source)),
        }
    }

    /// Default log directive when `RUST_LOG` is not set.
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            "css_harvest=error,css_harvest_cli=error"
        } else if self.verbose {
            "css_harvest=debug,css_harvest_cli=debug"
        } else {
            "css_harvest=warn,css_harvest_cli=warn"
        }
    }
}

/// Install the stderr log subscriber.
pub fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["css-harvest", "page.html"]).unwrap();
        assert_eq!(cli.include, "style,link[rel=\"stylesheet\"]");
        assert!(!cli.include_disabled);
        assert!(!cli.json);
        assert_eq!(cli.page_source(), PageSource::File(PathBuf::from("page.html")));
        assert_eq!(cli.log_directive(), "css_harvest=warn,css_harvest_cli=warn");
    }

    #[test]
    fn test_remote_source_and_flags() {
        let cli = Cli::try_parse_from([
            "css-harvest",
            "https://example.com/",
            "--exclude",
            ".vendor",
            "--filter",
            "color",
            "--timeout-ms",
            "500",
            "--legacy-cors",
            "-v",
        ])
        .unwrap();
        assert!(matches!(cli.page_source(), PageSource::Remote(url) if url.host_str() == Some("example.com")));
        assert_eq!(cli.exclude.as_deref(), Some(".vendor"));
        assert_eq!(cli.timeout_ms, Some(500));
        assert!(cli.legacy_cors);
        assert_eq!(cli.log_directive(), "css_harvest=debug,css_harvest_cli=debug");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["css-harvest", "a.html", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_invalid_base_is_rejected() {
        assert!(Cli::try_parse_from(["css-harvest", "a.html", "--base", "nope"]).is_err());
    }
}
