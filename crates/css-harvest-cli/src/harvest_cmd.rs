//! Load a page, harvest its stylesheets and build a report.

use crate::{Cli, PageSource};
use anyhow::{anyhow, Context, Result};
use css_harvest::document::NodeId;
use css_harvest::fetch::{Request, StandardTransport, Transport};
use css_harvest::{
    BatchFetcher, CorsSupport, CssAggregator, Document, FetchError, FetcherConfig, HarvestError,
    HtmlDocument, Options,
};
use regex::Regex;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};
use url::Url;

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// URL relative references were resolved against.
    pub page: String,
    pub css_text: String,
    pub nodes: Vec<NodeReport>,
    pub errors: Vec<FailureReport>,
}

/// One discovered source node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub css: String,
}

/// A stylesheet or import that could not be used.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Index into `nodes` of the node the failure belongs to.
    pub node: Option<usize>,
    pub url: String,
    pub error: String,
}

/// Fetcher settings: environment first, then flags.
pub fn fetcher_config(cli: &Cli) -> FetcherConfig {
    let mut config = FetcherConfig::from_env();
    if let Some(ms) = cli.timeout_ms {
        config.timeout_ms = ms;
    }
    if cli.legacy_cors {
        config.cors = CorsSupport::SameProtocolOnly;
    }
    config
}

/// Run the harvest described by `cli`.
pub async fn run(cli: &Cli) -> Result<Report> {
    let config = fetcher_config(cli);
    let filter = cli
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --filter pattern")?;

    let doc = load_page(cli, &config).await?;
    let fetcher =
        BatchFetcher::new(&config.with_origin(doc.url())).context("failed to build fetcher")?;

    let failures: Rc<RefCell<Vec<(NodeId, String, String)>>> = Rc::default();
    let sink = failures.clone();
    let mut options = Options::new()
        .include(cli.include.as_str())
        .skip_disabled(!cli.include_disabled)
        .on_error(move |err, node: &NodeId, url| {
            debug!(url, error = %err, "stylesheet dropped");
            sink.borrow_mut().push((*node, url.to_string(), err.to_string()));
        });
    if let Some(exclude) = &cli.exclude {
        options = options.exclude(exclude.as_str());
    }
    if let Some(filter) = filter {
        options = options.filter(filter);
    }

    let harvest = CssAggregator::new(&doc, &fetcher)
        .aggregate(options)
        .await
        .context("failed to harvest stylesheets")?;

    let errors: Vec<FailureReport> = failures
        .take()
        .into_iter()
        .map(|(node, url, error)| FailureReport {
            node: harvest.nodes.iter().position(|n| *n == node),
            url,
            error,
        })
        .collect();

    info!(
        nodes = harvest.nodes.len(),
        contributing = harvest.contributing().count(),
        errors = errors.len(),
        bytes = harvest.css_text.len(),
        "harvest complete"
    );

    let nodes = harvest
        .nodes
        .iter()
        .zip(&harvest.css)
        .map(|(node, css)| NodeReport {
            tag: doc.tag_name(node),
            href: doc.attr(node, "href"),
            css: css.clone(),
        })
        .collect();

    Ok(Report {
        page: doc.base_url().to_string(),
        css_text: harvest.css_text,
        nodes,
        errors,
    })
}

async fn load_page(cli: &Cli, config: &FetcherConfig) -> Result<HtmlDocument> {
    match cli.page_source() {
        PageSource::Remote(url) => {
            let transport = StandardTransport::new(config).context("failed to build http client")?;
            let response = transport
                .send(Request::new(url.clone()))
                .await
                .map_err(HarvestError::Fetch)
                .with_context(|| format!("failed to fetch {url}"))?;
            if !(200..300).contains(&response.status) {
                let status = response.status;
                return Err(HarvestError::Fetch(FetchError::Status { status }))
                    .with_context(|| format!("failed to fetch {url}"));
            }
            debug!(%url, bytes = response.body.len(), "page loaded");
            let page_url = cli.base.clone().unwrap_or(url);
            Ok(HtmlDocument::parse(&response.body, page_url))
        }
        PageSource::File(path) => {
            let source = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let page_url = match &cli.base {
                Some(base) => base.clone(),
                None => {
                    let absolute = std::fs::canonicalize(&path)
                        .with_context(|| format!("failed to resolve {}", path.display()))?;
                    Url::from_file_path(&absolute)
                        .map_err(|()| anyhow!("{} is not a valid file url", absolute.display()))?
                }
            };
            debug!(path = %path.display(), bytes = source.len(), "page loaded");
            Ok(HtmlDocument::parse(&source, page_url))
        }
    }
}
