//! [`Document`] over a parsed HTML string.

use super::Document;
use crate::error::HarvestError;
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// A static HTML page parsed with `scraper`. Nodes are tree ids.
pub struct HtmlDocument {
    html: Html,
    url: Url,
    base: Url,
}

impl HtmlDocument {
    /// Parse `source` as the page found at `url`. A `<base href>` in the page
    /// overrides `url` for relative references.
    pub fn parse(source: &str, url: Url) -> Self {
        let html = Html::parse_document(source);
        let base = base_href(&html)
            .and_then(|href| url.join(&href).ok())
            .unwrap_or_else(|| url.clone());
        Self { html, url, base }
    }

    /// Like [`parse`](Self::parse), for a page URL that still needs parsing.
    pub fn parse_at(source: &str, url: &str) -> Result<Self, HarvestError> {
        let url = Url::parse(url).map_err(|e| HarvestError::InvalidDocumentUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(source, url))
    }

    /// URL the page was loaded from, ignoring `<base>`.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }
}

fn selector(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|e| HarvestError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn node_id(el: ElementRef<'_>) -> NodeId {
    let node: &NodeRef<'_, Node> = &el;
    node.id()
}

fn base_href(html: &Html) -> Option<String> {
    let sel = Selector::parse("base[href]").ok()?;
    html.select(&sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
}

impl Document for HtmlDocument {
    type Node = NodeId;

    fn base_url(&self) -> &Url {
        &self.base
    }

    fn query_all(
        &self,
        scope: Option<&NodeId>,
        selector_text: &str,
    ) -> Result<Vec<NodeId>, HarvestError> {
        let sel = selector(selector_text)?;
        let nodes = match scope {
            None => self.html.select(&sel).map(node_id).collect(),
            Some(&scope) => match self.element(scope) {
                Some(root) => root.select(&sel).map(node_id).collect(),
                None => Vec::new(),
            },
        };
        Ok(nodes)
    }

    fn matches(&self, node: &NodeId, selector_text: &str) -> Result<bool, HarvestError> {
        let sel = selector(selector_text)?;
        Ok(self.element(*node).is_some_and(|el| sel.matches(&el)))
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.element(*node)
            .map(|el| el.value().name().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn attr(&self, node: &NodeId, name: &str) -> Option<String> {
        self.element(*node)?.value().attr(name).map(String::from)
    }

    fn text_content(&self, node: &NodeId) -> String {
        self.element(*node)
            .map(|el| el.text().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <link rel="stylesheet" href="/css/main.css">
  <style id="first">.a { color: red; }</style>
  <link rel="icon" href="/favicon.ico">
</head>
<body>
  <section id="widget">
    <style class="scoped">.w { color: blue; }</style>
    <link rel="stylesheet" href="widget.css" disabled>
  </section>
  <style class="skip">.s{}</style>
</body>
</html>"#;

    fn doc() -> HtmlDocument {
        HtmlDocument::parse_at(PAGE, "https://example.com/pages/index.html").unwrap()
    }

    #[test]
    fn test_query_all_in_document_order() {
        let doc = doc();
        let nodes = doc.query_all(None, "style,link[rel=\"stylesheet\"]").unwrap();
        let tags: Vec<_> = nodes.iter().map(|n| doc.tag_name(n)).collect();
        assert_eq!(tags, vec!["link", "style", "style", "link", "style"]);
    }

    #[test]
    fn test_scoped_query_only_searches_descendants() {
        let doc = doc();
        let scope = doc.query_all(None, "#widget").unwrap()[0];
        let nodes = doc.query_all(Some(&scope), "style,link").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.attr(&nodes[0], "class").as_deref(), Some("scoped"));
        assert!(doc.query_all(Some(&scope), "section").unwrap().is_empty());
    }

    #[test]
    fn test_matches_and_attributes() {
        let doc = doc();
        let nodes = doc.query_all(None, "style").unwrap();
        assert!(doc.matches(&nodes[2], ".skip").unwrap());
        assert!(!doc.matches(&nodes[0], ".skip").unwrap());
        assert_eq!(doc.text_content(&nodes[0]), ".a { color: red; }");

        let links = doc.query_all(None, "link[rel=\"stylesheet\"]").unwrap();
        assert!(!doc.is_disabled(&links[0]));
        assert!(doc.is_disabled(&links[1]));
        assert_eq!(doc.attr(&links[0], "href").as_deref(), Some("/css/main.css"));
    }

    #[test]
    fn test_invalid_selector() {
        let err = doc().query_all(None, "[[").unwrap_err();
        assert!(matches!(err, HarvestError::InvalidSelector { selector, .. } if selector == "[["));
    }

    #[test]
    fn test_base_href_overrides_page_url() {
        let doc = HtmlDocument::parse_at(
            r#"<html><head><base href="https://cdn.example.net/assets/"></head></html>"#,
            "https://example.com/index.html",
        )
        .unwrap();
        assert_eq!(doc.url().as_str(), "https://example.com/index.html");
        assert_eq!(doc.base_url().as_str(), "https://cdn.example.net/assets/");
        let resolved = doc.resolve_url("a.css", doc.base_url()).unwrap();
        assert_eq!(resolved.as_str(), "https://cdn.example.net/assets/a.css");
    }

    #[test]
    fn test_page_url_is_base_without_base_element() {
        let doc = doc();
        assert_eq!(doc.base_url(), doc.url());
    }

    #[test]
    fn test_invalid_page_url() {
        assert!(matches!(
            HtmlDocument::parse_at("<p></p>", "not a url"),
            Err(HarvestError::InvalidDocumentUrl { .. })
        ));
    }
}
