//! DOM access for the aggregator.
//!
//! The aggregator never touches a concrete DOM. It discovers and inspects
//! source nodes through [`Document`], so any tree that can answer selector
//! queries can be harvested. [`HtmlDocument`] is the bundled implementation.

pub mod html;

pub use ego_tree::NodeId;
pub use html::HtmlDocument;

use crate::error::HarvestError;
use url::Url;

/// Query and inspection capability over one document.
pub trait Document {
    /// Opaque handle to an element.
    type Node: Clone;

    /// URL relative references in the document resolve against.
    fn base_url(&self) -> &Url;

    /// Elements matching `selector` in document order. With a scope, only
    /// descendants of the scope are searched.
    fn query_all(
        &self,
        scope: Option<&Self::Node>,
        selector: &str,
    ) -> Result<Vec<Self::Node>, HarvestError>;

    fn matches(&self, node: &Self::Node, selector: &str) -> Result<bool, HarvestError>;

    /// Lower-case tag name.
    fn tag_name(&self, node: &Self::Node) -> String;

    fn attr(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn text_content(&self, node: &Self::Node) -> String;

    fn is_disabled(&self, node: &Self::Node) -> bool {
        self.attr(node, "disabled").is_some()
    }

    /// Current rule texts of an inline stylesheet, when the document keeps a
    /// rule model that can diverge from the element's text.
    fn live_rules(&self, _node: &Self::Node) -> Option<Vec<String>> {
        None
    }

    fn resolve_url(&self, href: &str, base: &Url) -> Option<Url> {
        base.join(href).ok()
    }
}
