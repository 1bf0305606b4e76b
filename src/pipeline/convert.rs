//! HTML fragment → [`DocumentNode`] tree, rehosting media on the way.
//!
//! The fragment is first lowered into an owned intermediate tree, because
//! `scraper::Html` is not `Send` and must not live across an `.await`. The
//! owned tree is then converted recursively:
//!
//! ```text
//! element ──┬── resolve src / data-src   (join_all, concurrent)
//!           └── convert children          (buffered: concurrent, in order)
//!                       │
//!                       ▼
//!             joined before the element is returned to its parent
//! ```
//!
//! `buffered` yields results in input order regardless of which child
//! finishes first, so the output tree always mirrors the source order.

use crate::node::{escape_html, Attributes, DocumentNode, NodeElement};
use async_trait::async_trait;
use futures::future::{join, join_all, BoxFuture};
use futures::{stream, FutureExt, StreamExt};
use scraper::{Html, Node};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Attributes whose values are media references.
const MEDIA_ATTRS: [&str; 2] = ["src", "data-src"];

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Rewrites a media attribute value.
#[async_trait]
pub trait AttributeResolver: Send + Sync {
    /// Return the replacement value, or `None` to keep the original.
    async fn resolve(&self, value: &str) -> Option<String>;
}

/// Owned copy of the parsed fragment.
#[derive(Debug)]
enum RawNode {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<RawNode>,
    },
}

/// Converts HTML fragments into ordered node trees.
pub struct DocumentConverter {
    resolver: Arc<dyn AttributeResolver>,
    base_url: Option<Url>,
    concurrency: usize,
}

impl DocumentConverter {
    pub fn new(resolver: Arc<dyn AttributeResolver>) -> Self {
        Self {
            resolver,
            base_url: None,
            concurrency: 8,
        }
    }

    /// Resolve relative media URLs against `base` before rehosting.
    pub fn with_base_url(mut self, base: Option<Url>) -> Self {
        self.base_url = base;
        self
    }

    /// Number of sibling subtrees converted at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Convert `html` into top-level nodes in document order.
    ///
    /// Never fails: unresolvable media keeps its original attribute value.
    pub async fn convert(&self, html: &str) -> Vec<DocumentNode> {
        let raw = lower_fragment(html);
        debug!("converting fragment with {} top-level nodes", raw.len());
        self.convert_children(raw).await
    }

    async fn convert_children(&self, children: Vec<RawNode>) -> Vec<DocumentNode> {
        stream::iter(children)
            .map(|child| self.convert_node(child))
            .buffered(self.concurrency)
            .filter_map(|node| async move { node })
            .collect()
            .await
    }

    fn convert_node(&self, node: RawNode) -> BoxFuture<'_, Option<DocumentNode>> {
        async move {
            match node {
                RawNode::Text(text) => {
                    (!text.trim().is_empty()).then(|| DocumentNode::text(escape_html(&text)))
                }
                RawNode::Element {
                    tag,
                    attrs,
                    children,
                } => {
                    let (attrs, children) =
                        join(self.resolve_attrs(attrs), self.convert_children(children)).await;
                    Some(DocumentNode::Element(NodeElement {
                        tag,
                        attrs,
                        children,
                    }))
                }
            }
        }
        .boxed()
    }

    async fn resolve_attrs(&self, attrs: Vec<(String, String)>) -> Attributes {
        join_all(attrs.into_iter().map(|(key, value)| async move {
            if MEDIA_ATTRS.contains(&key.as_str()) {
                let value = self.resolve_media(value).await;
                (key, value)
            } else {
                (key, value)
            }
        }))
        .await
        .into_iter()
        .collect()
    }

    async fn resolve_media(&self, value: String) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.starts_with("data:") {
            return value;
        }
        let target = match &self.base_url {
            Some(base) => match base.join(trimmed) {
                Ok(url) => url.to_string(),
                Err(_) => trimmed.to_string(),
            },
            None => trimmed.to_string(),
        };
        match self.resolver.resolve(&target).await {
            Some(resolved) if !resolved.is_empty() => resolved,
            _ => value,
        }
    }
}

fn lower_fragment(html: &str) -> Vec<RawNode> {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .children()
        .filter_map(lower_node)
        .collect()
}

fn lower_node(node: ego_tree::NodeRef<'_, Node>) -> Option<RawNode> {
    match node.value() {
        Node::Text(text) => Some(RawNode::Text(text.text.to_string())),
        Node::Element(element) => Some(RawNode::Element {
            tag: tag_name(element),
            attrs: element
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children: node.children().filter_map(lower_node).collect(),
        }),
        _ => None,
    }
}

fn tag_name(element: &scraper::node::Element) -> String {
    let local = element.name();
    match &*element.name.ns {
        "" | XHTML_NS => local.to_string(),
        SVG_NS => format!("svg.{local}"),
        MATHML_NS => format!("math.{local}"),
        other => format!("{other}.{local}"),
    }
}
