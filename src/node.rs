//! The document tree sent to the publishing backend.
//!
//! Telegraph content is a JSON array of nodes, where a node is either a bare
//! string or `{"tag", "attrs", "children"}`. [`DocumentNode`] models that
//! directly as a tagged variant so no consumer ever has to probe a node's kind
//! at runtime.

use serde::ser::{Serialize, Serializer};

/// One node of a converted document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum DocumentNode {
    /// HTML-escaped text.
    Text(String),
    /// An element with attributes and ordered children.
    Element(NodeElement),
}

impl DocumentNode {
    pub fn text(text: impl Into<String>) -> Self {
        DocumentNode::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&NodeElement> {
        match self {
            DocumentNode::Element(e) => Some(e),
            DocumentNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DocumentNode::Text(t) => Some(t),
            DocumentNode::Element(_) => None,
        }
    }
}

impl From<NodeElement> for DocumentNode {
    fn from(element: NodeElement) -> Self {
        DocumentNode::Element(element)
    }
}

/// An element node. Namespaced tags are rendered as `namespace.localname`.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct NodeElement {
    pub tag: String,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentNode>,
}

impl NodeElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key, value);
        self
    }

    pub fn child(mut self, node: impl Into<DocumentNode>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: Vec<DocumentNode>) -> Self {
        self.children.extend(nodes);
        self
    }
}

impl From<&str> for DocumentNode {
    fn from(text: &str) -> Self {
        DocumentNode::Text(text.to_string())
    }
}

impl From<String> for DocumentNode {
    fn from(text: String) -> Self {
        DocumentNode::Text(text)
    }
}

/// Attribute map that keeps source order and unique keys.
///
/// Serialises as a JSON object whose keys appear in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Escape text for inclusion in HTML content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
