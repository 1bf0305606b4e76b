//! Article extraction from a full HTML document.

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

/// Title and body fragment pulled out of a captured document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub content_html: String,
}

/// Turns a full HTML document into a publishable fragment.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedContent;
}

/// Elements that never carry article text.
const NOISE: &str = "script, style, noscript, template";

/// Page chrome dropped when the whole `<body>` is the article.
const CHROME: &str = "nav, header, footer, aside";

/// Lightweight "readability-like" extractor:
/// - title from `og:title`, then `<title>`, then the first `<h1>`
/// - content from the first `<article>`, then `<main>`, then `<body>`
/// - falls back to the whole document
///
/// Scripts, styles and templates are removed from the chosen subtree, and so
/// is navigation chrome when the subtree is `<body>`.
#[derive(Debug, Default)]
pub struct ReadabilityLikeExtractor;

impl Extractor for ReadabilityLikeExtractor {
    fn extract(&self, html: &str) -> ExtractedContent {
        let mut doc = Html::parse_document(html);

        let title = meta_title(&doc)
            .or_else(|| first_text(&doc, "title"))
            .or_else(|| first_text(&doc, "h1"));

        let container = ["article", "main", "body"].iter().find_map(|tag| {
            let sel = Selector::parse(tag).ok()?;
            doc.select(&sel).next().map(|node| (node.id(), *tag == "body"))
        });

        let content_html = match container {
            Some((id, is_body)) => {
                strip(&mut doc, id, NOISE);
                if is_body {
                    strip(&mut doc, id, CHROME);
                }
                doc.tree
                    .get(id)
                    .and_then(ElementRef::wrap)
                    .map(|node| node.inner_html())
                    .unwrap_or_default()
            }
            None => {
                let root = doc.root_element().id();
                strip(&mut doc, root, NOISE);
                doc.root_element().html()
            }
        };

        ExtractedContent {
            title,
            content_html,
        }
    }
}

/// Detach every descendant of `id` matching `selector`.
fn strip(doc: &mut Html, id: NodeId, selector: &str) {
    let Ok(sel) = Selector::parse(selector) else {
        return;
    };
    let doomed: Vec<NodeId> = match doc.tree.get(id).and_then(ElementRef::wrap) {
        Some(node) => node.select(&sel).map(|el| el.id()).collect(),
        None => return,
    };
    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn meta_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
    doc.select(&sel)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}
