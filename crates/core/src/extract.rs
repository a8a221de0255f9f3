//! Article extraction from arbitrary blog markup.
//!
//! Extraction runs a fixed chain of site-template [`Heuristic`]s. Every
//! heuristic looks at the whole document independently, and a later match
//! replaces an earlier one, so the chain is a left fold that keeps the last
//! hit. A page no heuristic recognises falls back to a generic scan of
//! paragraph, heading and list text, and is flagged for the cleaning pass.

use tracing::debug;

use crate::artwork::resolve_header_image;
use crate::parse::{Document, Element, outermost};
use crate::{Blog2PodError, Result};

/// Block-level elements whose text makes up an article body.
const TEXT_BLOCKS: &str = "p, h1, h2, h3, h4, h5, h6, li";

/// Content containers used by common blog themes.
const CONTENT_DIVS: &[&str] = &[
    "div.entry-content",
    "div.post-content",
    "div.article-content",
    "div.article-body",
];

/// Headings that close the article part of a page.
const SECTION_TERMINATORS: &[&str] = &[
    "comments",
    "related",
    "leave a reply",
    "leave a comment",
    "share this",
    "more from",
    "you may also like",
];

/// A structural pattern-matcher for one known page template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// JSON-LD node carrying an `articleBody` string.
    JsonLdArticleBody,
    /// A theme content div such as `div.entry-content`.
    EntryContent,
    /// The siblings between the first `h1` and a closing heading.
    HeadingSections,
    /// Full body text shipped in a meta tag.
    MetaArticleBody,
    /// Block-editor column layouts.
    ColumnsLayout,
}

impl Heuristic {
    /// Application order. Later entries win when several match.
    pub const CHAIN: [Heuristic; 5] = [
        Heuristic::JsonLdArticleBody,
        Heuristic::EntryContent,
        Heuristic::HeadingSections,
        Heuristic::MetaArticleBody,
        Heuristic::ColumnsLayout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Heuristic::JsonLdArticleBody => "json-ld-article-body",
            Heuristic::EntryContent => "entry-content",
            Heuristic::HeadingSections => "heading-sections",
            Heuristic::MetaArticleBody => "meta-article-body",
            Heuristic::ColumnsLayout => "columns-layout",
        }
    }

    /// Runs this heuristic against the document.
    ///
    /// Returns `None` unless the template fingerprint is present and yields
    /// non-empty body text.
    pub fn apply(self, doc: &Document) -> Option<Extraction> {
        let extraction = match self {
            Heuristic::JsonLdArticleBody => json_ld_article_body(doc),
            Heuristic::EntryContent => entry_content(doc),
            Heuristic::HeadingSections => heading_sections(doc),
            Heuristic::MetaArticleBody => meta_article_body(doc),
            Heuristic::ColumnsLayout => columns_layout(doc),
        }?;
        (!extraction.body.trim().is_empty()).then_some(extraction)
    }
}

/// Title and body produced by a single heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub title: Option<String>,
    pub body: String,
}

/// The result of running the extractor over one page.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    /// Article title, `None` when the page has none.
    pub title: Option<String>,
    /// Raw article text, never empty.
    pub body_text: String,
    /// The heuristic whose output was kept.
    pub matched: Option<Heuristic>,
    /// Absolute URL of a representative header image.
    pub header_image_url: Option<String>,
    /// Set when only the generic scan matched; the text may carry boilerplate.
    pub needs_cleaning: bool,
}

/// Folds the heuristic chain over the document, keeping the last match.
pub fn run_heuristics(doc: &Document) -> Option<(Heuristic, Extraction)> {
    Heuristic::CHAIN.iter().fold(None, |kept, &heuristic| match heuristic.apply(doc) {
        Some(extraction) => {
            debug!(heuristic = heuristic.name(), "heuristic matched");
            Some((heuristic, extraction))
        }
        None => kept,
    })
}

/// Text of every paragraph, heading and list item, in document order.
///
/// A block nested inside another block (`<li><p>`) is read once, as part of
/// its outer block.
pub fn generic_text(doc: &Document) -> String {
    doc.select(TEXT_BLOCKS)
        .map(join_blocks)
        .unwrap_or_default()
}

/// Extracts title, body text and header image from a parsed page.
///
/// # Errors
///
/// Returns [`Blog2PodError::ExtractionFailed`] when neither a heuristic nor
/// the generic scan finds any text.
pub fn extract_article(doc: &Document) -> Result<ExtractedArticle> {
    let header_image_url = resolve_header_image(doc);

    if let Some((heuristic, extraction)) = run_heuristics(doc) {
        return Ok(ExtractedArticle {
            title: extraction.title.or_else(|| doc.title()),
            body_text: extraction.body,
            matched: Some(heuristic),
            header_image_url,
            needs_cleaning: false,
        });
    }

    let body_text = generic_text(doc);
    if body_text.trim().is_empty() {
        let url = doc.base_url().map(|u| u.to_string()).unwrap_or_default();
        return Err(Blog2PodError::ExtractionFailed { url });
    }

    debug!(chars = body_text.len(), "no heuristic matched; using generic scan");
    Ok(ExtractedArticle { title: doc.title(), body_text, matched: None, header_image_url, needs_cleaning: true })
}

fn json_ld_article_body(doc: &Document) -> Option<Extraction> {
    doc.json_ld_objects().into_iter().find_map(|node| {
        let body = node.get("articleBody")?.as_str()?.to_string();
        let title = node.get("headline").and_then(|h| h.as_str()).map(str::to_string);
        Some(Extraction { title, body })
    })
}

fn entry_content(doc: &Document) -> Option<Extraction> {
    let container = CONTENT_DIVS
        .iter()
        .find_map(|selector| doc.select(selector).ok()?.into_iter().next())?;

    let body = match container.select(TEXT_BLOCKS) {
        Ok(blocks) if !blocks.is_empty() => join_blocks(blocks),
        _ => container.text().trim().to_string(),
    };

    let title = ["h1.entry-title", "h1.post-title"]
        .iter()
        .find_map(|selector| first_text(doc, selector))
        .or_else(|| doc.first_heading())
        .or_else(|| doc.title());

    Some(Extraction { title, body })
}

fn heading_sections(doc: &Document) -> Option<Extraction> {
    let h1 = doc.select("h1").ok()?.into_iter().next()?;

    let mut blocks = Vec::new();
    let mut terminated = false;
    for sibling in h1.following_siblings() {
        if sibling.is_heading() && is_terminator(&sibling.text()) {
            terminated = true;
            break;
        }
        blocks.push(sibling);
    }

    if !terminated {
        return None;
    }

    let title = h1.text().trim().to_string();
    Some(Extraction { title: (!title.is_empty()).then_some(title), body: join_blocks(blocks) })
}

fn meta_article_body(doc: &Document) -> Option<Extraction> {
    let body = doc.meta_content("articleBody").or_else(|| doc.meta_content("article:body"))?;
    let title = doc.meta_content("og:title").or_else(|| doc.title());
    Some(Extraction { title, body })
}

fn columns_layout(doc: &Document) -> Option<Extraction> {
    let columns = [".wp-block-columns .wp-block-column", ".columns > .column"]
        .iter()
        .find_map(|selector| doc.select(selector).ok().filter(|found| !found.is_empty()))?;

    let body = columns
        .iter()
        .map(|column| match column.select(TEXT_BLOCKS) {
            Ok(blocks) if !blocks.is_empty() => join_blocks(blocks),
            _ => column.text().trim().to_string(),
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Some(Extraction { title: doc.first_heading().or_else(|| doc.title()), body })
}

fn is_terminator(heading: &str) -> bool {
    let heading = heading.trim().to_lowercase();
    SECTION_TERMINATORS.iter().any(|t| heading.starts_with(t))
}

fn first_text(doc: &Document, selector: &str) -> Option<String> {
    let text = doc.select(selector).ok()?.first()?.text();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn join_blocks(blocks: Vec<Element<'_>>) -> String {
    outermost(blocks)
        .iter()
        .map(|el| el.text().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
