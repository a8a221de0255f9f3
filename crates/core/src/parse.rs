//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types the extractor
//! heuristics work against. Both are thin wrappers over `scraper` that turn
//! selector errors into [`Blog2PodError::HtmlParseError`].
//!
//! # Example
//!
//! ```rust
//! use blog2pod_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! let paragraphs = doc.select("p.content").unwrap();
//! assert_eq!(paragraphs.len(), 1);
//! ```

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{Blog2PodError, Result};

/// Represents a parsed HTML document.
///
/// A Document wraps an HTML page together with the URL it came from, which
/// is needed to resolve relative image and pagination links.
pub struct Document {
    html: Html,
    base_url: Option<Url>,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// html5ever recovers from any markup, so parsing itself never fails.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html), base_url: None }
    }

    /// Parses HTML and remembers the page URL for link resolution.
    ///
    /// An unparseable URL is ignored rather than rejected; links then only
    /// resolve when they are already absolute.
    pub fn parse_with_url(html: &str, url: &str) -> Self {
        Self { html: Html::parse_document(html), base_url: Url::parse(url).ok() }
    }

    /// Gets the base URL used for resolving relative links.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Re-serializes the parsed DOM.
    ///
    /// Used by the HTTP fallback path so extraction always sees the same
    /// normalized markup a browser would hand back.
    pub fn serialize(&self) -> String {
        self.html.html()
    }

    /// Selects elements using a CSS selector, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`Blog2PodError::HtmlParseError`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile(selector)?;
        Ok(self.html.select(&sel).map(|element| Element { element }).collect())
    }

    /// Gets the trimmed `<title>` text.
    ///
    /// Returns `None` when the tag is missing or empty so callers can supply
    /// their own placeholder.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|title| !title.is_empty())
    }
}

/// A wrapper around scraper's ElementRef.
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name (e.g. "div", "h2").
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Returns true for `h1` through `h6`.
    pub fn is_heading(&self) -> bool {
        matches!(self.element.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`Blog2PodError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = compile(selector)?;
        Ok(self.element.select(&sel).map(|element| Element { element }).collect())
    }

    /// Element siblings that follow this one, skipping text and comment nodes.
    pub fn following_siblings(&self) -> impl Iterator<Item = Element<'a>> + use<'a> {
        self.element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .map(|element| Element { element })
    }
}

/// Drops every element that sits inside another element of the same list.
///
/// Document order of the survivors is preserved.
pub fn outermost(elements: Vec<Element<'_>>) -> Vec<Element<'_>> {
    let ids: HashSet<_> = elements.iter().map(|el| el.element.id()).collect();
    elements
        .into_iter()
        .filter(|el| !el.element.ancestors().any(|ancestor| ids.contains(&ancestor.id())))
        .collect()
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Blog2PodError::HtmlParseError(format!("Invalid selector: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title>  Test Page </title>
        </head>
        <body>
            <h1>Heading</h1>
            <p class="content">Paragraph 1</p>
            <!-- note -->
            <p class="content">Paragraph 2</p>
            <a href="https://example.com">Link</a>
        </body>
        </html>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.title(), Some("Test Page".to_string()));
    }

    #[test]
    fn test_missing_or_empty_title() {
        assert_eq!(Document::parse("<html><body><p>x</p></body></html>").title(), None);
        assert_eq!(Document::parse("<html><head><title> </title></head></html>").title(), None);
    }

    #[test]
    fn test_select_elements() {
        let doc = Document::parse(SAMPLE_HTML);
        let elements = doc.select("p.content").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "Paragraph 1");
        assert_eq!(elements[1].text(), "Paragraph 2");
    }

    #[test]
    fn test_outermost_drops_nested_matches() {
        let doc = Document::parse("<ul><li><p>Alpha</p></li><li>Beta</li></ul><p>Gamma</p>");
        let blocks = outermost(doc.select("p, li").unwrap());
        let tags: Vec<String> = blocks.iter().map(|el| el.tag_name()).collect();

        assert_eq!(tags, ["li", "li", "p"]);
        assert_eq!(blocks[0].text(), "Alpha");
    }

    #[test]
    fn test_element_attributes() {
        let doc = Document::parse(SAMPLE_HTML);
        let elements = doc.select("a").unwrap();

        assert_eq!(elements[0].attr("href"), Some("https://example.com"));
        assert_eq!(elements[0].tag_name(), "a");
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SAMPLE_HTML);
        assert!(matches!(doc.select("[[invalid"), Err(Blog2PodError::HtmlParseError(_))));
    }

    #[test]
    fn test_following_siblings_skip_non_elements() {
        let doc = Document::parse(SAMPLE_HTML);
        let h1 = doc.select("h1").unwrap().remove(0);
        let tags: Vec<String> = h1.following_siblings().map(|el| el.tag_name()).collect();

        assert_eq!(tags, vec!["p", "p", "a"]);
        assert!(h1.is_heading());
    }

    #[test]
    fn test_base_url() {
        let doc = Document::parse_with_url(SAMPLE_HTML, "https://blog.example.com/post/");
        assert_eq!(doc.base_url().map(Url::as_str), Some("https://blog.example.com/post/"));

        let doc = Document::parse_with_url(SAMPLE_HTML, "not a url");
        assert!(doc.base_url().is_none());
    }

    #[test]
    fn test_serialize_round_trips_content() {
        let doc = Document::parse(SAMPLE_HTML);
        let again = Document::parse(&doc.serialize());
        assert_eq!(again.select("p.content").unwrap().len(), 2);
    }
}
