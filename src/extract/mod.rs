//! HTML parsing: outbound hrefs and visible page text.

use scraper::{ElementRef, Html};

use crate::error::PageError;

pub mod tokenizer;

pub use tokenizer::Tokenizer;

/// Elements whose text never counts as page content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Raw hrefs in document order. Nothing is resolved or deduplicated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkExtraction {
    pub hrefs: Vec<String>,
    /// Anchors that had no `href` attribute.
    pub missing_href: usize,
}

/// Decodes and parses a page body. Invalid UTF-8 is replaced rather than
/// rejected; an absent or blank body is a parse error.
pub fn parse_body(url: &str, body: Option<&[u8]>) -> Result<Html, PageError> {
    let bytes = body.ok_or_else(|| PageError::MissingBody(url.to_string()))?;
    let html = String::from_utf8_lossy(bytes);
    if html.trim().is_empty() {
        return Err(PageError::MissingBody(url.to_string()));
    }
    Ok(Html::parse_document(&html))
}

pub fn extract_links(document: &Html) -> LinkExtraction {
    let mut extraction = LinkExtraction {
        hrefs: Vec::with_capacity(32),
        missing_href: 0,
    };

    for element in document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "a")
    {
        match element.value().attr("href") {
            Some(href) => extraction.hrefs.push(href.to_string()),
            None => extraction.missing_href += 1,
        }
    }
    extraction
}

/// Visible text of the whole document, script and style contents removed,
/// fragments joined with single spaces.
pub fn page_text(document: &Html) -> String {
    let fragments = document
        .root_element()
        .descendants()
        .filter(|node| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
            })
        })
        .filter_map(|node| node.value().as_text().map(|text| &**text));
    clean_text(fragments)
}

fn clean_text<'a>(text_iter: impl Iterator<Item = &'a str>) -> String {
    let mut buffer = String::with_capacity(1024);
    let mut first = true;
    for part in text_iter {
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            if !first {
                buffer.push(' ');
            }
            buffer.push_str(trimmed);
            first = false;
        }
    }
    buffer
}
