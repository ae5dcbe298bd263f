/// Field extraction from a fetched storefront page.
///
/// Everything here is best-effort: a missing element yields an empty field, and a
/// JSON-LD block that does not parse is skipped rather than failing the page.
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::model::{SchemaCheck, ScrapeResult};

/// Parsed JSON-LD documents kept for the prompt.
pub const MAX_JSON_LD_DOCS: usize = 2;
/// `<h2>` texts kept, in document order.
pub const MAX_H2: usize = 5;

/// Build a [`ScrapeResult`] from an HTML document fetched from `url`.
pub fn extract(url: &str, html: &str) -> ScrapeResult {
    let document = Html::parse_document(html);

    let json_ld = extract_json_ld(&document);
    let schema_check = SchemaCheck::from_found(!json_ld.is_empty());

    ScrapeResult {
        url: url.to_string(),
        title: extract_title(&document),
        description: extract_meta_description(&document),
        h1: heading_texts(&document, "h1", usize::MAX),
        h2: heading_texts(&document, "h2", MAX_H2),
        schema_check,
        raw_json_ld: json_ld.into_iter().take(MAX_JSON_LD_DOCS).collect(),
    }
}

/// Every `application/ld+json` block that parses, in document order.
fn extract_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector");

    let mut docs = Vec::new();
    for (position, script) in document.select(&selector).enumerate() {
        let body: String = script.text().collect();
        if body.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => docs.push(value),
            Err(e) => {
                debug!(position, error = %e, "skipping malformed JSON-LD block");
            }
        }
    }
    docs
}

fn extract_title(document: &Html) -> String {
    let selector = Selector::parse("title").expect("valid selector");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_meta_description(document: &Html) -> String {
    let selector = Selector::parse(r#"meta[name="description"]"#).expect("valid selector");
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
        .unwrap_or_default()
}

fn heading_texts(document: &Html, tag: &str, limit: usize) -> Vec<String> {
    let selector = Selector::parse(tag).expect("valid selector");
    document
        .select(&selector)
        .take(limit)
        .map(stripped_text)
        .collect()
}

/// Text content of `el` with runs of whitespace collapsed to single spaces.
fn stripped_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
