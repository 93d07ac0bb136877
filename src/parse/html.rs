//! HTML parsing and text extraction

use super::{normalize_whitespace, PageZones};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Elements whose text never counts as page content
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Split a page into its title and body zones
pub fn extract_zones(content: &str) -> PageZones {
    let document = Html::parse_document(content);

    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|e| normalize_whitespace(&e.text().collect::<String>()))
        .unwrap_or_default();

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(visible_text)
        .unwrap_or_else(|| visible_text(document.root_element()));

    PageZones { title, body }
}

/// Page title, if the page has a non-empty `<title>`
pub fn page_title(content: &str) -> Option<String> {
    let title = extract_zones(content).title;
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Extract outbound links as absolute http(s) URLs, in document order without duplicates
pub fn extract_links(content: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(content);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for elem in document.select(&selector) {
        let Some(href) = elem.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let resolved = match base.join(href) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping malformed link {:?} on {}: {}", href, base, e);
                continue;
            }
        };

        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }

    links
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut text = String::new();

    for node in root.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }

    normalize_whitespace(&text)
}
