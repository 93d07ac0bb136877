//! Result snippets
//!
//! A snippet is a window of the page's visible text around the first word
//! whose lemma is in the query, with every such word inside the window
//! wrapped in `<b>`. Page text is HTML-escaped.

use crate::lemma::Lemmatizer;
use crate::parse::extract_zones;
use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

const ELLIPSIS: &str = "...";

/// Build a highlighted snippet of at most about `max_chars` characters of page text
pub fn snippet(
    content: &str,
    lemmatizer: &Lemmatizer,
    lemmas: &BTreeSet<String>,
    max_chars: usize,
) -> String {
    let text = extract_zones(content).body;
    if text.is_empty() || max_chars == 0 {
        return String::new();
    }

    let matches: Vec<(usize, usize)> = text
        .unicode_word_indices()
        .filter(|(_, word)| {
            lemmatizer
                .lemma_of(word)
                .is_some_and(|lemma| lemmas.contains(&lemma))
        })
        .map(|(start, word)| (start, start + word.len()))
        .collect();

    let anchor = matches.first().map(|(start, _)| *start).unwrap_or(0);
    let (start, end) = window(&text, anchor, max_chars);

    let mut out = String::with_capacity(end - start + 32);
    if start > 0 {
        out.push_str(ELLIPSIS);
    }

    let mut cursor = start;
    for &(word_start, word_end) in &matches {
        if word_start < start || word_end > end {
            continue;
        }
        out.push_str(&escape(&text[cursor..word_start]));
        out.push_str("<b>");
        out.push_str(&escape(&text[word_start..word_end]));
        out.push_str("</b>");
        cursor = word_end;
    }
    out.push_str(&escape(&text[cursor..end]));

    if end < text.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Byte range of at most `max_chars` characters that contains `anchor`,
/// starting a little before it and cut at whitespace where possible
fn window(text: &str, anchor: usize, max_chars: usize) -> (usize, usize) {
    let lead = max_chars / 4;

    let mut start = text[..anchor]
        .char_indices()
        .rev()
        .nth(lead.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if lead == 0 {
        start = anchor;
    }
    if start > 0 {
        if let Some(ws) = text[start..anchor].find([' ', '\n']) {
            start += ws + 1;
        }
    }

    let mut end = text[start..]
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| start + i)
        .unwrap_or(text.len());
    if end < text.len() {
        if let Some(ws) = text[anchor..end].rfind([' ', '\n']) {
            end = anchor + ws;
        }
    }

    (start, end)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(lemmas: &[&str]) -> BTreeSet<String> {
        lemmas.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_highlights_matching_forms() {
        let html = "<html><body><p>Widgets are great. Buy a widget today.</p></body></html>";
        let s = snippet(html, &Lemmatizer::english(), &set(&["widget"]), 200);
        assert_eq!(s, "<b>Widgets</b> are great. Buy a <b>widget</b> today.");
    }

    #[test]
    fn test_window_around_first_match() {
        let filler = "lorem ".repeat(100);
        let html = format!("<body>{} engine start {}</body>", filler, filler);
        let s = snippet(&html, &Lemmatizer::english(), &set(&["engine"]), 60);

        assert!(s.starts_with(ELLIPSIS));
        assert!(s.ends_with(ELLIPSIS));
        assert!(s.contains("<b>engine</b>"));
        assert!(s.chars().count() <= 60 + 2 * ELLIPSIS.len() + "<b></b>".len());
    }

    #[test]
    fn test_no_match_returns_page_start() {
        let html = "<body>first words of the page</body>";
        let s = snippet(html, &Lemmatizer::english(), &set(&["zzz"]), 11);
        assert_eq!(s, "first...");
    }

    #[test]
    fn test_text_is_escaped() {
        let html = "<body>a &lt;tag&gt; near alpha</body>";
        let s = snippet(html, &Lemmatizer::english(), &set(&["alpha"]), 200);
        assert_eq!(s, "a &lt;tag&gt; near <b>alpha</b>");
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(
            snippet("<html></html>", &Lemmatizer::english(), &set(&["a"]), 100),
            ""
        );
    }
}
