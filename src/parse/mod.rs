//! HTML parsing and text extraction
//!
//! This module handles:
//! - Title and body text extraction (the zones the indexer weighs)
//! - Outbound link extraction and resolution
//! - Whitespace normalization

mod html;

pub use html::*;

/// Text zones of a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageZones {
    /// Text of `<title>`
    pub title: String,

    /// Visible text of `<body>` (scripts and styles excluded)
    pub body: String,
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}
