//! Search command implementation

use crate::error::Result;
use crate::search::{SearchItem, SearchOutcome, SearchService};
use serde::{Deserialize, Serialize};

/// Search options
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Root URL of the site to search; all sites when unset
    pub site: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// JSON shape of a search answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub count: usize,
    pub data: Vec<SearchItem>,
}

impl From<&SearchOutcome> for SearchResponse {
    fn from(outcome: &SearchOutcome) -> Self {
        match outcome {
            Ok(results) => Self {
                result: true,
                error: None,
                count: results.count,
                data: results.items.clone(),
            },
            Err(failure) => Self {
                result: false,
                error: Some(failure.reason()),
                count: 0,
                data: Vec::new(),
            },
        }
    }
}

/// Run a search
pub async fn cmd_search(
    service: &SearchService,
    query: &str,
    options: SearchOptions,
) -> Result<SearchOutcome> {
    service
        .search(query, options.site.as_deref(), options.offset, options.limit)
        .await
}

/// Print search results to console
pub fn print_search_results(outcome: &SearchOutcome) {
    let results = match outcome {
        Ok(results) => results,
        Err(failure) => {
            println!("No results: {}", failure.reason());
            return;
        }
    };

    println!("\n🔍 {} results\n", results.count);
    for (i, item) in results.items.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}{}",
            i + 1,
            item.relevance,
            item.site,
            if item.url.is_empty() { "/" } else { &item.url }
        );
        if !item.title.is_empty() {
            println!("   {}", item.title);
        }
        if !item.snippet.is_empty() {
            println!("   {}", item.snippet);
        }
        println!();
    }
}
