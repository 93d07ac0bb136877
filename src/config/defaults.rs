//! Default values for configuration

/// Default number of concurrent fetch workers per crawl job
pub fn default_crawl_parallelism() -> usize {
    120
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    10
}

/// Default user agent
pub fn default_crawl_user_agent() -> String {
    format!("sitesearch/{} (Site Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default referrer sent with every request
pub fn default_crawl_referrer() -> String {
    "https://www.google.com".to_string()
}

/// Default politeness throttle (0 = unthrottled)
pub fn default_crawl_requests_per_second() -> u32 {
    0
}

/// Default page cap per crawl job (0 = unlimited)
pub fn default_crawl_max_pages() -> u32 {
    0
}

/// Default weight of the `<title>` zone
pub fn default_title_weight() -> f64 {
    1.0
}

/// Default weight of the `<body>` zone
pub fn default_body_weight() -> f64 {
    0.8
}

/// Default number of pages indexed concurrently
pub fn default_index_parallelism() -> usize {
    4
}

/// Default number of search results
pub fn default_search_limit() -> usize {
    20
}

/// Sites with more pages than this may drop lemmas present on every page
pub fn default_frequent_lemma_page_threshold() -> i64 {
    1000
}

/// Default snippet length in characters
pub fn default_snippet_chars() -> usize {
    240
}
