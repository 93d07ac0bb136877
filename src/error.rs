//! Custom error types for sitesearch

use thiserror::Error;

/// Main error type for sitesearch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Lemmatizer error: {0}")]
    Lemmatizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Crawl already running for {0}")]
    CrawlInProgress(String),

    #[error("Crawl job not found: {0}")]
    JobNotFound(String),

    #[error("Crawl task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for sitesearch
pub type Result<T> = std::result::Result<T, Error>;
