//! Configuration management for sitesearch
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sites to crawl and search
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Indexing configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Lemmatizer configuration
    #[serde(default)]
    pub lemmatizer: LemmatizerConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// A crawl target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root URL, without trailing slash
    pub url: String,

    /// Display name, unique across the config
    pub name: String,
}

impl SiteConfig {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: normalize_site_url(&url.into()),
            name: name.into(),
        }
    }
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Concurrent fetch workers per crawl job
    #[serde(default = "default_crawl_parallelism")]
    pub parallelism: usize,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// Referer header sent with every request
    #[serde(default = "default_crawl_referrer")]
    pub referrer: String,

    /// Requests per second for one crawl job (0 = unthrottled)
    #[serde(default = "default_crawl_requests_per_second")]
    pub requests_per_second: u32,

    /// Maximum pages fetched per crawl job (0 = unlimited)
    #[serde(default = "default_crawl_max_pages")]
    pub max_pages: u32,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Weight of lemma occurrences inside `<title>`
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    /// Weight of lemma occurrences inside `<body>`
    #[serde(default = "default_body_weight")]
    pub body_weight: f64,

    /// Pages indexed concurrently
    #[serde(default = "default_index_parallelism")]
    pub parallelism: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned when no limit is given
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// A lemma found on every page of a site larger than this is dropped from the query
    #[serde(default = "default_frequent_lemma_page_threshold")]
    pub frequent_lemma_page_threshold: i64,

    /// Snippet length in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

/// Lemmatizer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LemmatizerConfig {
    /// Optional morphological dictionary (`form<TAB>lemma<TAB>POS` per line).
    /// The built-in English morphology is used when unset.
    #[serde(default)]
    pub dictionary_path: Option<PathBuf>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for sitesearch data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            parallelism: default_crawl_parallelism(),
            timeout_secs: default_crawl_timeout(),
            user_agent: default_crawl_user_agent(),
            referrer: default_crawl_referrer(),
            requests_per_second: default_crawl_requests_per_second(),
            max_pages: default_crawl_max_pages(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            title_weight: default_title_weight(),
            body_weight: default_body_weight(),
            parallelism: default_index_parallelism(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            frequent_lemma_page_threshold: default_frequent_lemma_page_threshold(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl Config {
    /// Get the default base directory for sitesearch (~/.sitesearch)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitesearch")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("search.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("search.db"),
            base_dir: base,
        };

        for site in &mut config.sites {
            site.url = normalize_site_url(&site.url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Find a configured site by URL (trailing slash insensitive)
    pub fn site_by_url(&self, url: &str) -> Option<&SiteConfig> {
        let wanted = normalize_site_url(url);
        self.sites.iter().find(|s| s.url == wanted)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.crawl.parallelism == 0 {
            return Err(Error::Config(
                "crawl.parallelism must be at least 1".to_string(),
            ));
        }

        if self.crawl.timeout_secs == 0 {
            return Err(Error::Config(
                "crawl.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.index.parallelism == 0 {
            return Err(Error::Config(
                "index.parallelism must be at least 1".to_string(),
            ));
        }

        if self.index.title_weight < 0.0 || self.index.body_weight < 0.0 {
            return Err(Error::Config(
                "index zone weights must not be negative".to_string(),
            ));
        }

        if self.index.title_weight == 0.0 && self.index.body_weight == 0.0 {
            return Err(Error::Config(
                "at least one index zone weight must be positive".to_string(),
            ));
        }

        if self.search.default_limit == 0 {
            return Err(Error::Config(
                "search.default_limit must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            let parsed = Url::parse(&site.url)
                .map_err(|e| Error::Config(format!("Invalid site URL '{}': {}", site.url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(Error::Config(format!(
                    "Site URL must be http(s) with a host: {}",
                    site.url
                )));
            }
            if !names.insert(site.name.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate site name: {}",
                    site.name
                )));
            }
        }

        Ok(())
    }
}

/// Strip trailing slashes so a site URL has one canonical spelling
pub fn normalize_site_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
