//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::manager::CrawlManager;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Crawl state of one configured site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatusInfo {
    pub name: String,
    pub url: String,

    /// `None` when the site has never been crawled
    pub status: Option<String>,
    pub status_time: Option<String>,
    pub last_error: Option<String>,
    pub pages: i64,
    pub lemmas: i64,
}

/// Totals over all configured sites
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalStats {
    pub sites: usize,
    pub pages: i64,
    pub lemmas: i64,
    pub indexing: bool,
}

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub total: TotalStats,
    pub sites: Vec<SiteStatusInfo>,
}

/// Get the crawl status of every configured site
pub async fn cmd_status(
    config: &Config,
    manager: &CrawlManager,
    store: &Store,
) -> Result<StatusInfo> {
    info!("Getting status");

    let mut total = TotalStats {
        sites: config.sites.len(),
        ..TotalStats::default()
    };
    let mut sites = Vec::with_capacity(config.sites.len());

    for site in &config.sites {
        let item = match manager.crawl_status(&site.name).await? {
            Some(stored) => {
                let pages = store.count_pages(stored.id).await?;
                let lemmas = store.count_lemmas(stored.id).await?;
                total.indexing |= stored.status == "INDEXING";
                SiteStatusInfo {
                    name: site.name.clone(),
                    url: site.url.clone(),
                    status: Some(stored.status),
                    status_time: Some(stored.status_time),
                    last_error: stored.last_error,
                    pages,
                    lemmas,
                }
            }
            None => SiteStatusInfo {
                name: site.name.clone(),
                url: site.url.clone(),
                status: None,
                status_time: None,
                last_error: None,
                pages: 0,
                lemmas: 0,
            },
        };
        total.pages += item.pages;
        total.lemmas += item.lemmas;
        sites.push(item);
    }

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        total,
        sites,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 sitesearch Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);

    if status.sites.is_empty() {
        println!("\nNo sites configured. Add [[sites]] entries to the config file.");
        return;
    }

    println!("\nSites:");
    for site in &status.sites {
        println!("• {} ({})", site.name, site.url);
        match &site.status {
            Some(state) => {
                println!(
                    "  Status: {} since {}",
                    state,
                    site.status_time.as_deref().unwrap_or("?")
                );
                if let Some(error) = &site.last_error {
                    println!("  Last error: {}", error);
                }
                println!("  Pages: {}  Lemmas: {}", site.pages, site.lemmas);
            }
            None => println!("  Status: not crawled yet"),
        }
    }

    println!("\nTotal:");
    println!("  Sites: {}", status.total.sites);
    println!("  Pages: {}", status.total.pages);
    println!("  Lemmas: {}", status.total.lemmas);
    if status.total.indexing {
        println!("  (a crawl is in progress)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, SiteConfig};
    use crate::lemma::Lemmatizer;
    use crate::store::SiteStatus;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reports_configured_sites() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.sites = vec![
            SiteConfig::new("https://a.example", "A"),
            SiteConfig::new("https://b.example", "B"),
        ];

        let store = Store::connect(&config.paths.db_file).await.unwrap();
        let site = store.begin_site_crawl("https://a.example", "A").await.unwrap();
        let page = store.insert_page(site.id, "/", 200, "").await.unwrap().unwrap();
        let weights: HashMap<String, f64> = [("alpha".to_string(), 1.0)].into();
        store.index_page_lemmas(site.id, page, &weights).await.unwrap();
        store
            .finish_site(site.id, SiteStatus::Failed, Some("boom"))
            .await
            .unwrap();

        let manager = CrawlManager::new(
            store.clone(),
            Lemmatizer::english(),
            config.crawl.clone(),
            IndexConfig::default(),
        );
        let status = cmd_status(&config, &manager, &store).await.unwrap();

        assert_eq!(status.total.sites, 2);
        assert_eq!(status.total.pages, 1);
        assert_eq!(status.total.lemmas, 1);
        assert!(!status.total.indexing);

        let a = &status.sites[0];
        assert_eq!(a.status.as_deref(), Some("FAILED"));
        assert_eq!(a.last_error.as_deref(), Some("boom"));
        assert!(status.sites[1].status.is_none());
    }
}
