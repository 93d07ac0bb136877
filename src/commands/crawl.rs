//! Crawl command implementation

use crate::config::{normalize_site_url, Config, SiteConfig};
use crate::error::{Error, Result};
use crate::manager::{CrawlManager, JobOutcome};
use crate::store::SiteStatus;
use tracing::{info, warn};

/// Pick the configured sites named (by name or root URL) in `selectors`,
/// or every configured site when `selectors` is empty
pub fn select_sites(config: &Config, selectors: &[String]) -> Result<Vec<SiteConfig>> {
    if selectors.is_empty() {
        return Ok(config.sites.clone());
    }

    selectors
        .iter()
        .map(|selector| {
            let url = normalize_site_url(selector);
            config
                .sites
                .iter()
                .find(|site| site.name == *selector || site.url == url)
                .cloned()
                .ok_or_else(|| Error::SiteNotFound(selector.clone()))
        })
        .collect()
}

/// Crawl and index the selected sites, one job per site, and wait for all of them
pub async fn cmd_crawl(
    config: &Config,
    manager: &CrawlManager,
    selectors: &[String],
) -> Result<Vec<JobOutcome>> {
    let sites = select_sites(config, selectors)?;
    if sites.is_empty() {
        warn!("No sites configured; nothing to crawl");
        return Ok(Vec::new());
    }

    let mut jobs = Vec::with_capacity(sites.len());
    for site in &sites {
        jobs.push(manager.start_crawl(site).await?);
    }
    info!("Started {} crawl jobs", jobs.len());

    let mut outcomes = Vec::with_capacity(jobs.len());
    for id in jobs {
        outcomes.push(manager.wait(id).await?);
    }
    Ok(outcomes)
}

/// Print crawl outcomes
pub fn print_crawl_outcomes(outcomes: &[JobOutcome]) {
    println!("\n🕷  Crawl Complete\n");
    for outcome in outcomes {
        let mark = if outcome.status == SiteStatus::Indexed {
            "✓"
        } else {
            "✗"
        };
        println!("{} {} ({}) {}", mark, outcome.site_name, outcome.site_url, outcome.status);
        if let Some(crawl) = &outcome.crawl {
            println!(
                "  Pages: {} ({} not OK)",
                crawl.pages_saved(),
                crawl.pages_failed
            );
        }
        if let Some(index) = &outcome.index {
            println!("  Indexed pages: {}", index.pages_indexed);
        }
        if let Some(error) = &outcome.last_error {
            println!("  Error: {}", error);
        }
    }
}
