//! Site crawling
//!
//! This module provides:
//! - A per-job frontier (work queue plus visited set) drained by a fixed
//!   pool of workers
//! - URL fetching with timeouts, fixed identity headers and an optional throttle
//! - Same-host link filtering and URL normalization
//! - Cooperative cancellation through a per-job [`CancellationToken`]

mod fetch;
mod frontier;
mod throttle;

pub use fetch::*;
pub use frontier::*;
pub use throttle::*;

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::parse::extract_links;
use crate::store::{Site, Store};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Outcome of one crawl job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Pages persisted with status 200
    pub pages_ok: usize,

    /// Pages persisted with any other status
    pub pages_failed: usize,

    /// Whether the job stopped because it was cancelled
    pub cancelled: bool,
}

impl CrawlStats {
    pub fn pages_saved(&self) -> usize {
        self.pages_ok + self.pages_failed
    }
}

/// Crawls sites into the store
pub struct Crawler {
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    config: CrawlConfig,
}

impl Crawler {
    /// Create a crawler fetching over HTTP
    pub fn new(store: Store, config: CrawlConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(store, Arc::new(fetcher), config))
    }

    pub fn with_fetcher(store: Store, fetcher: Arc<dyn Fetcher>, config: CrawlConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Traverse `site` from its root URL, persisting every fetched page.
    ///
    /// Returns when the frontier is drained or `cancel` fires. Cancellation is
    /// reported through [`CrawlStats::cancelled`], not as an error. A store
    /// failure stops every worker of the job and is returned.
    pub async fn crawl(&self, site: &Site, cancel: &CancellationToken) -> Result<CrawlStats> {
        let root = Url::parse(&site.url)?;
        if root.host_str().is_none() {
            return Err(Error::Crawl(format!("Site URL has no host: {}", site.url)));
        }

        let job = Arc::new(CrawlJob {
            site_id: site.id,
            root: root.clone(),
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            throttle: RequestThrottle::new(self.config.requests_per_second),
            frontier: Frontier::new(),
            cancel: cancel.child_token(),
            max_pages: self.config.max_pages,
            started: AtomicU32::new(0),
            pages_ok: AtomicUsize::new(0),
            pages_failed: AtomicUsize::new(0),
        });
        job.frontier.push(root).await;

        let workers = self.config.parallelism.max(1);
        info!(site = %site.url, workers, "Starting crawl");

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let job = job.clone();
            pool.spawn(async move { job.run_worker().await });
        }

        let mut failure = None;
        while let Some(joined) = pool.join_next().await {
            let outcome = joined.map_err(Error::from).and_then(|result| result);
            if let Err(e) = outcome {
                if failure.is_none() {
                    error!(site = %site.url, "Crawl worker failed: {}", e);
                    job.cancel.cancel();
                    failure = Some(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let stats = CrawlStats {
            pages_ok: job.pages_ok.load(Ordering::SeqCst),
            pages_failed: job.pages_failed.load(Ordering::SeqCst),
            cancelled: cancel.is_cancelled(),
        };
        info!(
            site = %site.url,
            "Crawl {}: {} pages ({} not OK)",
            if stats.cancelled { "stopped" } else { "finished" },
            stats.pages_saved(),
            stats.pages_failed
        );
        Ok(stats)
    }
}

/// State shared by the workers of one crawl
struct CrawlJob {
    site_id: i64,
    root: Url,
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    throttle: RequestThrottle,
    frontier: Frontier,
    cancel: CancellationToken,
    max_pages: u32,
    started: AtomicU32,
    pages_ok: AtomicUsize,
    pages_failed: AtomicUsize,
}

impl CrawlJob {
    async fn run_worker(&self) -> Result<()> {
        while let Some(url) = self.frontier.next(&self.cancel).await {
            let result = self.visit(&url).await;
            self.frontier.complete();
            result?;
        }
        Ok(())
    }

    async fn visit(&self, url: &Url) -> Result<()> {
        if self.cancel.is_cancelled() || !self.reserve_fetch() {
            return Ok(());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            _ = self.throttle.wait() => {}
        }
        let page = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            page = self.fetcher.fetch(url) => page,
        };
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let path = page_path(url);
        let saved = self
            .store
            .insert_page(self.site_id, &path, page.code, &page.body)
            .await?;
        if saved.is_none() {
            debug!("Page {} already stored, skipping", path);
            return Ok(());
        }
        self.store.touch_site(self.site_id).await?;

        if !page.is_success() {
            self.pages_failed.fetch_add(1, Ordering::SeqCst);
            debug!("{} returned {}", url, page.code);
            return Ok(());
        }
        self.pages_ok.fetch_add(1, Ordering::SeqCst);

        if !page.is_html {
            return Ok(());
        }

        let mut queued = 0;
        for link in extract_links(&page.body, &page.url) {
            if self.cancel.is_cancelled() {
                break;
            }
            if !same_site(&self.root, &link) || !should_crawl_url(&link) {
                continue;
            }
            if self.frontier.push(link).await {
                queued += 1;
            }
        }
        debug!("{}: {} new links", path, queued);
        Ok(())
    }

    /// Claim a slot under the page cap
    fn reserve_fetch(&self) -> bool {
        if self.max_pages == 0 {
            return true;
        }
        let claimed = self.started.fetch_add(1, Ordering::SeqCst);
        if claimed == self.max_pages {
            warn!("Reached max pages limit ({})", self.max_pages);
        }
        claimed < self.max_pages
    }
}

/// Normalize a URL for deduplication: no fragment, no trailing slash
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        normalized.set_path("/");
    } else {
        normalized.set_path(path);
    }

    normalized.to_string()
}

/// Path under which a page is stored: the URL path without trailing slash,
/// plus the query string if any
pub fn page_path(url: &Url) -> String {
    let trimmed = url.path().trim_end_matches('/');
    let mut path = if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    };
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

/// Whether `link` is served by the same host (and port) as the site root
pub fn same_site(root: &Url, link: &Url) -> bool {
    root.host_str() == link.host_str()
        && root.port_or_known_default() == link.port_or_known_default()
}

fn binary_resource_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\.(jpe?g|png|gif|bmp|svg|webp|ico|tiff?|pdf|zip|gz|tgz|bz2|xz|tar|rar|7z|mp3|mp4|m4a|ogg|wav|avi|mov|wmv|webm|exe|dmg|iso|docx?|xlsx?|pptx?|css|js|woff2?|ttf|eot)$",
            )
            .ok()
        })
        .as_ref()
}

/// Check whether a same-site link is worth fetching
pub fn should_crawl_url(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    !binary_resource_pattern().is_some_and(|re| re.is_match(url.path()))
}
