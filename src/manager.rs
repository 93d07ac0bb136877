//! Crawl job management
//!
//! Each crawl job runs on its own task with its own [`CancellationToken`],
//! so jobs for different sites never interfere. A job drives one site from
//! INDEXING to a terminal status: crawl, then index the successfully
//! fetched pages, then record INDEXED or FAILED.

use crate::config::{CrawlConfig, IndexConfig, SiteConfig};
use crate::crawl::{CrawlStats, Crawler};
use crate::error::{Error, Result};
use crate::index::{IndexStats, Indexer};
use crate::lemma::Lemmatizer;
use crate::store::{Site, SiteStatus, Store};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// `last_error` of a site whose crawl was cancelled
pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// Identifier of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::JobNotFound(format!("{}: {}", s, e)))
    }
}

/// What a finished job did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub site_url: String,
    pub site_name: String,
    pub status: SiteStatus,
    pub last_error: Option<String>,
    pub crawl: Option<CrawlStats>,
    pub index: Option<IndexStats>,
}

struct JobEntry {
    site_url: String,
    cancel: CancellationToken,
    handle: JoinHandle<JobOutcome>,
}

impl JobEntry {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Starts, stops and reports crawl jobs
#[derive(Clone)]
pub struct CrawlManager {
    store: Store,
    lemmatizer: Lemmatizer,
    crawl_config: CrawlConfig,
    index_config: IndexConfig,
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
}

impl CrawlManager {
    pub fn new(
        store: Store,
        lemmatizer: Lemmatizer,
        crawl_config: CrawlConfig,
        index_config: IndexConfig,
    ) -> Self {
        Self {
            store,
            lemmatizer,
            crawl_config,
            index_config,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a fresh crawl of `site`. Any earlier data for the site is
    /// dropped and the site is INDEXING by the time this returns.
    pub async fn start_crawl(&self, site: &SiteConfig) -> Result<JobId> {
        let mut jobs = self.jobs.lock().await;
        if jobs
            .values()
            .any(|job| job.site_url == site.url && job.is_running())
        {
            return Err(Error::CrawlInProgress(site.url.clone()));
        }

        let crawler = Crawler::new(self.store.clone(), self.crawl_config.clone())?;
        let indexer = Indexer::new(
            self.store.clone(),
            self.lemmatizer.clone(),
            &self.index_config,
        );

        let stored = self.store.begin_site_crawl(&site.url, &site.name).await?;

        let id = JobId::new();
        let cancel = CancellationToken::new();
        let job = CrawlJob {
            id,
            site: stored,
            store: self.store.clone(),
            crawler,
            indexer,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(job.run());

        info!(job = %id, site = %site.url, "Crawl job started");
        jobs.insert(
            id,
            JobEntry {
                site_url: site.url.clone(),
                cancel,
                handle,
            },
        );
        Ok(id)
    }

    /// Request a job to stop. The job records FAILED with
    /// [`STOPPED_BY_USER`] once its workers have unwound.
    pub async fn stop_crawl(&self, id: JobId) -> Result<()> {
        let jobs = self.jobs.lock().await;
        let job = jobs
            .get(&id)
            .ok_or_else(|| Error::JobNotFound(id.to_string()))?;
        info!(job = %id, site = %job.site_url, "Stopping crawl job");
        job.cancel.cancel();
        Ok(())
    }

    /// Stop every running job. Returns how many were signalled.
    pub async fn stop_all(&self) -> usize {
        let jobs = self.jobs.lock().await;
        let mut stopped = 0;
        for (id, job) in jobs.iter().filter(|(_, job)| job.is_running()) {
            info!(job = %id, site = %job.site_url, "Stopping crawl job");
            job.cancel.cancel();
            stopped += 1;
        }
        stopped
    }

    /// Wait for a job to finish and forget it
    pub async fn wait(&self, id: JobId) -> Result<JobOutcome> {
        let entry = self
            .jobs
            .lock()
            .await
            .remove(&id)
            .ok_or_else(|| Error::JobNotFound(id.to_string()))?;
        Ok(entry.handle.await?)
    }

    /// Forget every finished job, returning the outcomes nobody waited for
    pub async fn reap_finished(&self) -> Result<Vec<JobOutcome>> {
        let finished: Vec<JobEntry> = {
            let mut jobs = self.jobs.lock().await;
            let ids: Vec<JobId> = jobs
                .iter()
                .filter(|(_, job)| !job.is_running())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        let mut outcomes = Vec::with_capacity(finished.len());
        for entry in finished {
            outcomes.push(entry.handle.await?);
        }
        Ok(outcomes)
    }

    /// IDs and site URLs of jobs that have not finished
    pub async fn running_jobs(&self) -> Vec<(JobId, String)> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|(_, job)| job.is_running())
            .map(|(id, job)| (*id, job.site_url.clone()))
            .collect()
    }

    /// Stored crawl state of the site with this name
    pub async fn crawl_status(&self, site_name: &str) -> Result<Option<Site>> {
        self.store.find_site_by_name(site_name).await
    }
}

/// Everything one job task owns
struct CrawlJob {
    id: JobId,
    site: Site,
    store: Store,
    crawler: Crawler,
    indexer: Indexer,
    cancel: CancellationToken,
}

impl CrawlJob {
    async fn run(self) -> JobOutcome {
        let site = &self.site;
        let mut outcome = JobOutcome {
            site_url: site.url.clone(),
            site_name: site.name.clone(),
            status: SiteStatus::Failed,
            last_error: None,
            crawl: None,
            index: None,
        };

        let (status, last_error) = self.crawl_and_index(site, &mut outcome).await;

        match self
            .store
            .finish_site(site.id, status, last_error.as_deref())
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                job = %self.id,
                site = %site.url,
                "Site record vanished before the crawl finished"
            ),
            Err(e) => error!(
                job = %self.id,
                site = %site.url,
                "Could not record crawl result: {}",
                e
            ),
        }

        info!(job = %self.id, site = %site.url, status = %status, "Crawl job finished");
        outcome.status = status;
        outcome.last_error = last_error;
        outcome
    }

    async fn crawl_and_index(
        &self,
        site: &Site,
        outcome: &mut JobOutcome,
    ) -> (SiteStatus, Option<String>) {
        let stats = match self.crawler.crawl(site, &self.cancel).await {
            Ok(stats) => stats,
            Err(e) => return (SiteStatus::Failed, Some(e.to_string())),
        };
        let cancelled = stats.cancelled;
        outcome.crawl = Some(stats);
        if cancelled {
            return (SiteStatus::Failed, Some(STOPPED_BY_USER.to_string()));
        }

        let stats = match self.indexer.index_site(site.id, &self.cancel).await {
            Ok(stats) => stats,
            Err(e) => return (SiteStatus::Failed, Some(e.to_string())),
        };
        let cancelled = stats.cancelled;
        outcome.index = Some(stats);
        if cancelled {
            return (SiteStatus::Failed, Some(STOPPED_BY_USER.to_string()));
        }

        (SiteStatus::Indexed, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (CrawlManager, Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::connect(&tmp.path().join("test.db")).await.unwrap();
        let crawl_config = CrawlConfig {
            parallelism: 4,
            timeout_secs: 30,
            ..CrawlConfig::default()
        };
        let manager = CrawlManager::new(
            store.clone(),
            Lemmatizer::english(),
            crawl_config,
            IndexConfig::default(),
        );
        (manager, store, tmp)
    }

    async fn small_site() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><head><title>Home</title></head>
                   <body>alpha <a href="/b">b</a></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>beta</body></html>", "text/html"),
            )
            .mount(&server)
            .await;
        server
    }

    async fn slow_site() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>slow</body></html>", "text/html")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_job_indexes_site() {
        let (manager, store, _tmp) = setup().await;
        let server = small_site().await;
        let site = SiteConfig::new(server.uri(), "Small");

        let id = manager.start_crawl(&site).await.unwrap();
        let outcome = manager.wait(id).await.unwrap();

        assert_eq!(outcome.status, SiteStatus::Indexed);
        assert_eq!(outcome.crawl.unwrap().pages_ok, 2);
        assert_eq!(outcome.index.unwrap().pages_indexed, 2);

        let stored = manager.crawl_status("Small").await.unwrap().unwrap();
        assert_eq!(stored.get_status().unwrap(), SiteStatus::Indexed);
        assert!(stored.last_error.is_none());
        assert!(store.find_lemma(stored.id, "beta").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_one_job_per_site() {
        let (manager, _store, _tmp) = setup().await;
        let server = slow_site().await;
        let site = SiteConfig::new(server.uri(), "Slow");

        let id = manager.start_crawl(&site).await.unwrap();
        let second = manager.start_crawl(&site).await;
        assert!(matches!(second, Err(Error::CrawlInProgress(_))));

        manager.stop_crawl(id).await.unwrap();
        manager.wait(id).await.unwrap();
        assert!(manager.start_crawl(&site).await.is_ok());
        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_marks_site_failed() {
        let (manager, store, _tmp) = setup().await;
        let server = slow_site().await;
        let site = SiteConfig::new(server.uri(), "Slow");

        let id = manager.start_crawl(&site).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        manager.stop_crawl(id).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), manager.wait(id))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.status, SiteStatus::Failed);
        assert_eq!(outcome.last_error.as_deref(), Some(STOPPED_BY_USER));
        assert!(outcome.index.is_none());

        let stored = store.find_site_by_url(&site.url).await.unwrap().unwrap();
        assert_eq!(stored.get_status().unwrap(), SiteStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some(STOPPED_BY_USER));
    }

    #[tokio::test]
    async fn test_jobs_are_cancelled_independently() {
        let (manager, _store, _tmp) = setup().await;
        let slow = slow_site().await;
        let small = small_site().await;

        let slow_id = manager
            .start_crawl(&SiteConfig::new(slow.uri(), "Slow"))
            .await
            .unwrap();
        let small_id = manager
            .start_crawl(&SiteConfig::new(small.uri(), "Small"))
            .await
            .unwrap();

        manager.stop_crawl(slow_id).await.unwrap();

        let small_outcome = manager.wait(small_id).await.unwrap();
        let slow_outcome = manager.wait(slow_id).await.unwrap();
        assert_eq!(small_outcome.status, SiteStatus::Indexed);
        assert_eq!(slow_outcome.status, SiteStatus::Failed);
    }

    #[tokio::test]
    async fn test_site_is_indexing_when_start_returns() {
        let (manager, _store, _tmp) = setup().await;
        let server = small_site().await;
        let site = SiteConfig::new(server.uri(), "Small");

        for _ in 0..5 {
            let id = manager.start_crawl(&site).await.unwrap();
            let stored = manager.crawl_status("Small").await.unwrap().unwrap();
            assert_eq!(stored.get_status().unwrap(), SiteStatus::Indexing);

            let outcome = manager.wait(id).await.unwrap();
            assert_eq!(outcome.status, SiteStatus::Indexed);
        }
    }

    #[tokio::test]
    async fn test_reap_finished_jobs() {
        let (manager, _store, _tmp) = setup().await;
        let small = small_site().await;
        let slow = slow_site().await;

        let small_id = manager
            .start_crawl(&SiteConfig::new(small.uri(), "Small"))
            .await
            .unwrap();
        let slow_id = manager
            .start_crawl(&SiteConfig::new(slow.uri(), "Slow"))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.running_jobs().await.len() > 1 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        let reaped = manager.reap_finished().await.unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].site_name, "Small");
        assert_eq!(reaped[0].status, SiteStatus::Indexed);
        assert!(matches!(
            manager.wait(small_id).await,
            Err(Error::JobNotFound(_))
        ));

        manager.stop_crawl(slow_id).await.unwrap();
        manager.wait(slow_id).await.unwrap();
        assert!(manager.reap_finished().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (manager, _store, _tmp) = setup().await;
        let id: JobId = Uuid::new_v4().to_string().parse().unwrap();
        assert!(matches!(
            manager.stop_crawl(id).await,
            Err(Error::JobNotFound(_))
        ));
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }
}
