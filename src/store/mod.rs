//! Persistent storage using SQLite
//!
//! This module holds the four record types the engine works with:
//! - Sites (crawl targets and their crawl state)
//! - Pages (fetched documents)
//! - Lemmas (per-site document frequency)
//! - Index entries (weighted lemma occurrences per page)

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Crawl state of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::Indexing => write!(f, "INDEXING"),
            SiteStatus::Indexed => write!(f, "INDEXED"),
            SiteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            _ => Err(Error::Parse(format!("Unknown site status: {}", s))),
        }
    }
}

/// A crawl target
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
    pub url: String,
    pub name: String,
}

impl Site {
    pub fn get_status(&self) -> Result<SiteStatus> {
        self.status.parse()
    }
}

/// A fetched page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: i64,
    pub content: String,
}

/// A lemma with its document frequency within one site
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// Weighted occurrence of a lemma on a page
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    pub lemma_id: i64,
    pub page_id: i64,
    pub rank: f64,
}

/// Search database handle
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    /// Serializes index writes so lemma frequency updates never interleave
    index_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Open (and create if needed) the database at `db_path`
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            index_lock: Arc::new(Mutex::new(())),
        };

        if !store.is_initialized().await? {
            store.init_schema().await?;
        }

        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='sites'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Site Operations =====

    /// Replace any previous record for `url` with a fresh INDEXING site
    pub async fn begin_site_crawl(&self, url: &str, name: &str) -> Result<Site> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM sites WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed > 0 {
            debug!("Dropped previous crawl data for {}", url);
        }

        let id = sqlx::query(
            r#"
            INSERT INTO sites (status, status_time, last_error, url, name)
            VALUES (?, ?, NULL, ?, ?)
            "#,
        )
        .bind(SiteStatus::Indexing.to_string())
        .bind(&now)
        .bind(url)
        .bind(name)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        Ok(Site {
            id,
            status: SiteStatus::Indexing.to_string(),
            status_time: now,
            last_error: None,
            url: url.to_string(),
            name: name.to_string(),
        })
    }

    /// Get site by ID
    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// Get site by name
    pub async fn find_site_by_name(&self, name: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// Get site by root URL
    pub async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// List all sites
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Refresh `status_time` while a crawl makes progress
    pub async fn touch_site(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a site to a terminal status. Returns false if the site no longer exists.
    pub async fn finish_site(
        &self,
        id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE sites SET status = ?, status_time = ?, last_error = ? WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Delete a site with its pages, lemmas and index entries
    pub async fn delete_site(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Page Operations =====

    /// Insert a page. Returns `None` if the path is already stored for the site.
    pub async fn insert_page(
        &self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> Result<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT INTO pages (site_id, path, code, content)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO NOTHING
            "#,
        )
        .bind(site_id)
        .bind(path)
        .bind(i64::from(code))
        .bind(content)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    /// Get page by ID
    pub async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(page)
    }

    /// IDs of the site's pages with the given HTTP status, in ID order
    pub async fn find_page_ids_by_code(&self, site_id: i64, code: u16) -> Result<Vec<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM pages WHERE site_id = ? AND code = ? ORDER BY id")
                .bind(site_id)
                .bind(i64::from(code))
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Number of pages stored for a site, whatever their status
    pub async fn count_pages(&self, site_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== Lemma and Index Operations =====

    /// Get a site's lemma row
    pub async fn find_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>> {
        let row = sqlx::query_as::<_, Lemma>("SELECT * FROM lemmas WHERE site_id = ? AND lemma = ?")
            .bind(site_id)
            .bind(lemma)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Number of distinct lemmas for a site
    pub async fn count_lemmas(&self, site_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All index entries of a lemma, in page ID order
    pub async fn find_index_by_lemma(&self, lemma_id: i64) -> Result<Vec<IndexEntry>> {
        let entries = sqlx::query_as::<_, IndexEntry>(
            "SELECT * FROM search_index WHERE lemma_id = ? ORDER BY page_id",
        )
        .bind(lemma_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// The index entry of a lemma on one page
    pub async fn find_index(&self, lemma_id: i64, page_id: i64) -> Result<Option<IndexEntry>> {
        let entry = sqlx::query_as::<_, IndexEntry>(
            "SELECT * FROM search_index WHERE lemma_id = ? AND page_id = ?",
        )
        .bind(lemma_id)
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Record a page's lemma weights.
    ///
    /// Runs as one transaction under the store's index lock. A lemma's
    /// `frequency` is incremented only when its index row for this page is
    /// new, so indexing the same page again (or concurrently) never counts it
    /// twice. Returns the number of index rows inserted.
    pub async fn index_page_lemmas(
        &self,
        site_id: i64,
        page_id: i64,
        weights: &HashMap<String, f64>,
    ) -> Result<usize> {
        let _guard = self.index_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for (lemma, rank) in weights {
            sqlx::query(
                r#"
                INSERT INTO lemmas (site_id, lemma, frequency)
                VALUES (?, ?, 0)
                ON CONFLICT(site_id, lemma) DO NOTHING
                "#,
            )
            .bind(site_id)
            .bind(lemma)
            .execute(&mut *tx)
            .await?;

            let lemma_id: i64 =
                sqlx::query_scalar("SELECT id FROM lemmas WHERE site_id = ? AND lemma = ?")
                    .bind(site_id)
                    .bind(lemma)
                    .fetch_one(&mut *tx)
                    .await?;

            let added = sqlx::query(
                r#"
                INSERT INTO search_index (lemma_id, page_id, rank)
                VALUES (?, ?, ?)
                ON CONFLICT(lemma_id, page_id) DO NOTHING
                "#,
            )
            .bind(lemma_id)
            .bind(page_id)
            .bind(rank)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if added > 0 {
                sqlx::query("UPDATE lemmas SET frequency = frequency + 1 WHERE id = ?")
                    .bind(lemma_id)
                    .execute(&mut *tx)
                    .await?;
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
