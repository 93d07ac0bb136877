//! Per-page lemma indexing
//!
//! A page is split into weighted zones (title and body), each zone is
//! lemmatized, and the weighted counts are merged into one map:
//! `weight[lemma] = Σ count_in_zone * zone_weight`. The map is written as one
//! index row per lemma, and each lemma's document frequency grows by one for
//! the page.

use crate::config::IndexConfig;
use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::parse::extract_zones;
use crate::store::{Page, Store};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// HTTP status of pages that are worth indexing
pub const INDEXABLE_STATUS: u16 = 200;

/// Weights applied to lemma counts per page zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneWeights {
    pub title: f64,
    pub body: f64,
}

impl Default for ZoneWeights {
    fn default() -> Self {
        Self {
            title: 1.0,
            body: 0.8,
        }
    }
}

impl From<&IndexConfig> for ZoneWeights {
    fn from(config: &IndexConfig) -> Self {
        Self {
            title: config.title_weight,
            body: config.body_weight,
        }
    }
}

/// Outcome of indexing one site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub pages_indexed: usize,
    pub pages_skipped: usize,
    pub index_rows_created: usize,
    pub cancelled: bool,
}

/// Writes lemma and index records for fetched pages
#[derive(Debug, Clone)]
pub struct Indexer {
    store: Store,
    lemmatizer: Lemmatizer,
    weights: ZoneWeights,
    parallelism: usize,
}

impl Indexer {
    pub fn new(store: Store, lemmatizer: Lemmatizer, config: &IndexConfig) -> Self {
        Self {
            store,
            lemmatizer,
            weights: ZoneWeights::from(config),
            parallelism: config.parallelism.max(1),
        }
    }

    /// Weighted lemma map of an HTML page
    pub fn page_weights(&self, content: &str) -> HashMap<String, f64> {
        let zones = extract_zones(content);
        let mut weights: HashMap<String, f64> = HashMap::new();

        let zoned = [
            (&zones.title, self.weights.title),
            (&zones.body, self.weights.body),
        ];
        for (text, zone_weight) in zoned {
            for (lemma, count) in self.lemmatizer.extract_lemmas(text) {
                *weights.entry(lemma).or_insert(0.0) += count as f64 * zone_weight;
            }
        }

        weights
    }

    /// Index a single page. Returns the number of new index rows.
    pub async fn index_page(&self, page: &Page) -> Result<usize> {
        let weights = self.page_weights(&page.content);
        let created = self
            .store
            .index_page_lemmas(page.site_id, page.id, &weights)
            .await?;
        debug!(
            "Indexed page {} ({}): {} lemmas, {} new rows",
            page.id,
            page.path,
            weights.len(),
            created
        );
        Ok(created)
    }

    /// Index every successfully fetched page of a site in page-ID order.
    ///
    /// Stops starting new pages once `cancel` fires; pages already indexed
    /// stay indexed.
    pub async fn index_site(&self, site_id: i64, cancel: &CancellationToken) -> Result<IndexStats> {
        let page_ids = self
            .store
            .find_page_ids_by_code(site_id, INDEXABLE_STATUS)
            .await?;
        info!("Indexing {} pages of site {}", page_ids.len(), site_id);

        let mut results = stream::iter(page_ids)
            .map(|page_id| self.index_page_id(page_id, cancel))
            .buffer_unordered(self.parallelism);

        let mut stats = IndexStats::default();
        while let Some(result) = results.next().await {
            match result? {
                Some(created) => {
                    stats.pages_indexed += 1;
                    stats.index_rows_created += created;
                }
                None => stats.pages_skipped += 1,
            }
        }
        stats.cancelled = cancel.is_cancelled();

        info!(
            "Indexed {} pages of site {} ({} skipped{})",
            stats.pages_indexed,
            site_id,
            stats.pages_skipped,
            if stats.cancelled { ", cancelled" } else { "" }
        );
        Ok(stats)
    }

    async fn index_page_id(
        &self,
        page_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        match self.store.get_page(page_id).await? {
            Some(page) => self.index_page(&page).await.map(Some),
            None => Ok(None),
        }
    }
}
