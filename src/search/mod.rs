//! Multi-site search over the lemma index
//!
//! A query is lemmatized, every candidate site is checked for all query
//! lemmas, lemmas found on every page of a large site are dropped, the rest
//! rank each site's pages (rarest lemma first), and the per-site results are
//! merged by relative relevance.

mod relevance;
mod snippet;

pub use relevance::*;
pub use snippet::*;

use crate::config::{normalize_site_url, SearchConfig};
use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::parse::page_title;
use crate::store::{Lemma, Site, Store};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a search produced no result list
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "site")]
pub enum SearchFailure {
    #[error("search site {0} not found")]
    SiteNotFound(String),

    #[error("search lemmas not found in database")]
    LemmasNotFound,

    #[error("no usable lemmas left after dropping too frequent ones")]
    NoUsableLemmas,

    #[error("nothing found")]
    NoResults,
}

impl SearchFailure {
    /// Human-readable reason
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// One ranked page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Root URL of the page's site
    pub site: String,
    pub site_name: String,

    /// Page path relative to the site root, without trailing slash
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f64,
}

/// Ordered search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub count: usize,
    pub items: Vec<SearchItem>,
}

/// Outcome of a search that reached the store without infrastructure errors
pub type SearchOutcome = std::result::Result<SearchResults, SearchFailure>;

/// Read-only query front end over the store
#[derive(Debug, Clone)]
pub struct SearchService {
    store: Store,
    lemmatizer: Lemmatizer,
    config: SearchConfig,
}

/// A site with the query lemmas it holds, rarest first
struct SiteQuery {
    site: Site,
    lemmas: Vec<Lemma>,
}

impl SearchService {
    pub fn new(store: Store, lemmatizer: Lemmatizer, config: SearchConfig) -> Self {
        Self {
            store,
            lemmatizer,
            config,
        }
    }

    /// Search `query` over one site (by root URL) or, with no filter, over
    /// every site in the store.
    ///
    /// `limit` of `None` or zero uses the configured default.
    pub async fn search(
        &self,
        query: &str,
        site_filter: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<SearchOutcome> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.config.default_limit);
        info!(
            query,
            site = site_filter.unwrap_or("*"),
            offset,
            limit,
            "Search request"
        );

        let sites = self.resolve_sites(site_filter).await?;
        if sites.is_empty() {
            let site = site_filter.unwrap_or("(any)").to_string();
            warn!("Search site {} not found", site);
            return Ok(Err(SearchFailure::SiteNotFound(site)));
        }

        let query_lemmas = self.lemmatizer.lemma_set(query);
        debug!("Query lemmas: {:?}", query_lemmas);

        let candidates = self.sites_with_all_lemmas(sites, &query_lemmas).await?;
        if candidates.is_empty() {
            return Ok(Err(SearchFailure::LemmasNotFound));
        }

        let usable = self.drop_frequent_lemmas(candidates).await?;
        if usable.is_empty() {
            return Ok(Err(SearchFailure::NoUsableLemmas));
        }

        let mut ranked = Vec::new();
        let mut sites_by_id = HashMap::new();
        for site_query in usable {
            let pages = rank_site(&self.store, &site_query.lemmas, offset, limit).await?;
            ranked.extend(pages);
            sites_by_id.insert(site_query.site.id, site_query.site);
        }

        ranked.retain(|page| page.relative > 0.0);
        ranked.sort_by(|a, b| b.relative.total_cmp(&a.relative));
        ranked.truncate(limit);
        if ranked.is_empty() {
            return Ok(Err(SearchFailure::NoResults));
        }

        let mut items = Vec::with_capacity(ranked.len());
        for page in ranked {
            let (Some(site), Some(stored)) = (
                sites_by_id.get(&page.site_id),
                self.store.get_page(page.page_id).await?,
            ) else {
                continue;
            };

            let url = stored.path.trim_end_matches('/').to_string();
            info!("Site {}{} relevance {:.3}", site.url, url, page.relative);
            items.push(SearchItem {
                site: site.url.clone(),
                site_name: site.name.clone(),
                url,
                title: page_title(&stored.content).unwrap_or_default(),
                snippet: snippet(
                    &stored.content,
                    &self.lemmatizer,
                    &query_lemmas,
                    self.config.snippet_chars,
                ),
                relevance: page.relative,
            });
        }

        if items.is_empty() {
            return Ok(Err(SearchFailure::NoResults));
        }
        Ok(Ok(SearchResults {
            count: items.len(),
            items,
        }))
    }

    async fn resolve_sites(&self, site_filter: Option<&str>) -> Result<Vec<Site>> {
        match site_filter.map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => Ok(self
                .store
                .find_site_by_url(&normalize_site_url(url))
                .await?
                .into_iter()
                .collect()),
            None => self.store.list_sites().await,
        }
    }

    /// Keep only sites that hold every query lemma
    async fn sites_with_all_lemmas(
        &self,
        sites: Vec<Site>,
        query_lemmas: &BTreeSet<String>,
    ) -> Result<Vec<SiteQuery>> {
        let mut qualified = Vec::new();
        if query_lemmas.is_empty() {
            return Ok(qualified);
        }

        'sites: for site in sites {
            let mut lemmas = Vec::with_capacity(query_lemmas.len());
            for text in query_lemmas {
                match self.store.find_lemma(site.id, text).await? {
                    Some(lemma) => lemmas.push(lemma),
                    None => {
                        debug!("Site {} lacks lemma {:?}", site.url, text);
                        continue 'sites;
                    }
                }
            }
            qualified.push(SiteQuery { site, lemmas });
        }

        Ok(qualified)
    }

    /// Drop lemmas present on every page of a site larger than the threshold,
    /// then sort each site's lemmas rarest first
    async fn drop_frequent_lemmas(&self, candidates: Vec<SiteQuery>) -> Result<Vec<SiteQuery>> {
        let threshold = self.config.frequent_lemma_page_threshold;
        let mut usable = Vec::with_capacity(candidates.len());

        for mut candidate in candidates {
            let page_count = self.store.count_pages(candidate.site.id).await?;
            candidate.lemmas.retain(|lemma| {
                let frequent = lemma.frequency >= page_count && page_count > threshold;
                if frequent {
                    warn!(
                        "Dropping lemma {:?} on {}: on {} of {} pages",
                        lemma.lemma, candidate.site.url, lemma.frequency, page_count
                    );
                }
                !frequent
            });

            if candidate.lemmas.is_empty() {
                continue;
            }
            candidate.lemmas.sort_by_key(|lemma| lemma.frequency);
            usable.push(candidate);
        }

        Ok(usable)
    }
}
