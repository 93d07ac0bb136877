//! Per-site relevance ranking

use crate::error::Result;
use crate::store::{Lemma, Store};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relevance of one page for a multi-lemma query within its site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRelevance {
    pub page_id: i64,
    pub site_id: i64,

    /// Sum of the page's ranks over all query lemmas
    pub absolute: f64,

    /// `absolute` divided by the best `absolute` of the same site
    pub relative: f64,
}

/// Rank the pages of one site that contain every lemma in `lemmas`.
///
/// `lemmas` must belong to a single site and be sorted rarest first.
/// `offset`/`limit` apply to the index entries of the rarest lemma before
/// the other lemmas filter them, so a page of results can hold fewer than
/// `limit` entries even when more matching pages exist.
pub async fn rank_site(
    store: &Store,
    lemmas: &[Lemma],
    offset: usize,
    limit: usize,
) -> Result<Vec<PageRelevance>> {
    let Some((rarest, rest)) = lemmas.split_first() else {
        return Ok(Vec::new());
    };

    let candidates = store.find_index_by_lemma(rarest.id).await?;
    let mut ranked = Vec::new();

    'candidates: for entry in candidates.into_iter().skip(offset).take(limit) {
        let mut absolute = entry.rank;
        for lemma in rest {
            match store.find_index(lemma.id, entry.page_id).await? {
                Some(other) => absolute += other.rank,
                None => continue 'candidates,
            }
        }
        ranked.push(PageRelevance {
            page_id: entry.page_id,
            site_id: rarest.site_id,
            absolute,
            relative: 0.0,
        });
    }

    let max = ranked.iter().map(|r| r.absolute).fold(0.0_f64, f64::max);
    if max > 0.0 {
        for page in &mut ranked {
            page.relative = page.absolute / max;
        }
    }
    ranked.sort_by(|a, b| b.absolute.total_cmp(&a.absolute));

    debug!(
        "Site {}: {} pages match {} lemmas (best {:.2})",
        rarest.site_id,
        ranked.len(),
        lemmas.len(),
        max
    );
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct Fixture {
        store: Store,
        site_id: i64,
        pages: Vec<i64>,
        _tmp: TempDir,
    }

    /// One site whose pages carry the given (lemma, rank) pairs
    async fn fixture(pages: &[&[(&str, f64)]]) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let store = Store::connect(&tmp.path().join("test.db")).await.unwrap();
        let site = store
            .begin_site_crawl("https://example.com", "Example")
            .await
            .unwrap();

        let mut ids = Vec::new();
        for (n, weights) in pages.iter().enumerate() {
            let id = store
                .insert_page(site.id, &format!("/{}", n), 200, "")
                .await
                .unwrap()
                .unwrap();
            let weights: HashMap<String, f64> =
                weights.iter().map(|(l, r)| (l.to_string(), *r)).collect();
            store.index_page_lemmas(site.id, id, &weights).await.unwrap();
            ids.push(id);
        }

        Fixture {
            store,
            site_id: site.id,
            pages: ids,
            _tmp: tmp,
        }
    }

    async fn lemmas(f: &Fixture, names: &[&str]) -> Vec<Lemma> {
        let mut found = Vec::new();
        for name in names {
            found.push(f.store.find_lemma(f.site_id, name).await.unwrap().unwrap());
        }
        found.sort_by_key(|l| l.frequency);
        found
    }

    #[tokio::test]
    async fn test_single_lemma_relative_scores() {
        let f = fixture(&[&[("alpha", 2.0)], &[("alpha", 1.0)], &[("beta", 1.0)]]).await;
        let query = lemmas(&f, &["alpha"]).await;

        let ranked = rank_site(&f.store, &query, 0, 10).await.unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].page_id, f.pages[0]);
        assert_eq!(ranked[0].relative, 1.0);
        assert_eq!(ranked[1].relative, 0.5);
        assert!(ranked.iter().all(|r| r.site_id == f.site_id));
    }

    #[tokio::test]
    async fn test_pages_must_contain_every_lemma() {
        let f = fixture(&[
            &[("alpha", 1.0), ("beta", 0.8)],
            &[("beta", 1.8), ("gamma", 1.0)],
            &[("alpha", 1.0), ("beta", 3.0)],
        ])
        .await;
        let query = lemmas(&f, &["alpha", "beta"]).await;

        let ranked = rank_site(&f.store, &query, 0, 10).await.unwrap();

        let pages: Vec<i64> = ranked.iter().map(|r| r.page_id).collect();
        assert_eq!(pages, vec![f.pages[2], f.pages[0]]);
        assert!((ranked[0].absolute - 4.0).abs() < 1e-9);
        assert!((ranked[1].absolute - 1.8).abs() < 1e-9);
        assert_eq!(ranked[0].relative, 1.0);
    }

    #[tokio::test]
    async fn test_pagination_applies_before_filtering() {
        let f = fixture(&[
            &[("alpha", 1.0)],
            &[("alpha", 1.0), ("beta", 1.0)],
            &[("alpha", 1.0), ("beta", 1.0)],
            &[("alpha", 1.0), ("beta", 1.0)],
            &[("beta", 1.0)],
        ])
        .await;
        let query = lemmas(&f, &["alpha", "beta"]).await;
        assert_eq!(query[0].lemma, "alpha");

        // first two alpha pages are 0 and 1; page 0 lacks beta
        let ranked = rank_site(&f.store, &query, 0, 2).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].page_id, f.pages[1]);

        let ranked = rank_site(&f.store, &query, 2, 2).await.unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn test_no_lemmas_no_pages() {
        let f = fixture(&[&[("alpha", 1.0)]]).await;
        assert!(rank_site(&f.store, &[], 0, 10).await.unwrap().is_empty());
    }
}
