//! Crawl a mock site through the job manager, then search the index

use sitesearch::config::{CrawlConfig, IndexConfig, SearchConfig, SiteConfig};
use sitesearch::lemma::Lemmatizer;
use sitesearch::manager::{CrawlManager, STOPPED_BY_USER};
use sitesearch::search::{SearchFailure, SearchService};
use sitesearch::store::{SiteStatus, Store};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    store: Store,
    manager: CrawlManager,
    search: SearchService,
    _tmp: TempDir,
}

async fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let store = Store::connect(&tmp.path().join("search.db")).await.unwrap();
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
    let search = SearchService::new(store.clone(), Lemmatizer::english(), SearchConfig::default());
    Harness {
        store,
        manager,
        search,
        _tmp: tmp,
    }
}

async fn html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

/// `/` mentions alpha and beta, `/b` beta (also in its title) and gamma, `/c` gamma
async fn three_page_site() -> MockServer {
    let server = MockServer::start().await;
    html(
        &server,
        "/",
        r#"<html><head><title>Home</title></head>
           <body>alpha beta <a href="/b">next</a> <a href="/c">more</a></body></html>"#,
    )
    .await;
    html(
        &server,
        "/b",
        "<html><head><title>Beta</title></head><body>beta gamma</body></html>",
    )
    .await;
    html(
        &server,
        "/c",
        "<html><head><title>Gamma</title></head><body>gamma</body></html>",
    )
    .await;
    server
}

async fn crawl(h: &Harness, site: &SiteConfig) -> SiteStatus {
    let id = h.manager.start_crawl(site).await.unwrap();
    h.manager.wait(id).await.unwrap().status
}

#[tokio::test]
async fn test_crawled_site_is_searchable() {
    let h = harness().await;
    let server = three_page_site().await;
    let site = SiteConfig::new(server.uri(), "Mock");

    assert_eq!(crawl(&h, &site).await, SiteStatus::Indexed);
    let stored = h.store.find_site_by_url(&site.url).await.unwrap().unwrap();
    assert_eq!(h.store.count_pages(stored.id).await.unwrap(), 3);

    let alpha = h.search.search("alpha", None, 0, None).await.unwrap().unwrap();
    assert_eq!(alpha.count, 1);
    assert_eq!(alpha.items[0].url, "");
    assert_eq!(alpha.items[0].title, "Home");
    assert_eq!(alpha.items[0].relevance, 1.0);
    assert!(alpha.items[0].snippet.contains("<b>alpha</b>"));

    // /b carries beta in title and body, / only in body
    let beta = h.search.search("beta", None, 0, None).await.unwrap().unwrap();
    let urls: Vec<&str> = beta.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["/b", ""]);
    assert_eq!(beta.items[0].relevance, 1.0);
    assert!(beta.items[1].relevance < 1.0);

    let both = h
        .search
        .search("beta gamma", Some(&format!("{}/", server.uri())), 0, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(both.count, 1);
    assert_eq!(both.items[0].url, "/b");

    let missing = h.search.search("zzz", None, 0, None).await.unwrap();
    assert_eq!(missing, Err(SearchFailure::LemmasNotFound));
}

#[tokio::test]
async fn test_recrawl_replaces_previous_index() {
    let h = harness().await;
    let server = three_page_site().await;
    let site = SiteConfig::new(server.uri(), "Mock");

    assert_eq!(crawl(&h, &site).await, SiteStatus::Indexed);
    assert_eq!(crawl(&h, &site).await, SiteStatus::Indexed);

    let stored = h.store.find_site_by_url(&site.url).await.unwrap().unwrap();
    assert_eq!(h.store.count_pages(stored.id).await.unwrap(), 3);
    let gamma = h.store.find_lemma(stored.id, "gamma").await.unwrap().unwrap();
    assert_eq!(gamma.frequency, 2);
}

#[tokio::test]
async fn test_stopped_crawl_leaves_other_sites_searchable() {
    let h = harness().await;
    let good = three_page_site().await;
    let good_site = SiteConfig::new(good.uri(), "Good");
    assert_eq!(crawl(&h, &good_site).await, SiteStatus::Indexed);

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>alpha</body></html>", "text/html")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&slow)
        .await;
    let slow_site = SiteConfig::new(slow.uri(), "Slow");

    let id = h.manager.start_crawl(&slow_site).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.manager.stop_crawl(id).await.unwrap();
    let outcome = h.manager.wait(id).await.unwrap();

    assert_eq!(outcome.status, SiteStatus::Failed);
    assert_eq!(outcome.last_error.as_deref(), Some(STOPPED_BY_USER));

    let stored = h.store.find_site_by_url(&slow_site.url).await.unwrap().unwrap();
    assert_eq!(h.store.count_pages(stored.id).await.unwrap(), 0);

    let alpha = h.search.search("alpha", None, 0, None).await.unwrap().unwrap();
    assert_eq!(alpha.count, 1);
    assert_eq!(alpha.items[0].site_name, "Good");
}
