//! Shared work queue of one crawl job

use super::normalize_url;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use url::Url;

/// URLs waiting to be fetched plus every URL ever accepted.
///
/// `pending` counts URLs that are queued or being processed. The job is
/// finished when it drops to zero; a worker calls [`Frontier::complete`] only
/// after pushing the links found on its page, so the count never reaches zero
/// while more work can still appear.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: Mutex<VecDeque<Url>>,
    visited: Mutex<HashSet<String>>,
    pending: AtomicUsize,
    changed: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `url` unless an equivalent URL was accepted before.
    /// Returns true if the URL was queued.
    pub async fn push(&self, url: Url) -> bool {
        if !self.visited.lock().await.insert(normalize_url(&url)) {
            return false;
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().await.push_back(url);
        self.changed.notify_waiters();
        true
    }

    /// Next URL to fetch. Waits while other workers may still add links and
    /// returns `None` once the job is drained or cancelled.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<Url> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return None;
            }
            if let Some(url) = self.queue.lock().await.pop_front() {
                return Some(url);
            }
            if self.pending.load(Ordering::SeqCst) == 0 {
                return None;
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Mark one URL returned by [`Frontier::next`] as fully processed
    pub fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.changed.notify_waiters();
        }
    }

    /// URLs queued or in flight
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Distinct URLs accepted so far
    pub async fn visited_count(&self) -> usize {
        self.visited.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_push_dedupes_equivalent_urls() {
        let frontier = Frontier::new();
        assert!(frontier.push(url("https://example.com/a")).await);
        assert!(!frontier.push(url("https://example.com/a/")).await);
        assert!(!frontier.push(url("https://example.com/a#top")).await);
        assert!(frontier.push(url("https://example.com/b")).await);

        assert_eq!(frontier.pending(), 2);
        assert_eq!(frontier.visited_count().await, 2);
    }

    #[tokio::test]
    async fn test_next_returns_none_when_drained() {
        let frontier = Frontier::new();
        let cancel = CancellationToken::new();
        frontier.push(url("https://example.com/")).await;

        let first = frontier.next(&cancel).await;
        assert_eq!(first, Some(url("https://example.com/")));
        frontier.complete();

        assert_eq!(frontier.next(&cancel).await, None);
    }

    #[tokio::test]
    async fn test_idle_worker_waits_for_children() {
        let frontier = Arc::new(Frontier::new());
        let cancel = CancellationToken::new();
        frontier.push(url("https://example.com/")).await;
        let root = frontier.next(&cancel).await;
        assert!(root.is_some());

        let waiter = {
            let frontier = frontier.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { frontier.next(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        frontier.push(url("https://example.com/child")).await;
        frontier.complete();

        let child = waiter.await.unwrap();
        assert_eq!(child, Some(url("https://example.com/child")));
    }

    #[tokio::test]
    async fn test_idle_workers_released_on_completion() {
        let frontier = Arc::new(Frontier::new());
        let cancel = CancellationToken::new();
        frontier.push(url("https://example.com/")).await;
        frontier.next(&cancel).await;

        let mut waiters = Vec::new();
        for _ in 0..4 {
            let frontier = frontier.clone();
            let cancel = cancel.clone();
            waiters.push(tokio::spawn(async move { frontier.next(&cancel).await }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.complete();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_cancel_releases_waiters() {
        let frontier = Arc::new(Frontier::new());
        let cancel = CancellationToken::new();
        frontier.push(url("https://example.com/")).await;
        frontier.push(url("https://example.com/other")).await;
        frontier.next(&cancel).await;

        cancel.cancel();
        assert_eq!(frontier.next(&cancel).await, None);
    }
}
