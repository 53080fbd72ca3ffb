//! Debounced search-as-you-type.
//!
//! Every call to [`SearchController::search`] starts a new generation. A
//! search only reports its result if no newer search began while it was
//! waiting out the debounce delay or running its query, so a slow older
//! request can never overwrite a newer one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::trace;

use crate::error::Result;

/// Default delay between the last keystroke and the query.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Result of a debounced search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<T> {
    /// The search is still the latest one; here are its results.
    Fresh(T),
    /// A newer search started; the results were discarded.
    Superseded,
}

impl<T> SearchOutcome<T> {
    /// The results, if they are still current.
    pub fn fresh(self) -> Option<T> {
        match self {
            Self::Fresh(value) => Some(value),
            Self::Superseded => None,
        }
    }

    /// Whether a newer search took over.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// Trim a raw search box value; blank input means "no search".
#[must_use]
pub fn normalize_query(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Coordinates overlapping searches from a single search box.
#[derive(Debug)]
pub struct SearchController {
    generation: AtomicU64,
    debounce: Duration,
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SearchController {
    /// Create a controller with the given debounce delay.
    #[must_use]
    pub const fn new(debounce: Duration) -> Self {
        Self {
            generation: AtomicU64::new(0),
            debounce,
        }
    }

    /// The debounce delay.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Start a new generation and return its number.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` is still the latest.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Discard whatever search is in flight.
    pub fn cancel(&self) {
        self.begin();
    }

    /// Wait out the debounce delay, then run `query` unless a newer search
    /// started in the meantime.
    ///
    /// # Errors
    ///
    /// Returns the query's error if it fails while still current. Errors from
    /// superseded queries are dropped like their results.
    pub async fn search<F, Fut, T>(&self, query: F) -> Result<SearchOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let generation = self.begin();

        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if !self.is_current(generation) {
            trace!(generation, "Search superseded while debouncing");
            return Ok(SearchOutcome::Superseded);
        }

        let result = query().await;
        if !self.is_current(generation) {
            trace!(generation, "Search superseded while querying");
            return Ok(SearchOutcome::Superseded);
        }

        result.map(SearchOutcome::Fresh)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  abc "), Some("abc"));
        assert_eq!(normalize_query("   "), None);
        assert_eq!(normalize_query(""), None);
    }

    #[test]
    fn test_generations_increase() {
        let controller = SearchController::default();
        let first = controller.begin();
        let second = controller.begin();
        assert!(second > first);
        assert!(controller.is_current(second));
        assert!(!controller.is_current(first));

        controller.cancel();
        assert!(!controller.is_current(second));
    }

    #[tokio::test]
    async fn test_single_search_is_fresh() {
        let controller = SearchController::new(Duration::from_millis(5));
        let outcome = controller.search(|| async { Ok(vec![1, 2]) }).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Fresh(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_keystroke_burst_runs_only_last_query() {
        let controller = SearchController::new(Duration::from_millis(40));
        let runs = AtomicUsize::new(0);

        let first = controller.search(|| async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok("A")
        });
        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            controller
                .search(|| async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok("AB")
                })
                .await
        };

        let (first, second) = tokio::join!(first, second);
        assert!(first.unwrap().is_superseded());
        assert_eq!(second.unwrap(), SearchOutcome::Fresh("AB"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_query_does_not_overwrite_newer() {
        let controller = SearchController::new(Duration::ZERO);

        let slow = controller.search(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("old")
        });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            controller.search(|| async { Ok("new") }).await
        };

        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), SearchOutcome::Superseded);
        assert_eq!(fast.unwrap().fresh(), Some("new"));
    }

    #[tokio::test]
    async fn test_current_error_is_reported() {
        let controller = SearchController::new(Duration::ZERO);
        let outcome: Result<SearchOutcome<()>> = controller
            .search(|| async { Err(Error::internal("backend down")) })
            .await;
        assert!(outcome.is_err());
    }
}
