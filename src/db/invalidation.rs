// src/db/invalidation.rs
//
// Table invalidation and live queries
//
// Writers announce which table they touched; live queries re-run when one of
// the tables they read from is announced. Queries run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::error::AppResult;

/// A failed query is re-run after this long when no write wakes it sooner
pub const QUERY_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Catalog tables that live queries can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Folder,
    Media,
}

/// Broadcasts table writes to live queries
#[derive(Debug, Clone)]
pub struct InvalidationTracker {
    sender: broadcast::Sender<Table>,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Announce a write to `table`
    pub fn notify(&self, table: Table) {
        // No receivers simply means nobody is observing right now
        let _ = self.sender.send(table);
        log::trace!("table invalidated: {:?}", table);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.sender.subscribe()
    }
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new()
    }
}

type QueryFn<T> = Arc<dyn Fn() -> AppResult<T> + Send + Sync>;

/// A query whose result is re-read whenever a watched table changes
pub struct LiveQuery<T> {
    tables: Vec<Table>,
    receiver: broadcast::Receiver<Table>,
    query: QueryFn<T>,
    primed: bool,
    failed: bool,
}

impl<T: Send + 'static> LiveQuery<T> {
    pub fn new<F>(tracker: &InvalidationTracker, tables: &[Table], query: F) -> Self
    where
        F: Fn() -> AppResult<T> + Send + Sync + 'static,
    {
        Self {
            tables: tables.to_vec(),
            receiver: tracker.subscribe(),
            query: Arc::new(query),
            primed: false,
            failed: false,
        }
    }

    /// Wait until the result may have changed.
    ///
    /// The first call resolves immediately so the initial result gets loaded.
    /// After a failed fetch it also resolves on its own after
    /// [`QUERY_RETRY_DELAY`]. Returns `false` once the tracker has gone away.
    /// Cancel-safe.
    pub async fn changed(&mut self) -> bool {
        if !self.primed {
            self.primed = true;
            return true;
        }

        if self.failed {
            return tokio::select! {
                changed = self.table_written() => changed,
                _ = tokio::time::sleep(QUERY_RETRY_DELAY) => true,
            };
        }

        self.table_written().await
    }

    /// Run the query once on the blocking pool
    pub async fn fetch(&mut self) -> AppResult<T> {
        let query = Arc::clone(&self.query);
        let result = tokio::task::spawn_blocking(move || query()).await?;
        self.failed = result.is_err();
        result
    }

    /// Wait for a change and return the fresh result; `None` when the stream ended
    pub async fn next(&mut self) -> Option<AppResult<T>> {
        if !self.changed().await {
            return None;
        }
        Some(self.fetch().await)
    }

    async fn table_written(&mut self) -> bool {
        loop {
            match self.receiver.recv().await {
                Ok(table) if self.tables.contains(&table) => {
                    self.drain_pending();
                    return true;
                }
                Ok(_) => continue,
                // Missed notifications: re-reading is always correct
                Err(RecvError::Lagged(_)) => return true,
                Err(RecvError::Closed) => return false,
            }
        }
    }

    /// Coalesce a burst of writes into a single re-query
    fn drain_pending(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_next_loads_immediately() {
        let tracker = InvalidationTracker::new();
        let mut query = LiveQuery::new(&tracker, &[Table::Media], || Ok(42));
        assert_eq!(query.next().await.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_requeries_on_watched_table_only() {
        let tracker = InvalidationTracker::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let mut query = LiveQuery::new(&tracker, &[Table::Media], move || {
            Ok(runs_clone.fetch_add(1, Ordering::SeqCst) + 1)
        });

        assert_eq!(query.next().await.unwrap().unwrap(), 1);

        tracker.notify(Table::Folder);
        let waited = tokio::time::timeout(Duration::from_millis(50), query.changed()).await;
        assert!(waited.is_err(), "folder writes must not wake a media query");

        tracker.notify(Table::Media);
        assert_eq!(query.next().await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let tracker = InvalidationTracker::new();
        let mut query = LiveQuery::new(&tracker, &[Table::Media], || Ok(()));
        query.next().await.unwrap().unwrap();

        tracker.notify(Table::Media);
        tracker.notify(Table::Media);
        tracker.notify(Table::Media);
        assert!(query.changed().await);

        let waited = tokio::time::timeout(Duration::from_millis(50), query.changed()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_without_a_write() {
        let tracker = InvalidationTracker::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let mut query = LiveQuery::new(&tracker, &[Table::Media], move || {
            match runs_clone.fetch_add(1, Ordering::SeqCst) {
                0 => Err(AppError::Other("database is locked".to_string())),
                n => Ok(n),
            }
        });

        assert!(query.next().await.unwrap().is_err());

        let retried = tokio::time::timeout(QUERY_RETRY_DELAY * 4, query.next()).await;
        assert_eq!(retried.unwrap().unwrap().unwrap(), 1);

        // Healthy again: back to waiting for writes
        let waited = tokio::time::timeout(QUERY_RETRY_DELAY * 2, query.changed()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_failed_load_retries_early_on_write() {
        let tracker = InvalidationTracker::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let mut query = LiveQuery::new(&tracker, &[Table::Media], move || {
            match runs_clone.fetch_add(1, Ordering::SeqCst) {
                0 => Err(AppError::NotFound),
                n => Ok(n),
            }
        });

        assert!(query.next().await.unwrap().is_err());
        tracker.notify(Table::Media);

        let retried = tokio::time::timeout(QUERY_RETRY_DELAY / 2, query.next()).await;
        assert_eq!(retried.unwrap().unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stream_ends_when_tracker_dropped() {
        let tracker = InvalidationTracker::new();
        let mut query = LiveQuery::new(&tracker, &[Table::Media], || Ok(()));
        query.next().await.unwrap().unwrap();
        drop(tracker);
        assert!(query.next().await.is_none());
    }
}
