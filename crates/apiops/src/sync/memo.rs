//! Per-run task memoization keyed by identity.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

/// Runs each keyed task at most once and shares its outcome.
///
/// Concurrent callers of the same key wait on the first caller's work.
/// Work may request other keys recursively as long as no key waits on
/// itself.
pub struct Memo<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the outcome for `key`, running `work` if nobody has yet.
    pub async fn get_or_run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.entry(key).or_default())
        };
        cell.get_or_init(work).await.clone()
    }

    /// Number of keys requested so far.
    pub(crate) fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let memo: Memo<&str, Result<u32, Arc<String>>> = Memo::new();
        let runs = AtomicUsize::new(0);

        let calls = (0..16).map(|_| {
            memo.get_or_run("orders", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(Arc::new("boom".to_string()))
            })
        });
        let outcomes = join_all(calls).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(outcomes
            .iter()
            .all(|outcome| outcome.as_ref().unwrap_err().as_str() == "boom"));
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let memo: Memo<u32, u32> = Memo::new();
        let a = memo.get_or_run(1, || async { 10 }).await;
        let b = memo.get_or_run(2, || async { 20 }).await;
        let again = memo.get_or_run(1, || async { 99 }).await;
        assert_eq!((a, b, again), (10, 20, 10));
    }

    #[tokio::test]
    async fn test_recursive_requests_for_other_keys() {
        let memo: Arc<Memo<u32, u32>> = Arc::new(Memo::new());
        let inner = Arc::clone(&memo);
        let value = memo
            .get_or_run(1, || async move { inner.get_or_run(2, || async { 5 }).await + 1 })
            .await;
        assert_eq!(value, 6);
        assert_eq!(memo.get_or_run(2, || async { 0 }).await, 5);
    }
}
