use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use tokio::sync::Mutex;

use crate::error::Result;

/// Run-scoped memo for expensive lookups.
///
/// Keys are canonical scalars (ids, URLs), never whole records. Only successful
/// lookups are stored, so a failed fetch is retried by the next caller. Nothing
/// is ever invalidated: callers that mutate what a memo describes must not
/// read it back through the memo.
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub async fn get_or_try_insert<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cached = self.entries.lock().await.get(&key).cloned();
        if let Some(value) = cached {
            return Ok(value);
        }
        let value = fetch().await?;
        self.entries.lock().await.insert(key, value.clone());
        Ok(value)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EntityKind, TrackerError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_lookup_is_served_from_memo() {
        let memo: Memo<u64, String> = Memo::default();
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo
                .get_or_try_insert(7, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok("on deck".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "on deck");
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len().await, 1);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let memo: Memo<&'static str, u64> = Memo::default();

        let err = memo
            .get_or_try_insert("issue", || async {
                Err(TrackerError::operation("get", "issue", "503"))
            })
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(memo.len().await, 0);

        let value = memo
            .get_or_try_insert("issue", || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);

        let missing = memo
            .get_or_try_insert("other", || async {
                Err(TrackerError::not_found(EntityKind::Issue, "other"))
            })
            .await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
