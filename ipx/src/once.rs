//! A "run the producer at most once, return the same result to everyone"
//! primitive.
//!
//! `tokio::sync::OnceCell` only memoizes the `Ok` branch of a
//! `get_or_try_init` call: a failing initializer leaves the cell empty so
//! the *next* caller retries it. The request engine needs the opposite:
//! `getSrc`/`getData` must observe one outcome, success or failure, across
//! every concurrent awaiter of the same image descriptor. `Once` wraps the
//! outcome itself in the cell so a failure is cached too.
use std::future::Future;

use tokio::sync::OnceCell;

use crate::error::IpxError;

/// Deferred, memoized producer of a `T`, shared by every caller holding a
/// reference to the same `Once`.
pub struct Once<T> {
    cell: OnceCell<Result<T, IpxError>>,
}

impl<T> Once<T>
where
    T: Clone,
{
    pub fn new() -> Once<T> {
        Once { cell: OnceCell::new() }
    }

    /// Run `producer` at most once. Concurrent callers before the first
    /// completion await the same in-flight future; callers after it observe
    /// the cached result (`Ok` or `Err`) without re-running `producer`.
    pub async fn get_or_init<F, Fut>(&self, producer: F) -> Result<T, IpxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, IpxError>>,
    {
        let result = self
            .cell
            .get_or_init(|| async { producer().await })
            .await;
        result.clone()
    }
}

impl<T> Default for Once<T>
where
    T: Clone,
{
    fn default() -> Self {
        Once::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn runs_producer_once_on_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let once = Once::<u32>::new();

        let make = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        };

        let a = once.get_or_init(make).await.unwrap();
        let b = once.get_or_init(make).await.unwrap();
        assert_eq!(a, 42);
        assert_eq!(b, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caches_failure_too() {
        let calls = Arc::new(AtomicUsize::new(0));
        let once = Once::<u32>::new();

        let make = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(IpxError::internal("boom"))
            }
        };

        let a = once.get_or_init(make).await;
        let b = once.get_or_init(make).await;
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
