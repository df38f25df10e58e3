//! Initialize-once holder for external service clients.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use super::ConfigError;

type InitFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<T>, ConfigError>> + Send + Sync>;

/// Holds a shared client that is built on first use.
///
/// Concurrent callers racing on the first access run the initializer once;
/// the others wait for its result. A failed initialization is not cached, so
/// the next caller retries it.
pub struct LazyClient<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
    init: Option<InitFn<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> LazyClient<T> {
    /// Wrap an already-built client.
    pub fn ready(name: &'static str, client: Arc<T>) -> Self {
        Self {
            name,
            cell: OnceCell::new_with(Some(client)),
            init: None,
        }
    }

    /// Defer construction until [`Self::get`] is first awaited.
    pub fn lazy<F, Fut>(name: &'static str, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, ConfigError>> + Send + 'static,
    {
        Self {
            name,
            cell: OnceCell::new(),
            init: Some(Box::new(move || init().boxed())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the client, building it if this is the first access.
    pub async fn get(&self) -> Result<Arc<T>, ConfigError> {
        let client = self
            .cell
            .get_or_try_init(|| async {
                let Some(init) = &self.init else {
                    return Err(ConfigError::Uninitialized(self.name));
                };
                tracing::debug!(client = self.name, "initializing client");
                init().await
            })
            .await?;
        Ok(Arc::clone(client))
    }
}

impl<T: ?Sized> fmt::Debug for LazyClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("name", &self.name)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn ready_client_is_returned_without_init() {
        let lazy = LazyClient::ready("num", Arc::new(7u32));
        assert!(lazy.is_initialized());
        assert_eq!(*lazy.get().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn concurrent_first_access_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = Arc::new(LazyClient::lazy("num", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok::<_, ConfigError>(Arc::new(42u32))
            }
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = Arc::clone(&lazy);
                tokio::spawn(async move { *lazy.get().await.unwrap() })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_init_is_reported_and_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy: LazyClient<u32> = LazyClient::lazy("num", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<Arc<u32>, _>(ConfigError::MissingVars(vec!["NUM_KEY".into()]))
            }
        });

        let err = lazy.get().await.unwrap_err();
        assert!(err.to_string().contains("NUM_KEY"));
        assert!(lazy.get().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!lazy.is_initialized());
    }
}
