use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

pub type LoadFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Deferred provider: an async factory run the first time a definition
/// or plugin is actually needed.
pub struct Lazy<T> {
    loader: Arc<dyn Fn() -> LoadFuture<T> + Send + Sync>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

impl<T: 'static> Lazy<T> {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            loader: Arc::new(move || loader().boxed()),
        }
    }

    pub async fn load(&self) -> anyhow::Result<T> {
        (self.loader)().await
    }
}

/// Shorthand for [`Lazy::new`].
pub fn lazy<T, F, Fut>(loader: F) -> Lazy<T>
where
    T: 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Lazy::new(loader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loader_runs_on_every_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = lazy(move || {
            let counter = Arc::clone(&counter);
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });
        let cloned = provider.clone();

        assert_eq!(provider.load().await.unwrap(), 1);
        assert_eq!(cloned.load().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_errors_pass_through() {
        let provider: Lazy<u8> = lazy(|| async { Err(anyhow::anyhow!("chunk missing")) });
        let err = provider.load().await.unwrap_err();
        assert_eq!(err.to_string(), "chunk missing");
    }
}
