use std::future::Future;

use tokio::sync::Mutex;

use crate::error::Error;

/// In-memory anti-forgery token.
///
/// The lock is held across the fetch, so concurrent callers that find the
/// cache empty share a single fetch.
#[derive(Debug, Default)]
pub(crate) struct CsrfCache {
    token: Mutex<Option<String>>,
}

impl CsrfCache {
    pub(crate) async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, Error>>,
    {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drops `rejected` from the cache. A token fetched by someone else in
    /// the meantime is kept.
    pub(crate) async fn invalidate(&self, rejected: &str) {
        let mut cached = self.token.lock().await;
        if cached.as_deref() == Some(rejected) {
            *cached = None;
        }
    }

    pub(crate) async fn clear(&self) {
        self.token.lock().await.take();
    }

    #[cfg(test)]
    pub(crate) async fn cached(&self) -> Option<String> {
        self.token.lock().await.clone()
    }
}
