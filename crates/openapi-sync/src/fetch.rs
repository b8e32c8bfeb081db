use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::schema::SpecSource;

/// Errors that can occur while retrieving the bytes of a spec.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {locator} timed out after {}s", timeout.as_secs_f32())]
    Timeout { locator: String, timeout: Duration },

    #[error("{locator} returned HTTP {status}")]
    Status { locator: String, status: u16 },

    #[error("network error fetching {locator}: {message}")]
    Network { locator: String, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Retrieves the raw bytes behind a [`SpecSource`].
///
/// Implementations apply their own timeout and make a single attempt;
/// retrying is the sync orchestrator's decision.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &SpecSource) -> Result<Vec<u8>, FetchError>;
}

#[async_trait::async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, source: &SpecSource) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(source).await
    }
}

#[async_trait::async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Box<T> {
    async fn fetch(&self, source: &SpecSource) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(source).await
    }
}
