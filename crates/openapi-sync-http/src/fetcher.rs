use std::path::Path;
use std::time::Duration;

use openapi_sync::{FetchError, Fetcher, SpecSource};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("openapi-sync/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

/// Fetches specs over HTTP(S), or straight from disk for local sources.
///
/// Makes exactly one attempt per call. Any non-2xx status is an error, as
/// is a request that exceeds the configured timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    locator: url.to_owned(),
                    timeout: self.timeout,
                }
            } else {
                FetchError::Network {
                    locator: url.to_owned(),
                    message: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(map_err)?;
        tracing::debug!(url, bytes = bytes.len(), "fetched remote spec");
        Ok(bytes.to_vec())
    }

    async fn fetch_local(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read local spec");
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &SpecSource) -> Result<Vec<u8>, FetchError> {
        match source {
            SpecSource::Remote(url) => self.fetch_remote(url).await,
            SpecSource::Local(path) => self.fetch_local(path).await,
        }
    }
}
