pub mod fetcher;

pub use fetcher::{DEFAULT_TIMEOUT, HttpFetcher, HttpFetcherConfig};
