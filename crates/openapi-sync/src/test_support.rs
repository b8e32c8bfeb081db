use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::{FetchError, Fetcher, SpecSource};

/// In-memory fetcher for testing.
///
/// Each locator maps to a queue of scripted responses (`None` is a failed
/// fetch). The last response repeats once the queue runs dry. Unknown
/// locators fail with HTTP 404. Every call is counted.
#[derive(Default)]
pub struct InMemoryFetcher {
    responses: Mutex<HashMap<String, VecDeque<Option<Vec<u8>>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `locator` with `body`.
    pub fn with(self, locator: &str, body: impl Into<Vec<u8>>) -> Self {
        self.with_sequence(locator, vec![Some(body.into())])
    }

    /// Answer `locator` with each response in turn.
    pub fn with_sequence(self, locator: &str, responses: Vec<Option<Vec<u8>>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(locator.to_owned(), responses.into());
        self
    }

    /// Replace the scripted body for `locator`.
    pub fn set(&self, locator: &str, body: impl Into<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(locator.to_owned(), VecDeque::from([Some(body.into())]));
    }

    /// How many times `locator` has been fetched.
    pub fn calls(&self, locator: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(locator)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for InMemoryFetcher {
    async fn fetch(&self, source: &SpecSource) -> Result<Vec<u8>, FetchError> {
        let locator = source.to_string();
        *self.calls.lock().unwrap().entry(locator.clone()).or_default() += 1;

        let response = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(&locator) {
                Some(queue) if queue.len() > 1 => queue.pop_front().flatten(),
                Some(queue) => queue.front().cloned().flatten(),
                None => None,
            }
        };

        response.ok_or(FetchError::Status {
            locator,
            status: 404,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_scripted_body() {
        let fetcher = InMemoryFetcher::new().with("https://a.test/spec.yaml", "a: 1\n");
        let body = fetcher
            .fetch(&SpecSource::parse("https://a.test/spec.yaml"))
            .await
            .unwrap();
        assert_eq!(body, b"a: 1\n");
        assert_eq!(fetcher.calls("https://a.test/spec.yaml"), 1);
    }

    #[tokio::test]
    async fn unknown_locator_is_not_found() {
        let fetcher = InMemoryFetcher::new();
        let result = fetcher.fetch(&SpecSource::parse("missing.yaml")).await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn sequence_plays_in_order_then_repeats_last() {
        let fetcher = InMemoryFetcher::new().with_sequence(
            "s.yaml",
            vec![None, Some(b"one".to_vec()), Some(b"two".to_vec())],
        );
        let source = SpecSource::parse("s.yaml");

        assert!(fetcher.fetch(&source).await.is_err());
        assert_eq!(fetcher.fetch(&source).await.unwrap(), b"one");
        assert_eq!(fetcher.fetch(&source).await.unwrap(), b"two");
        assert_eq!(fetcher.fetch(&source).await.unwrap(), b"two");
    }
}
