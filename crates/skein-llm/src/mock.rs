//! Mock completion service for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::provider::{CompletionConfig, TextCompletion};
use skein_core::{Result, SkeinError};

/// A prompt received by the mock, kept for assertions in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub prompt: String,
    pub config: CompletionConfig,
}

/// A pre-configured response from the mock service.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Text(String),
    /// Fail with `SkeinError::Service` carrying this reason.
    Error(String),
    /// Echo the prompt back.
    Echo,
}

/// A mock text-completion service that pops queued responses in order.
///
/// # Example
/// ```
/// use skein_llm::mock::MockTextCompletion;
/// let service = MockTextCompletion::new("test")
///     .with_response("Hello, world!");
/// ```
pub struct MockTextCompletion {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Artificial latency before answering.
    delay: Option<Duration>,
    name: String,
}

impl MockTextCompletion {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(vec![])),
            delay: None,
            name: name.into(),
        }
    }

    /// Queue a text response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses
            .lock()
            .push_back(MockResponse::Text(text.to_string()));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, reason: &str) -> Self {
        self.responses
            .lock()
            .push_back(MockResponse::Error(reason.to_string()));
        self
    }

    /// Answer every unqueued request by echoing the prompt.
    pub fn echoing(self) -> Self {
        self.responses.lock().push_back(MockResponse::Echo);
        self
    }

    /// Sleep before answering (used to exercise cancellation).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response through a shared reference.
    pub fn queue_response(&self, resp: MockResponse) {
        self.responses.lock().push_back(resp);
    }

    /// Shared handle to every request received so far.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<RecordedRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Pop the next queued response. A trailing `Echo` is sticky; an empty
    /// queue yields a placeholder text.
    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock();
        match responses.front() {
            Some(MockResponse::Echo) if responses.len() == 1 => MockResponse::Echo,
            Some(_) => responses.pop_front().unwrap_or(MockResponse::Echo),
            None => MockResponse::Text("(mock: no more queued responses)".to_string()),
        }
    }
}

#[async_trait]
impl TextCompletion for MockTextCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String> {
        self.requests.lock().push(RecordedRequest {
            prompt: prompt.to_string(),
            config: config.clone(),
        });
        let mock = self.next_response();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match mock {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Echo => Ok(prompt.to_string()),
            MockResponse::Error(reason) => Err(SkeinError::service(&self.name, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_text_response() {
        let service = MockTextCompletion::new("mock").with_response("Hello!");
        let text = service
            .complete("hi", &CompletionConfig::default())
            .await
            .unwrap();
        assert_eq!(text, "Hello!");
    }

    #[tokio::test]
    async fn test_mock_error() {
        let service = MockTextCompletion::new("mock").with_error("HTTP 429: rate limited");
        let result = service.complete("hi", &CompletionConfig::default()).await;
        assert!(matches!(result, Err(SkeinError::Service { .. })));
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let service = MockTextCompletion::new("mock").with_response("ok");
        let config = CompletionConfig {
            temperature: 0.9,
            ..Default::default()
        };
        service.complete("be nice", &config).await.unwrap();

        let recorded = service.recorded_requests();
        let recorded = recorded.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt, "be nice");
        assert_eq!(recorded[0].config.temperature, 0.9);
    }

    #[tokio::test]
    async fn test_mock_multiple_responses_in_order() {
        let service = MockTextCompletion::new("mock")
            .with_response("first")
            .with_response("second");
        let config = CompletionConfig::default();
        assert_eq!(service.complete("", &config).await.unwrap(), "first");
        assert_eq!(service.complete("", &config).await.unwrap(), "second");
        assert!(service.complete("", &config).await.unwrap().contains("no more queued"));
    }

    #[tokio::test]
    async fn test_mock_echo_is_sticky() {
        let service = MockTextCompletion::new("mock").with_response("once").echoing();
        let config = CompletionConfig::default();
        assert_eq!(service.complete("a", &config).await.unwrap(), "once");
        assert_eq!(service.complete("b", &config).await.unwrap(), "b");
        assert_eq!(service.complete("c", &config).await.unwrap(), "c");
    }
}
