use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::provider::{CompletionConfig, TextCompletion};
use skein_core::{Result, SkeinError};

/// Retry attempts and exponential backoff base for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Doubles each attempt unless the service gave a retry-after hint.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32, err: &SkeinError) -> Duration {
        match err {
            SkeinError::RateLimited {
                retry_after_secs, ..
            } => Duration::from_secs(*retry_after_secs),
            _ => self.base_delay * 2u32.saturating_pow(attempt),
        }
    }
}

/// Wraps a completion service and retries transient errors (429, 5xx,
/// timeouts) with exponential backoff.
pub struct RetryingCompletion {
    inner: Arc<dyn TextCompletion>,
    policy: RetryPolicy,
}

impl RetryingCompletion {
    pub fn new(inner: Arc<dyn TextCompletion>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl TextCompletion for RetryingCompletion {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(prompt, config).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt, &e);
                    warn!(
                        service = self.inner.name(),
                        attempt = attempt + 1,
                        max = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTextCompletion;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let mock = Arc::new(
            MockTextCompletion::new("flaky")
                .with_error("HTTP 429: rate limited")
                .with_error("HTTP 503: unavailable")
                .with_response("finally"),
        );
        let requests = mock.recorded_requests();
        let service = RetryingCompletion::new(mock, fast_policy(3));

        let text = service
            .complete("p", &CompletionConfig::default())
            .await
            .unwrap();
        assert_eq!(text, "finally");
        assert_eq!(requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mock = Arc::new(
            MockTextCompletion::new("down")
                .with_error("HTTP 500: boom")
                .with_error("HTTP 500: boom")
                .with_response("too late"),
        );
        let service = RetryingCompletion::new(mock, fast_policy(1));
        let result = service.complete("p", &CompletionConfig::default()).await;
        assert!(matches!(result, Err(SkeinError::Service { .. })));
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let mock = Arc::new(
            MockTextCompletion::new("auth")
                .with_error("HTTP 401: invalid api key")
                .with_response("unused"),
        );
        let requests = mock.recorded_requests();
        let service = RetryingCompletion::new(mock, fast_policy(3));
        assert!(service.complete("p", &CompletionConfig::default()).await.is_err());
        assert_eq!(requests.lock().len(), 1);
    }
}
