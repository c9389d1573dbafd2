#[cfg(test)]
mod tests {
    use skein_core::SkeinError;
    use skein_llm::mock::{MockResponse, MockTextCompletion};
    use skein_llm::{CompletionConfig, RetryPolicy, RetryingCompletion, ServiceRegistry, TextCompletion};
    use std::sync::Arc;
    use std::time::Duration;

    // ── Registry resolve / complete ────────────────────────────

    #[tokio::test]
    async fn test_resolved_service_completes() {
        let mut registry = ServiceRegistry::new();
        registry.add("davinci", Arc::new(MockTextCompletion::new("mock").with_response("Hello from mock!")));

        let (id, service) = registry.resolve(None, &[]).unwrap();
        assert_eq!(id, "davinci");
        let text = service.complete("hi", &CompletionConfig::default()).await.unwrap();
        assert_eq!(text, "Hello from mock!");
    }

    #[tokio::test]
    async fn test_preferred_service_beats_default() {
        let mut registry = ServiceRegistry::new();
        registry.add("primary", Arc::new(MockTextCompletion::new("primary").with_response("from primary")));
        registry.add("secondary", Arc::new(MockTextCompletion::new("secondary").with_response("from secondary")));

        let (id, service) = registry.resolve(None, &["secondary".to_string()]).unwrap();
        assert_eq!(id, "secondary");
        assert_eq!(
            service.complete("", &CompletionConfig::default()).await.unwrap(),
            "from secondary"
        );
    }

    #[test]
    fn test_no_service_configured() {
        let registry = ServiceRegistry::new();
        let result = registry.resolve(None, &["anything".to_string()]);
        assert!(matches!(result, Err(SkeinError::NoServiceConfigured(_))));
    }

    // ── Retry wrapper through the registry ─────────────────────

    #[tokio::test]
    async fn test_registered_retrying_service() {
        let mock = MockTextCompletion::new("retry_test");
        mock.queue_response(MockResponse::Error("HTTP 429: rate limited".into()));
        mock.queue_response(MockResponse::Text("success after retry".into()));

        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        };
        let mut registry = ServiceRegistry::new();
        registry.add("retry", Arc::new(RetryingCompletion::new(Arc::new(mock), policy)));

        let (_, service) = registry.resolve(Some("retry"), &[]).unwrap();
        assert_eq!(service.name(), "retry_test");
        let text = service.complete("p", &CompletionConfig::default()).await.unwrap();
        assert_eq!(text, "success after retry");
    }

    // ── Request recording ──────────────────────────────────────

    #[tokio::test]
    async fn test_request_recording() {
        let mock = MockTextCompletion::new("recorder").with_response("ok");
        let requests = mock.recorded_requests();

        let mut registry = ServiceRegistry::new();
        registry.add("recorder", Arc::new(mock));

        let config = CompletionConfig {
            max_tokens: 64,
            stop_sequences: vec!["###".into()],
            ..Default::default()
        };
        let (_, service) = registry.resolve(None, &[]).unwrap();
        service.complete("Hello", &config).await.unwrap();

        let recorded = requests.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt, "Hello");
        assert_eq!(recorded[0].config, config);
    }
}
