use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::provider::{CompletionConfig, TextCompletion};
use skein_core::{Result, SkeinError};

/// Default request timeout for completion calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Azure OpenAI API version used when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2022-12-01";

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SkeinError::Config(format!("failed to build HTTP client: {e}")))
}

/// Request body shared by OpenAI and Azure OpenAI `/completions`.
fn completion_body(
    model: Option<&str>,
    prompt: &str,
    config: &CompletionConfig,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "prompt": prompt,
        "temperature": config.temperature,
        "top_p": config.top_p,
        "presence_penalty": config.presence_penalty,
        "frequency_penalty": config.frequency_penalty,
        "max_tokens": config.max_tokens,
        "n": config.number_of_responses,
    });
    if let Some(model) = model {
        body["model"] = serde_json::json!(model);
    }
    if !config.stop_sequences.is_empty() {
        body["stop"] = serde_json::json!(config.stop_sequences);
    }
    body
}

/// Classify a transport failure so timeouts and refused connections are
/// retried.
fn transport_error(service: &str, e: reqwest::Error) -> SkeinError {
    let reason = if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    SkeinError::service(service, reason)
}

/// Send the request and pull `choices[0].text` out of the response.
async fn send_completion(service: &str, request: reqwest::RequestBuilder) -> Result<String> {
    let resp = request
        .send()
        .await
        .map_err(|e| transport_error(service, e))?;

    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(SkeinError::RateLimited {
            service: service.to_string(),
            retry_after_secs,
        });
    }
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(SkeinError::service(service, format!("HTTP {status}: {text}")));
    }

    let data: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| SkeinError::service(service, e.to_string()))?;

    let choices = data["choices"]
        .as_array()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SkeinError::service(service, "malformed response: no choices"))?;
    if choices.len() > 1 {
        debug!(service, choices = choices.len(), "multiple choices returned, using the first");
    }
    choices[0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SkeinError::service(service, "malformed response: choice has no text"))
}

/// OpenAI text-completion service (`POST /v1/completions`).
pub struct OpenAiTextCompletion {
    client: reqwest::Client,
    model: String,
    api_key: String,
    org_id: Option<String>,
    base_url: String,
}

impl OpenAiTextCompletion {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        org_id: Option<String>,
    ) -> Result<Self> {
        let model = model.into();
        let api_key = api_key.into();
        if model.is_empty() {
            return Err(SkeinError::Config("the OpenAI model cannot be empty".into()));
        }
        if api_key.is_empty() {
            return Err(SkeinError::Config("the OpenAI API key cannot be empty".into()));
        }
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            model,
            api_key,
            org_id,
            base_url: "https://api.openai.com/v1".into(),
        })
    }

    /// Use a custom base URL (proxies, OpenAI-compatible servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextCompletion for OpenAiTextCompletion {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String> {
        let body = completion_body(Some(&self.model), prompt, config);
        let mut request = self
            .client
            .post(format!("{}/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if let Some(ref org) = self.org_id {
            request = request.header("OpenAI-Organization", org);
        }
        send_completion(self.name(), request).await
    }
}

/// Azure OpenAI text-completion service, addressed by deployment name.
pub struct AzureTextCompletion {
    client: reqwest::Client,
    deployment: String,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl AzureTextCompletion {
    /// Validates that deployment, key, and endpoint are present and that the
    /// endpoint is an `https://` URL.
    pub fn new(
        deployment: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: Option<String>,
    ) -> Result<Self> {
        let deployment = deployment.into();
        let endpoint = endpoint.into();
        let api_key = api_key.into();

        if deployment.is_empty() {
            return Err(SkeinError::Config("the deployment name cannot be empty".into()));
        }
        if api_key.is_empty() {
            return Err(SkeinError::Config("the Azure API key cannot be empty".into()));
        }
        if endpoint.is_empty() {
            return Err(SkeinError::Config("the Azure endpoint cannot be empty".into()));
        }
        let parsed = url::Url::parse(&endpoint)
            .map_err(|e| SkeinError::Config(format!("invalid Azure endpoint '{endpoint}': {e}")))?;
        if parsed.scheme() != "https" {
            return Err(SkeinError::Config("the Azure endpoint must start with https://".into()));
        }

        info!(deployment = %deployment, endpoint = %endpoint, "configured Azure text completion");
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            deployment,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version: api_version.unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl TextCompletion for AzureTextCompletion {
    fn name(&self) -> &str {
        "azure"
    }

    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String> {
        let body = completion_body(None, prompt, config);
        let request = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body);
        send_completion(self.name(), request).await
    }
}
