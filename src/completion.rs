//! Completion model abstraction and the Azure OpenAI chat implementation.
//!
//! Defines the [`CompletionModel`] trait and two implementations:
//! - **[`AzureChatClient`]** calls a chat-completions deployment.
//! - **[`UnavailableModel`]** fails every call; used when the completion
//!   settings are incomplete so the failure surfaces per request instead
//!   of at start-up.
//!
//! # Call Semantics
//!
//! One prompt in, one answer out. The prompt is sent as a single user
//! message. No retries and no streaming; a request timeout applies only when
//! `[completion] timeout_secs` is set.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion endpoint is not configured (missing {0})")]
    NotConfigured(String),
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected completion response: {0}")]
    Decode(String),
}

/// Turns a prompt into an answer.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns the deployment or model identifier.
    fn model_name(&self) -> &str;

    /// Sends `prompt` and returns the raw answer text, unmodified.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Azure OpenAI chat-completions client for one deployment.
pub struct AzureChatClient {
    http: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_key: String,
    api_version: String,
}

impl AzureChatClient {
    /// Creates a client. `timeout` of `None` keeps the HTTP client default.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_key: api_key.into(),
            api_version: api_version.into(),
        })
    }

    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// [`CompletionError::NotConfigured`] naming the absent settings.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        let creds = &config.credentials;
        match (
            &creds.azure_openai_endpoint,
            &creds.openai_deployment_name,
            &creds.openai_api_key,
        ) {
            (Some(endpoint), Some(deployment), Some(key)) => Self::new(
                endpoint.clone(),
                deployment.clone(),
                key.clone(),
                config.completion.api_version.clone(),
                config.completion.timeout_secs.map(Duration::from_secs),
            ),
            _ => {
                let missing: Vec<&str> = [
                    (crate::config::ENV_AZURE_OPENAI_ENDPOINT, &creds.azure_openai_endpoint),
                    (crate::config::ENV_OPENAI_DEPLOYMENT_NAME, &creds.openai_deployment_name),
                    (crate::config::ENV_OPENAI_API_KEY, &creds.openai_api_key),
                ]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();
                Err(CompletionError::NotConfigured(missing.join(", ")))
            }
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl CompletionModel for AzureChatClient {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = serde_json::json!({
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        tracing::debug!(deployment = %self.deployment, prompt_chars = prompt.len(), "calling completion endpoint");
        let response = self
            .http
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extracts `choices[0].message.content`.
fn parse_chat_response(json: &Value) -> Result<String, CompletionError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Decode("missing choices[0].message.content".to_string()))
}

/// Model used when the completion settings are incomplete.
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CompletionModel for UnavailableModel {
    fn model_name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::NotConfigured(self.reason.clone()))
    }
}
