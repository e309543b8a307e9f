//! Context retrieval from an Azure AI Search index.
//!
//! [`ContextRetriever`] is the seam the generator depends on. Two
//! implementations ship here:
//! - **[`AzureSearchClient`]** queries the index over REST.
//! - **[`UnavailableRetriever`]** stands in when the search settings are
//!   incomplete and fails every call, so the pipeline still runs.
//!
//! Result records are read through a fixed field mapping: `content` for the
//! passage text, `metadata_spo_item_name` for the title and
//! `metadata_spo_item_path` for the URL.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::models::{Passage, Reference, Retrieval};

pub const CONTENT_FIELD: &str = "content";
pub const TITLE_FIELD: &str = "metadata_spo_item_name";
pub const URL_FIELD: &str = "metadata_spo_item_path";

pub const DEFAULT_CONTENT: &str = "No content available.";
pub const DEFAULT_TITLE: &str = "Untitled Document";
/// Stands for "no URL" in place of a real link.
pub const NO_URL_SENTINEL: &str = "No URL Available";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search is not configured (missing {0})")]
    NotConfigured(String),
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("search service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected search response: {0}")]
    Decode(String),
}

/// Finds passages relevant to a query.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns at most `limit` results in backend relevance order.
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Retrieval, SearchError>;
}

/// REST client for one Azure AI Search index.
pub struct AzureSearchClient {
    http: reqwest::Client,
    endpoint: String,
    index: String,
    api_key: String,
    api_version: String,
}

impl AzureSearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        index: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            index: index.into(),
            api_key: api_key.into(),
            api_version: api_version.into(),
        }
    }

    /// Builds a client from the configured endpoint, index and key.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotConfigured`] naming the absent settings.
    pub fn from_config(config: &Config) -> Result<Self, SearchError> {
        let creds = &config.credentials;
        let mut missing = Vec::new();
        let endpoint = config.search_endpoint();
        if endpoint.is_none() {
            missing.push(crate::config::ENV_AZURE_SEARCH_SERVICE);
        }
        if creds.azure_search_key.is_none() {
            missing.push(crate::config::ENV_AZURE_SEARCH_KEY);
        }
        if creds.azure_search_index.is_none() {
            missing.push(crate::config::ENV_AZURE_SEARCH_INDEX);
        }
        match (endpoint, &creds.azure_search_index, &creds.azure_search_key) {
            (Some(endpoint), Some(index), Some(key)) => Ok(Self::new(
                endpoint,
                index.clone(),
                key.clone(),
                config.search.api_version.clone(),
            )),
            _ => Err(SearchError::NotConfigured(missing.join(", "))),
        }
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index, self.api_version
        )
    }
}

#[async_trait]
impl ContextRetriever for AzureSearchClient {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Retrieval, SearchError> {
        let body = serde_json::json!({
            "search": query,
            "top": limit,
        });

        tracing::debug!(index = %self.index, limit, "querying search index");
        let response = self
            .http
            .post(self.search_url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await?;
        let records = json
            .get("value")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SearchError::Decode("missing 'value' array".to_string()))?;
        Ok(collect_results(records, limit))
    }
}

/// Retriever used when search settings are incomplete.
pub struct UnavailableRetriever {
    reason: String,
}

impl UnavailableRetriever {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ContextRetriever for UnavailableRetriever {
    async fn retrieve(&self, _query: &str, _limit: usize) -> Result<Retrieval, SearchError> {
        Err(SearchError::NotConfigured(self.reason.clone()))
    }
}

/// Turns raw result records into passages and references.
///
/// Every record contributes a reference. Only records with non-empty
/// content contribute a passage.
pub fn collect_results(records: &[Value], limit: usize) -> Retrieval {
    let mut retrieval = Retrieval::default();
    for record in records.iter().take(limit) {
        // Only an absent key gets the placeholder; null counts as empty.
        let content = match record.get(CONTENT_FIELD) {
            None => DEFAULT_CONTENT,
            Some(value) => value.as_str().unwrap_or(""),
        };
        let title = string_field(record, TITLE_FIELD).unwrap_or(DEFAULT_TITLE);
        let url = string_field(record, URL_FIELD).unwrap_or(NO_URL_SENTINEL);
        let reference = make_reference(title, url);

        if !content.is_empty() {
            retrieval.passages.push(Passage {
                text: content.to_string(),
                reference: reference.clone(),
            });
        }
        retrieval.references.push(reference);
    }
    retrieval
}

/// A URL equal to the sentinel, or blank, means "no URL".
pub fn make_reference(title: &str, url: &str) -> Reference {
    let url = url.trim();
    Reference {
        title: title.to_string(),
        url: if url.is_empty() || url == NO_URL_SENTINEL {
            None
        } else {
            Some(url.to_string())
        },
    }
}

fn string_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}
