//! The response generator: cache lookup, context assembly, prompt, answer.
//!
//! ```text
//! query ──▶ cache hit? ──yes──▶ cached (answer, references)
//!               │ no
//!               ▼
//!      file text given? ──yes──▶ context = file text, no references
//!               │ no
//!               ▼
//!      retriever ──▶ context = passages joined by "\n"
//!               │
//!               ▼
//!      prompt ──▶ completion model ──▶ cache.put ──▶ (answer, references)
//! ```
//!
//! The cache is keyed by query text alone. A second request with the same
//! query and a different uploaded document therefore gets the first
//! answer back. The generator keeps that behavior but attaches
//! [`Notice::StaleCacheHit`] whenever the cached entry was built from
//! different context than the document in hand.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::cache::AnswerCache;
use crate::completion::{AzureChatClient, CompletionError, CompletionModel, UnavailableModel};
use crate::config::Config;
use crate::models::{CacheEntry, ContextOrigin, GeneratedAnswer, Notice, Retrieval};
use crate::search::{AzureSearchClient, ContextRetriever, SearchError, UnavailableRetriever};

/// Context used when retrieval produced no passages.
pub const NO_DOCUMENTS_CONTEXT: &str = "No relevant documents found.";

/// Default number of search results requested per query.
pub const DEFAULT_TOP_K: usize = 50;

pub struct ResponseGenerator {
    retriever: Arc<dyn ContextRetriever>,
    model: Arc<dyn CompletionModel>,
    cache: AnswerCache,
    top_k: usize,
}

impl ResponseGenerator {
    pub fn new(
        retriever: Arc<dyn ContextRetriever>,
        model: Arc<dyn CompletionModel>,
        cache: AnswerCache,
    ) -> Self {
        Self {
            retriever,
            model,
            cache,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Builds the Azure clients and cache from configuration.
    ///
    /// Incomplete settings never fail here: the affected client is replaced
    /// by one that reports the problem on every call.
    pub fn from_config(config: &Config) -> Self {
        let retriever: Arc<dyn ContextRetriever> = match AzureSearchClient::from_config(config) {
            Ok(client) => Arc::new(client),
            Err(SearchError::NotConfigured(missing)) => {
                tracing::warn!(missing = %missing, "Azure AI Search not configured");
                Arc::new(UnavailableRetriever::new(missing))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create Azure AI Search client");
                Arc::new(UnavailableRetriever::new(e.to_string()))
            }
        };

        let model: Arc<dyn CompletionModel> = match AzureChatClient::from_config(config) {
            Ok(client) => Arc::new(client),
            Err(CompletionError::NotConfigured(missing)) => {
                tracing::warn!(missing = %missing, "Azure OpenAI not configured");
                Arc::new(UnavailableModel::new(missing))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create Azure OpenAI client");
                Arc::new(UnavailableModel::new(e.to_string()))
            }
        };

        Self::new(retriever, model, AnswerCache::new(config.cache.capacity))
            .with_top_k(config.search.top_k)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answers `query`, using `file_text` as the context when it is
    /// non-empty and the search index otherwise.
    ///
    /// Search failures do not fail the call: the context falls back to
    /// [`NO_DOCUMENTS_CONTEXT`] and a [`Notice::SearchUnavailable`] is
    /// attached.
    ///
    /// # Errors
    ///
    /// Any [`CompletionError`] from the model, unchanged. Nothing is cached
    /// in that case.
    pub async fn answer(
        &self,
        query: &str,
        file_text: Option<&str>,
    ) -> Result<GeneratedAnswer, CompletionError> {
        let file_text = file_text.filter(|text| !text.is_empty());

        if let Some(entry) = self.cache.get(query) {
            tracing::debug!(query, "answer cache hit");
            let mut notices = Vec::new();
            if let Some(text) = file_text {
                let fingerprint = fingerprint(text);
                let same_document = matches!(
                    &entry.origin,
                    ContextOrigin::Upload { fingerprint: cached } if *cached == fingerprint
                );
                if !same_document {
                    tracing::warn!(
                        query,
                        "returning cached answer that was not generated from the uploaded document"
                    );
                    notices.push(Notice::StaleCacheHit);
                }
            }
            return Ok(GeneratedAnswer {
                text: entry.answer,
                references: entry.references,
                cached: true,
                stored_at: entry.stored_at,
                notices,
            });
        }

        tracing::debug!(query, "answer cache miss");
        let mut notices = Vec::new();
        let (context, references, origin) = match file_text {
            Some(text) => (
                text.to_string(),
                Vec::new(),
                ContextOrigin::Upload {
                    fingerprint: fingerprint(text),
                },
            ),
            None => {
                let retrieval = match self.retriever.retrieve(query, self.top_k).await {
                    Ok(retrieval) => retrieval,
                    Err(e) => {
                        tracing::warn!(error = %e, "search failed, continuing without context");
                        notices.push(Notice::SearchUnavailable(e.to_string()));
                        Retrieval::default()
                    }
                };
                let references = retrieval.references.iter().map(|r| r.to_string()).collect();
                (build_context(&retrieval), references, ContextOrigin::Search)
            }
        };

        let prompt = build_prompt(&context, query);
        let answer = self.model.complete(&prompt).await?;

        let stored_at = Utc::now();
        self.cache.put(
            query,
            CacheEntry {
                answer: answer.clone(),
                references: references.clone(),
                origin,
                stored_at,
            },
        );

        Ok(GeneratedAnswer {
            text: answer,
            references,
            cached: false,
            stored_at,
            notices,
        })
    }
}

/// Joins passage texts with newlines, or returns [`NO_DOCUMENTS_CONTEXT`].
pub fn build_context(retrieval: &Retrieval) -> String {
    if retrieval.is_empty() {
        return NO_DOCUMENTS_CONTEXT.to_string();
    }
    retrieval
        .passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Composes the single prompt sent to the completion model.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Context:\n{}\n\nUser Query: {}\n\nAnswer based on context in structured format:",
        context, query
    )
}

/// The start-up warning for incomplete credentials, if any.
pub fn configuration_notice(config: &Config) -> Option<Notice> {
    let missing = config.credentials.missing();
    if missing.is_empty() {
        None
    } else {
        Some(Notice::ConfigurationMissing(
            missing.into_iter().map(String::from).collect(),
        ))
    }
}

/// SHA-256 hex digest identifying a document's extracted text.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
