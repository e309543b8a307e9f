//! Core data types that flow between the extractor, retriever, cache and
//! generator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A file supplied with a single request. Dropped when the request ends.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Human-readable pointer back to a retrieved document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub title: String,
    pub url: Option<String>,
}

impl fmt::Display for Reference {
    /// `[title](url)` when a URL is known, the bare title otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "[{}]({})", self.title, url),
            None => f.write_str(&self.title),
        }
    }
}

/// A retrieved text fragment and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub text: String,
    pub reference: Reference,
}

/// Everything one retrieval produced.
///
/// `references` holds one entry per backend result while `passages` only
/// holds results that carried text, so the two lists need not line up.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub passages: Vec<Passage>,
    pub references: Vec<Reference>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Where the context for a cached answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextOrigin {
    Search,
    /// SHA-256 hex digest of the extracted document text.
    Upload { fingerprint: String },
}

/// A memoized answer.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub answer: String,
    pub references: Vec<String>,
    pub origin: ContextOrigin,
    pub stored_at: DateTime<Utc>,
}

/// A user-visible warning attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum Notice {
    ConfigurationMissing(Vec<String>),
    SearchUnavailable(String),
    /// The cached answer was produced from different context than the
    /// document supplied with this request.
    StaleCacheHit,
    UnsupportedFormat(String),
    ExtractionFailed(String),
    NoTextExtracted,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ConfigurationMissing(names) => write!(
                f,
                "Some API keys or Azure Search details are missing ({}). Functionality may be limited.",
                names.join(", ")
            ),
            Notice::SearchUnavailable(msg) => write!(f, "Error querying Azure AI Search: {}", msg),
            Notice::StaleCacheHit => f.write_str(
                "Answer served from cache for this exact query; it was not generated from the uploaded document.",
            ),
            Notice::UnsupportedFormat(name) => write!(
                f,
                "Unsupported file format ({}). Only PDF, DOCX, and Excel (XLSX, XLS) are allowed.",
                name
            ),
            Notice::ExtractionFailed(msg) => write!(f, "Error reading uploaded file: {}", msg),
            Notice::NoTextExtracted => f.write_str("No text extracted from the uploaded file."),
        }
    }
}

/// Output of the response generator.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    pub references: Vec<String>,
    pub cached: bool,
    pub stored_at: DateTime<Utc>,
    pub notices: Vec<Notice>,
}
