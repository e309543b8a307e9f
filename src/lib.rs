//! # docqa
//!
//! Question answering over uploaded documents or an Azure AI Search index,
//! with answers generated by an Azure OpenAI chat deployment.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐
//! │ Extract  │   │  Search   │
//! │ PDF/DOCX │   │ Azure AI  │
//! │ XLSX/XLS │   │  Search   │
//! └────┬─────┘   └─────┬─────┘
//!      │   context     │
//!      └──────┬────────┘
//!             ▼
//!      ┌─────────────┐   ┌────────────┐
//!      │  Generator  │◀─▶│   Cache    │
//!      │ prompt+LLM  │   │ query→ans  │
//!      └──────┬──────┘   └────────────┘
//!             │
//!      ┌──────┴──────┐
//!      ▼             ▼
//! ┌──────────┐  ┌──────────┐
//! │   CLI    │  │   HTTP   │
//! │ (docqa)  │  │  /ask    │
//! └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`models`] | Core data types |
//! | [`extract`] | Document text extraction |
//! | [`search`] | Context retrieval from Azure AI Search |
//! | [`completion`] | Azure OpenAI chat completions |
//! | [`cache`] | Query → answer cache |
//! | [`generator`] | Context, prompt and answer generation |
//! | [`ask`] | Request flow and answer rendering |
//! | [`status`] | Configuration report |
//! | [`server`] | JSON HTTP server |

pub mod ask;
pub mod cache;
pub mod completion;
pub mod config;
pub mod extract;
pub mod generator;
pub mod models;
pub mod search;
pub mod server;
pub mod status;
