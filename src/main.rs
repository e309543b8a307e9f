//! # docqa CLI
//!
//! Ask questions about an uploaded document or an Azure AI Search index and
//! get an answer from an Azure OpenAI deployment.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa ask "<query>"` | Answer from the search index |
//! | `docqa ask "<query>" --file report.pdf` | Answer from an uploaded document |
//! | `docqa extract <file>` | Print the text extracted from a document |
//! | `docqa status` | Show which settings are configured |
//! | `docqa serve` | Start the JSON HTTP server |
//!
//! Credentials come from the environment (or `keys.env`):
//! `OPENAI_DEPLOYMENT_NAME`, `OPENAI_API_KEY`, `AZURE_OPENAI_ENDPOINT`,
//! `AZURE_SEARCH_SERVICE`, `AZURE_SEARCH_KEY`, `AZURE_SEARCH_INDEX`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::ask::{handle_request, render_markdown};
use docqa::config;
use docqa::extract::extract;
use docqa::generator::{configuration_notice, ResponseGenerator};
use docqa::models::Upload;
use docqa::server;
use docqa::status;

/// docqa: document question answering over Azure AI Search and Azure OpenAI.
///
/// All commands accept a `--config` flag pointing to an optional TOML file.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about documents, answered by Azure OpenAI",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question.
    ///
    /// With `--file`, the answer is generated from the document's text.
    /// Otherwise relevant passages are fetched from the search index and
    /// listed as references under the answer.
    Ask {
        /// The question.
        query: String,

        /// A PDF, DOCX, XLSX or XLS document to answer from.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the plain text extracted from a document.
    Extract {
        /// Path to a `.pdf`, `.docx`, `.xlsx` or `.xls` file.
        path: PathBuf,
    },

    /// Show which settings are present.
    Status,

    /// Start the JSON HTTP server.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        // Extraction needs no configuration
        Commands::Extract { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let text = extract(&file_name(&path), &bytes)?;
            println!("{}", text);
        }
        Commands::Ask { query, file } => {
            let cfg = config::load_config(&cli.config)?;
            if query.trim().is_empty() {
                anyhow::bail!("query must not be empty");
            }
            if let Some(notice) = configuration_notice(&cfg) {
                tracing::warn!("{}", notice);
                println!("Warning: {}\n", notice);
            }

            let upload = match file {
                Some(path) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Some(Upload::new(file_name(&path), bytes))
                }
                None => None,
            };

            let generator = ResponseGenerator::from_config(&cfg);
            let outcome = handle_request(&generator, &query, upload).await?;
            print!("{}", render_markdown(&outcome));
        }
        Commands::Status => {
            let cfg = config::load_config(&cli.config)?;
            status::print_status(&cfg)?;
        }
        Commands::Serve { bind } => {
            let mut cfg = config::load_config(&cli.config)?;
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// The file name used for format dispatch; falls back to the full path.
fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
