//! One user interaction: an optional upload plus a query, in, a rendered
//! answer out.
//!
//! With an upload, the document is extracted first and the answer comes
//! from its text; nothing is generated when the format is unsupported or no
//! text comes out. Without one, the answer comes from the search index.

use serde::Serialize;

use crate::completion::CompletionError;
use crate::extract::{extract, ExtractError};
use crate::generator::ResponseGenerator;
use crate::models::{GeneratedAnswer, Notice, Upload};

/// Which context an answer was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Document,
    Search,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Answered {
        mode: AnswerMode,
        answer: GeneratedAnswer,
    },
    /// No answer was generated; the notices say why.
    Skipped { notices: Vec<Notice> },
}

impl Outcome {
    pub fn notices(&self) -> &[Notice] {
        match self {
            Outcome::Answered { answer, .. } => &answer.notices,
            Outcome::Skipped { notices } => notices,
        }
    }
}

/// Runs the full request flow.
///
/// # Errors
///
/// Only a failed completion call is an error; every other failure is
/// reported as a [`Notice`] on the returned [`Outcome`].
pub async fn handle_request(
    generator: &ResponseGenerator,
    query: &str,
    upload: Option<Upload>,
) -> Result<Outcome, CompletionError> {
    let Some(upload) = upload else {
        let answer = generator.answer(query, None).await?;
        return Ok(Outcome::Answered {
            mode: AnswerMode::Search,
            answer,
        });
    };

    let text = match extract(&upload.name, &upload.bytes) {
        Ok(text) => text,
        Err(ExtractError::UnsupportedFormat(name)) => {
            tracing::warn!(file = %name, "rejected upload with unsupported format");
            return Ok(Outcome::Skipped {
                notices: vec![Notice::UnsupportedFormat(name)],
            });
        }
        Err(e) => {
            tracing::warn!(file = %upload.name, error = %e, "text extraction failed");
            return Ok(Outcome::Skipped {
                notices: vec![Notice::ExtractionFailed(e.to_string()), Notice::NoTextExtracted],
            });
        }
    };
    drop(upload);

    if text.trim().is_empty() {
        tracing::warn!("uploaded file contained no text");
        return Ok(Outcome::Skipped {
            notices: vec![Notice::NoTextExtracted],
        });
    }

    let answer = generator.answer(query, Some(&text)).await?;
    Ok(Outcome::Answered {
        mode: AnswerMode::Document,
        answer,
    })
}

/// Renders an outcome as Markdown. Answer text is inserted verbatim.
pub fn render_markdown(outcome: &Outcome) -> String {
    let mut out = String::new();
    for notice in outcome.notices() {
        out.push_str(&format!("Warning: {}\n\n", notice));
    }

    if let Outcome::Answered { mode, answer } = outcome {
        match mode {
            AnswerMode::Document => {
                out.push_str("**Answer from Uploaded Document:**\n\n");
                out.push_str(&answer.text);
                out.push('\n');
            }
            AnswerMode::Search => {
                out.push_str("**Answer:**\n\n");
                out.push_str(&answer.text);
                out.push_str("\n\n");
                if answer.references.is_empty() {
                    out.push_str("No references found.\n");
                } else {
                    out.push_str("**References:**\n");
                    for reference in &answer.references {
                        out.push_str(&format!("- {}\n", reference));
                    }
                }
            }
        }
    }
    out
}
