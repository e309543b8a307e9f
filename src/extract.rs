//! Plain-text extraction for uploaded documents (PDF, DOCX, XLSX, XLS).
//!
//! The format is chosen from the file name alone: the suffix must be one of
//! `.pdf`, `.docx`, `.xlsx` or `.xls`, matched case-sensitively. Anything
//! else is rejected before the bytes are looked at.

use calamine::{Reader, Xls, Xlsx};
use std::fmt;
use std::io::{Cursor, Read, Seek};
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Column separator in rendered sheet tables.
const TABLE_COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Xlsx,
    Xls,
}

impl DocumentKind {
    /// Maps a file name to its kind by exact, case-sensitive suffix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if name.ends_with(".docx") {
            Some(Self::Docx)
        } else if name.ends_with(".xlsx") {
            Some(Self::Xlsx)
        } else if name.ends_with(".xls") {
            Some(Self::Xls)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Xlsx => "XLSX",
            Self::Xls => "XLS",
        })
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("{kind} extraction failed: {message}")]
    Extraction { kind: DocumentKind, message: String },
}

impl ExtractError {
    fn new(kind: DocumentKind, message: impl fmt::Display) -> Self {
        Self::Extraction {
            kind,
            message: message.to_string(),
        }
    }
}

/// Extracts plain text from `bytes`, choosing the parser from `name`.
///
/// A blank document yields an empty (or whitespace-only) string, never an
/// error.
pub fn extract(name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_file_name(name)
        .ok_or_else(|| ExtractError::UnsupportedFormat(name.to_string()))?;
    tracing::debug!(file = name, %kind, size = bytes.len(), "extracting text");
    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Xlsx => {
            let mut workbook = Xlsx::new(Cursor::new(bytes))
                .map_err(|e| ExtractError::new(DocumentKind::Xlsx, e))?;
            render_workbook(&mut workbook, DocumentKind::Xlsx)
        }
        DocumentKind::Xls => {
            let mut workbook = Xls::new(Cursor::new(bytes))
                .map_err(|e| ExtractError::new(DocumentKind::Xls, e))?;
            render_workbook(&mut workbook, DocumentKind::Xls)
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::new(DocumentKind::Pdf, e))?;
    Ok(join_pdf_pages(pages))
}

/// Joins page texts with one newline, dropping pages with no text at all.
/// Line breaks around each page's text are stripped first.
fn join_pdf_pages(pages: Vec<String>) -> String {
    pages
        .iter()
        .filter(|page| !page.trim().is_empty())
        .map(|page| page.trim_matches(|c: char| c == '\n' || c == '\r'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::new(DocumentKind::Docx, format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::new(DocumentKind::Docx, e))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::new(
            DocumentKind::Docx,
            format!("ZIP entry {} exceeds size limit ({} bytes)", name, max_bytes),
        ));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::new(DocumentKind::Docx, e))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    Ok(docx_paragraphs(&xml)?.join("\n"))
}

/// Collects the text of each body-level paragraph in `word/document.xml`.
///
/// Paragraphs inside tables and nested content (text boxes) are skipped.
/// Empty paragraphs are kept as empty strings.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let err = |e: quick_xml::Error| ExtractError::new(DocumentKind::Docx, e);

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut table_depth = 0usize;
    let mut p_depth = 0usize;
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"p" => {
                    p_depth += 1;
                    if p_depth == 1 && table_depth == 0 {
                        current = Some(String::new());
                    }
                }
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                let top_level = p_depth == 1 && table_depth == 0;
                match e.local_name().as_ref() {
                    b"p" if p_depth == 0 && table_depth == 0 => paragraphs.push(String::new()),
                    b"tab" if in_run && top_level => {
                        if let Some(p) = current.as_mut() {
                            p.push('\t');
                        }
                    }
                    b"br" | b"cr" if in_run && top_level => {
                        if let Some(p) = current.as_mut() {
                            p.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(te)) if in_text && p_depth == 1 => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&te.unescape().map_err(err)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"p" => {
                    if p_depth == 1 && table_depth == 0 {
                        if let Some(p) = current.take() {
                            paragraphs.push(p);
                        }
                    }
                    p_depth = p_depth.saturating_sub(1);
                }
                b"r" => in_run = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

fn render_workbook<RS, R>(workbook: &mut R, kind: DocumentKind) -> Result<String, ExtractError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::new(kind, format!("sheet {}: {}", name, e)))?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        sheets.push((name, rows));
    }
    Ok(render_sheets(&sheets))
}

/// Renders sheets as `--- Sheet: <name> ---` blocks separated by a blank
/// line. A workbook with no cells anywhere renders as an empty string.
fn render_sheets(sheets: &[(String, Vec<Vec<String>>)]) -> String {
    let has_cells = sheets
        .iter()
        .any(|(_, rows)| rows.iter().any(|row| row.iter().any(|c| !c.is_empty())));
    if !has_cells {
        return String::new();
    }

    let blocks: Vec<String> = sheets
        .iter()
        .map(|(name, rows)| {
            let table = render_table(rows);
            if table.is_empty() {
                format!("--- Sheet: {} ---", name)
            } else {
                format!("--- Sheet: {} ---\n{}", name, table)
            }
        })
        .collect();
    blocks.join("\n\n").trim().to_string()
}

/// Right-aligns every column to its widest cell. The first row is the
/// header and is rendered like any other row.
fn render_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            (0..columns)
                .map(|c| {
                    let cell = row.get(c).map(String::as_str).unwrap_or("");
                    format!("{:>width$}", cell, width = widths[c])
                })
                .collect::<Vec<_>>()
                .join(TABLE_COLUMN_GAP)
                .trim_end()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
