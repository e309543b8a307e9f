//! Shared fixtures: in-memory documents, fake retriever and fake model.

#![allow(dead_code)]

use async_trait::async_trait;
use docqa::completion::{CompletionError, CompletionModel};
use docqa::models::{Passage, Reference, Retrieval};
use docqa::search::{ContextRetriever, SearchError};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ─── Documents ──────────────────────────────────────────────────────

/// A docx whose body holds one paragraph per entry.
pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| {
            if p.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p)
            }
        })
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    zip_entries(&[("word/document.xml", xml)])
}

/// An xlsx with one worksheet per `(name, rows)`; every cell is an inline
/// string unless it parses as a number.
pub fn xlsx_with_sheets(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
    let mut entries = Vec::new();

    let sheet_elems: String = sheets
        .iter()
        .enumerate()
        .map(|(i, (name, _))| {
            format!(
                "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
                name,
                i + 1,
                i + 1
            )
        })
        .collect();
    entries.push((
        "xl/workbook.xml",
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets>{}</sheets></workbook>",
            sheet_elems
        ),
    ));

    let rels: String = (1..=sheets.len())
        .map(|i| {
            format!(
                "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
                i, i
            )
        })
        .collect();
    entries.push((
        "xl/_rels/workbook.xml.rels",
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
            rels
        ),
    ));

    let mut sheet_paths = Vec::new();
    for (i, (_, rows)) in sheets.iter().enumerate() {
        let row_elems: String = rows
            .iter()
            .enumerate()
            .map(|(r, cells)| {
                let cell_elems: String = cells
                    .iter()
                    .enumerate()
                    .map(|(c, value)| {
                        let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                        if value.parse::<f64>().is_ok() {
                            format!("<c r=\"{}\"><v>{}</v></c>", cell_ref, value)
                        } else {
                            format!(
                                "<c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                                cell_ref, value
                            )
                        }
                    })
                    .collect();
                format!("<row r=\"{}\">{}</row>", r + 1, cell_elems)
            })
            .collect();
        sheet_paths.push((
            format!("xl/worksheets/sheet{}.xml", i + 1),
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
                row_elems
            ),
        ));
    }

    let mut all: Vec<(&str, String)> = entries;
    for (path, xml) in &sheet_paths {
        all.push((path.as_str(), xml.clone()));
    }
    zip_entries(&all)
}

fn zip_entries(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// A PDF with one page per entry; `None` pages have an empty content stream.
pub fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in pages {
        let operations = match page {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => Vec::new(),
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

// ─── Fake retriever ─────────────────────────────────────────────────

/// Returns a canned retrieval (or failure) and counts calls.
pub struct FakeRetriever {
    results: Vec<(String, String, Option<String>)>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRetriever {
    /// `(content, title, url)` triples, returned in order.
    pub fn with_results(results: Vec<(&str, &str, Option<&str>)>) -> Self {
        Self {
            results: results
                .into_iter()
                .map(|(c, t, u)| (c.to_string(), t.to_string(), u.map(String::from)))
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::with_results(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextRetriever for FakeRetriever {
    async fn retrieve(&self, _query: &str, limit: usize) -> Result<Retrieval, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let mut retrieval = Retrieval::default();
        for (content, title, url) in self.results.iter().take(limit) {
            let reference = Reference {
                title: title.clone(),
                url: url.clone(),
            };
            if !content.is_empty() {
                retrieval.passages.push(Passage {
                    text: content.clone(),
                    reference: reference.clone(),
                });
            }
            retrieval.references.push(reference);
        }
        Ok(retrieval)
    }
}

// ─── Fake model ─────────────────────────────────────────────────────

/// Records every prompt and answers `"answer #<n>"`, or fails.
pub struct FakeModel {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeModel {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionModel for FakeModel {
    fn model_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        if self.fail {
            return Err(CompletionError::Status {
                status: 500,
                body: "model exploded".to_string(),
            });
        }
        Ok(format!("answer #{}", prompts.len()))
    }
}
