//! Text engines: the per-format extraction routines behind the extractor
//!
//! `ToolEngine` combines native Rust parsers with the usual command-line
//! tools:
//! - pdf-extract, with pdftotext (poppler-utils) as fallback
//! - pdftoppm + tesseract for OCR of scanned PDFs
//! - antiword for Word 97-2003 files
//! - unrtf for RTF files

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

/// Per-format extraction routines.
///
/// Implementations are synchronous and may block; callers run them off the
/// async runtime.
pub trait TextEngine: Send + Sync {
    /// Word 97-2003. Undecodable text must be reported as `Error::Decode`.
    fn legacy_word(&self, path: &Path) -> Result<String>;

    /// Office Open XML word-processing document
    fn modern_word(&self, path: &Path, data: &[u8]) -> Result<String>;

    /// Direct PDF text extraction. Image-only PDFs yield little or no text.
    fn pdf(&self, path: &Path, data: &[u8]) -> Result<String>;

    /// Optical character recognition of every PDF page
    fn pdf_ocr(&self, path: &Path, data: &[u8]) -> Result<String>;

    fn rtf(&self, path: &Path) -> Result<String>;

    /// Get engine name for logging
    fn name(&self) -> &str;
}

/// Engine backed by native parsers and external tools
pub struct ToolEngine {
    ocr_language: String,
    ocr_dpi: u32,
    pdf_timeout: Duration,
}

impl ToolEngine {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            ocr_language: config.ocr_language.clone(),
            ocr_dpi: config.ocr_dpi,
            pdf_timeout: Duration::from_secs(config.pdf_timeout_secs),
        }
    }

    /// External tools that are not installed
    pub fn missing_tools() -> Vec<&'static str> {
        [
            ("pdftotext", "-v"),
            ("pdftoppm", "-v"),
            ("tesseract", "--version"),
            ("antiword", "-h"),
            ("unrtf", "--version"),
        ]
        .into_iter()
        .filter(|(tool, arg)| !tool_exists(tool, arg))
        .map(|(tool, _)| tool)
        .collect()
    }

    /// Run pdf-extract on a separate thread so a pathological font table
    /// cannot hang the worker.
    fn extract_pdf_with_timeout(&self, data: &[u8]) -> std::result::Result<String, String> {
        use std::sync::mpsc;
        use std::thread;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.pdf_timeout) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.to_string())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(format!(
                "timed out after {}s",
                self.pdf_timeout.as_secs()
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err("extraction thread crashed".to_string())
            }
        }
    }

    fn pdftotext(&self, path: &Path) -> Result<String> {
        let output = run_tool(
            path,
            Command::new("pdftotext")
                .args(["-layout", "-nopgbrk", "-enc", "UTF-8"])
                .arg(path)
                .arg("-"),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextEngine for ToolEngine {
    fn legacy_word(&self, path: &Path) -> Result<String> {
        let output = run_tool(
            path,
            Command::new("antiword").args(["-m", "UTF-8.txt"]).arg(path),
        )?;
        String::from_utf8(output.stdout).map_err(|e| Error::Decode {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn modern_word(&self, path: &Path, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(path.display().to_string(), e.to_string()))?;

        let mut content = String::new();
        for child in &doc.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(p) => push_paragraph(&mut content, p),
                docx_rs::DocumentChild::Table(t) => push_table(&mut content, t),
                docx_rs::DocumentChild::StructuredDataTag(tag) => push_tag(&mut content, tag),
                _ => {}
            }
        }
        Ok(content)
    }

    fn pdf(&self, path: &Path, data: &[u8]) -> Result<String> {
        match self.extract_pdf_with_timeout(data) {
            Ok(text) if !text.trim().is_empty() => Ok(text.replace('\0', "")),
            Ok(_) => {
                tracing::debug!("pdf-extract found no text in {}", path.display());
                self.pdftotext(path)
            }
            Err(e) => {
                tracing::warn!(
                    "pdf-extract failed on {}: {}, trying pdftotext",
                    path.display(),
                    e
                );
                self.pdftotext(path)
            }
        }
    }

    fn pdf_ocr(&self, path: &Path, _data: &[u8]) -> Result<String> {
        let temp_dir = tempfile::tempdir()?;
        let prefix = temp_dir.path().join("page");

        run_tool(
            path,
            Command::new("pdftoppm")
                .args(["-png", "-r"])
                .arg(self.ocr_dpi.to_string())
                .arg(path)
                .arg(&prefix),
        )?;

        // pdftoppm zero-pads page numbers, so name order is page order
        let mut page_images: Vec<_> = std::fs::read_dir(temp_dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        page_images.sort();

        if page_images.is_empty() {
            return Err(Error::extraction(
                path.display().to_string(),
                "pdftoppm produced no images",
            ));
        }

        let mut pages = Vec::with_capacity(page_images.len());
        for image_path in &page_images {
            let output = run_tool(
                path,
                Command::new("tesseract")
                    .arg(image_path)
                    .arg("stdout")
                    .arg("-l")
                    .arg(&self.ocr_language),
            )?;
            pages.push(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        tracing::info!(
            "OCR extracted {} pages from {}",
            page_images.len(),
            path.display()
        );
        Ok(pages.join("\n\n"))
    }

    fn rtf(&self, path: &Path) -> Result<String> {
        let output = run_tool(path, Command::new("unrtf").arg("--html").arg(path))?;
        let html = String::from_utf8_lossy(&output.stdout);
        Ok(html_text(&html))
    }

    fn name(&self) -> &str {
        "tools"
    }
}

fn push_paragraph(content: &mut String, paragraph: &docx_rs::Paragraph) {
    push_paragraph_children(content, &paragraph.children);
    content.push('\n');
}

fn push_paragraph_children(content: &mut String, children: &[docx_rs::ParagraphChild]) {
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run(content, run),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                push_paragraph_children(content, &link.children)
            }
            docx_rs::ParagraphChild::Insert(insert) => {
                for child in &insert.children {
                    if let docx_rs::InsertChild::Run(run) = child {
                        push_run(content, run);
                    }
                }
            }
            docx_rs::ParagraphChild::StructuredDataTag(tag) => push_tag(content, tag),
            _ => {}
        }
    }
}

fn push_run(content: &mut String, run: &docx_rs::Run) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => content.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => content.push('\t'),
            _ => {}
        }
    }
}

/// Cells are tab-separated, one row per line
fn push_table(content: &mut String, table: &docx_rs::Table) {
    for docx_rs::TableChild::TableRow(row) in &table.rows {
        for (index, docx_rs::TableRowChild::TableCell(cell)) in row.cells.iter().enumerate() {
            if index > 0 {
                content.push('\t');
            }
            let mut text = String::new();
            for child in &cell.children {
                match child {
                    docx_rs::TableCellContent::Paragraph(p) => push_paragraph(&mut text, p),
                    docx_rs::TableCellContent::Table(t) => push_table(&mut text, t),
                    docx_rs::TableCellContent::StructuredDataTag(tag) => push_tag(&mut text, tag),
                    _ => {}
                }
            }
            content.push_str(text.trim_end());
        }
        content.push('\n');
    }
}

fn push_tag(content: &mut String, tag: &docx_rs::StructuredDataTag) {
    for child in &tag.children {
        match child {
            docx_rs::StructuredDataTagChild::Run(run) => push_run(content, run),
            docx_rs::StructuredDataTagChild::Paragraph(p) => push_paragraph(content, p),
            docx_rs::StructuredDataTagChild::Table(t) => push_table(content, t),
            docx_rs::StructuredDataTagChild::StructuredDataTag(tag) => push_tag(content, tag),
            _ => {}
        }
    }
}

/// Visible text of an HTML document
pub fn html_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let body = scraper::Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    let text: String = match body {
        Some(body) => body.text().collect(),
        None => document.root_element().text().collect(),
    };
    text.trim().to_string()
}

fn tool_exists(tool: &str, arg: &str) -> bool {
    Command::new(tool)
        .arg(arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Run an external tool, turning spawn failures and non-zero exits into
/// extraction errors for `path`.
fn run_tool(path: &Path, command: &mut Command) -> Result<Output> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            Error::extraction(
                path.display().to_string(),
                format!("Failed to run {}: {}", program, e),
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::extraction(
            path.display().to_string(),
            format!("{} exited with {}: {}", program, output.status, stderr.trim()),
        ));
    }
    Ok(output)
}
