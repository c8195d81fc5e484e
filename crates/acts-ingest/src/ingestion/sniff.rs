//! Content sniffing
//!
//! Published files routinely carry wrong or missing extensions, so the kind
//! is decided from the bytes alone.

use std::fmt;
use std::io::Cursor;

const PDF_MAGIC: &[u8] = b"%PDF-";
const RTF_MAGIC: &[u8] = b"{\\rtf";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF_MAGIC: &[u8] = b"GIF8";

/// How many leading bytes the plain-text heuristic looks at
const TEXT_SAMPLE_LEN: usize = 8192;

/// Kind of a downloaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    PlainText,
    /// Word 97-2003 (.doc)
    LegacyWord,
    /// Office Open XML word-processing (.docx)
    ModernWord,
    Pdf,
    Rtf,
    /// Excel 97-2003 (.xls)
    LegacySpreadsheet,
    /// Office Open XML spreadsheet (.xlsx)
    ModernSpreadsheet,
    /// Anything without an extraction route, with a MIME-style description
    Unsupported(String),
}

impl ContentKind {
    pub fn is_spreadsheet(&self) -> bool {
        matches!(
            self,
            ContentKind::LegacySpreadsheet | ContentKind::ModernSpreadsheet
        )
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::PlainText => "text/plain",
            ContentKind::LegacyWord => "application/msword",
            ContentKind::ModernWord => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ContentKind::Pdf => "application/pdf",
            ContentKind::Rtf => "text/rtf",
            ContentKind::LegacySpreadsheet => "application/vnd.ms-excel",
            ContentKind::ModernSpreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ContentKind::Unsupported(description) => description.as_str(),
        };
        f.write_str(name)
    }
}

/// Determine the content kind of a file from its bytes
pub fn sniff(data: &[u8]) -> ContentKind {
    if data.is_empty() {
        return ContentKind::Unsupported("application/x-empty".to_string());
    }
    if data.starts_with(PDF_MAGIC) {
        return ContentKind::Pdf;
    }
    if data.starts_with(RTF_MAGIC) {
        return ContentKind::Rtf;
    }
    if data.starts_with(OLE2_MAGIC) {
        return sniff_compound_file(data);
    }
    if data.starts_with(ZIP_MAGIC) {
        return sniff_zip(data);
    }
    if data.starts_with(PNG_MAGIC) {
        return ContentKind::Unsupported("image/png".to_string());
    }
    if data.starts_with(JPEG_MAGIC) {
        return ContentKind::Unsupported("image/jpeg".to_string());
    }
    if data.starts_with(GIF_MAGIC) {
        return ContentKind::Unsupported("image/gif".to_string());
    }
    if looks_like_text(data) {
        if looks_like_html(data) {
            return ContentKind::Unsupported("text/html".to_string());
        }
        return ContentKind::PlainText;
    }
    ContentKind::Unsupported("application/octet-stream".to_string())
}

/// OLE2 compound files name their streams in UTF-16LE directory entries
fn sniff_compound_file(data: &[u8]) -> ContentKind {
    if contains(data, &utf16le("WordDocument")) {
        ContentKind::LegacyWord
    } else if contains(data, &utf16le("Workbook")) || contains(data, &utf16le("Book")) {
        ContentKind::LegacySpreadsheet
    } else {
        ContentKind::Unsupported("application/x-ole-storage".to_string())
    }
}

fn sniff_zip(data: &[u8]) -> ContentKind {
    let mut archive = match zip::ZipArchive::new(Cursor::new(data)) {
        Ok(archive) => archive,
        Err(e) => {
            tracing::debug!("ZIP signature but unreadable archive: {}", e);
            return ContentKind::Unsupported("application/zip".to_string());
        }
    };

    if archive.by_name("word/document.xml").is_ok() {
        ContentKind::ModernWord
    } else if archive.by_name("xl/workbook.xml").is_ok() {
        ContentKind::ModernSpreadsheet
    } else {
        ContentKind::Unsupported("application/zip".to_string())
    }
}

fn looks_like_text(data: &[u8]) -> bool {
    let sample = &data[..data.len().min(TEXT_SAMPLE_LEN)];
    if sample.contains(&0) {
        return false;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
        .count();
    control * 100 <= sample.len()
}

fn looks_like_html(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(512)]).to_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn utf16le(name: &str) -> Vec<u8> {
    name.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entry: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file(entry, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<xml/>").unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    fn ole2_with(stream: &str) -> Vec<u8> {
        let mut data = OLE2_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 504]);
        data.extend_from_slice(&utf16le("Root Entry"));
        data.extend_from_slice(&utf16le(stream));
        data
    }

    #[test]
    fn test_magic_prefixes() {
        assert_eq!(sniff(b"%PDF-1.7\n..."), ContentKind::Pdf);
        assert_eq!(sniff(b"{\\rtf1\\ansi hello}"), ContentKind::Rtf);
        assert_eq!(
            sniff(b"\x89PNG\r\n\x1a\n\0\0"),
            ContentKind::Unsupported("image/png".to_string())
        );
    }

    #[test]
    fn test_compound_files() {
        assert_eq!(sniff(&ole2_with("WordDocument")), ContentKind::LegacyWord);
        assert_eq!(sniff(&ole2_with("Workbook")), ContentKind::LegacySpreadsheet);
        assert!(matches!(
            sniff(&ole2_with("PowerPoint Document")),
            ContentKind::Unsupported(_)
        ));
    }

    #[test]
    fn test_office_open_xml() {
        assert_eq!(sniff(&zip_with("word/document.xml")), ContentKind::ModernWord);
        assert_eq!(sniff(&zip_with("xl/workbook.xml")), ContentKind::ModernSpreadsheet);
        assert_eq!(
            sniff(&zip_with("content.txt")),
            ContentKind::Unsupported("application/zip".to_string())
        );
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(sniff("Рішення про бюджет\r\n".as_bytes()), ContentKind::PlainText);
        assert_eq!(
            sniff(b"<!DOCTYPE html><html></html>"),
            ContentKind::Unsupported("text/html".to_string())
        );
        assert_eq!(
            sniff(&[0x01, 0x02, 0x00, 0xFF]),
            ContentKind::Unsupported("application/octet-stream".to_string())
        );
        assert_eq!(sniff(b""), ContentKind::Unsupported("application/x-empty".to_string()));
    }

    #[test]
    fn test_extension_is_ignored() {
        // Kind comes from content, so a PDF named .doc is still a PDF
        let kind = sniff(b"%PDF-1.4 body");
        assert_eq!(kind.to_string(), "application/pdf");
        assert!(!kind.is_spreadsheet());
    }
}
