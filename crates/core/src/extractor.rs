use crate::error::IngestError;
use chrono::NaiveDate;
use lopdf::{Dictionary, Document, Object};
use std::path::Path;

const PREVIEW_PAGES: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalExtraction {
    pub page_count: Option<u32>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub creation_date: Option<String>,
    pub text: String,
}

impl LocalExtraction {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subject.is_none()
            && self.author.is_none()
            && self.creation_date.is_none()
            && self.text.trim().is_empty()
    }
}

pub trait PdfExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<LocalExtraction, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<LocalExtraction, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let pages = document.get_pages();
        let mut extraction = LocalExtraction {
            page_count: Some(pages.len() as u32),
            ..LocalExtraction::default()
        };

        if let Some(info) = info_dictionary(&document) {
            extraction.title = info_text(info, b"Title");
            extraction.subject = info_text(info, b"Subject");
            extraction.author = info_text(info, b"Author");
            extraction.creation_date =
                info_text(info, b"CreationDate").and_then(|raw| normalize_pdf_date(&raw));
        }

        // Text is a bonus; pages with unsupported encodings are skipped.
        for page_no in pages.keys().take(PREVIEW_PAGES) {
            if let Ok(text) = document.extract_text(&[*page_no]) {
                if !text.trim().is_empty() {
                    extraction.text.push_str(&text);
                    extraction.text.push('\n');
                }
            }
        }

        Ok(extraction)
    }
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    }
}

fn info_text(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key) {
        Ok(Object::String(bytes, _)) => {
            let decoded = decode_pdf_string(bytes);
            let trimmed = decoded.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|byte| *byte as char).collect(),
    }
}

// `D:20240115093000+01'00'` -> `2024-01-15`
pub fn normalize_pdf_date(raw: &str) -> Option<String> {
    let digits = raw.trim().trim_start_matches("D:");
    if digits.len() < 8 || !digits.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
        return None;
    }

    let year = digits[0..4].parse::<i32>().ok()?;
    let month = digits[4..6].parse::<u32>().ok()?;
    let day = digits[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::{decode_pdf_string, normalize_pdf_date, LopdfExtractor, PdfExtractor};
    use crate::IngestError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn pdf_dates_are_normalized() {
        assert_eq!(
            normalize_pdf_date("D:20240115093000+01'00'").as_deref(),
            Some("2024-01-15")
        );
        assert_eq!(normalize_pdf_date("20231231").as_deref(), Some("2023-12-31"));
        assert_eq!(normalize_pdf_date("D:2024"), None);
        assert_eq!(normalize_pdf_date("D:20241340"), None);
    }

    #[test]
    fn utf16_strings_are_decoded() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
        assert_eq!(decode_pdf_string(b"Plain"), "Plain");
    }

    #[test]
    fn broken_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = LopdfExtractor.extract(&path);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }
}
