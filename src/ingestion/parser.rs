//! Multi-format file parser

use std::collections::BTreeMap;

use calamine::Reader;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::FileKind;

/// Extracted text plus metadata, ready for chunking
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Detected file kind
    pub file_kind: FileKind,
    /// Hex SHA-256 of the extracted text
    pub content_hash: String,
    /// Text segments in document order (pages, sheets, or the whole body)
    pub segments: Vec<Segment>,
}

impl ParsedDocument {
    fn from_segments(file_kind: FileKind, segments: Vec<Segment>) -> Self {
        let mut hasher = Sha256::new();
        for segment in &segments {
            hasher.update(segment.text.as_bytes());
        }
        Self {
            file_kind,
            content_hash: format!("{:x}", hasher.finalize()),
            segments,
        }
    }

    /// Total extracted text length in bytes
    pub fn text_len(&self) -> usize {
        self.segments.iter().map(|s| s.text.len()).sum()
    }
}

/// One contiguous piece of extracted text with its format metadata
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    /// e.g. `page`, `sheet` keys depending on the source format
    pub metadata: BTreeMap<String, String>,
}

impl Segment {
    fn plain(text: String) -> Self {
        Self {
            text,
            metadata: BTreeMap::new(),
        }
    }

    fn tagged(text: String, key: &str, value: impl ToString) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(key.to_string(), value.to_string());
        Self { text, metadata }
    }
}

/// Multi-format file parser, dispatching on extension
pub struct FileParser;

impl FileParser {
    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();

        let file_kind = FileKind::from_extension(&extension)
            .ok_or_else(|| Error::UnsupportedFileType(extension.clone()))?;

        match file_kind {
            FileKind::Text => Self::parse_text(data),
            FileKind::Pdf => Self::parse_pdf(filename, data),
            FileKind::Word => Self::parse_docx(filename, data),
            FileKind::Html => Self::parse_html(data),
            FileKind::Csv => Self::parse_csv(filename, data),
            FileKind::Spreadsheet => Self::parse_spreadsheet(filename, data),
        }
    }

    /// Plain text and markdown
    fn parse_text(data: &[u8]) -> Result<ParsedDocument> {
        let content = String::from_utf8_lossy(data).to_string();
        Ok(ParsedDocument::from_segments(
            FileKind::Text,
            vec![Segment::plain(content)],
        ))
    }

    /// PDF: pdf-extract first, lopdf content-stream fallback for files it
    /// cannot handle
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let content = match pdf_extract::extract_text_from_mem(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("pdf-extract failed: {}, trying fallback", e);
                Self::extract_pdf_text_fallback(filename, data)?
            }
        };

        let content = content
            .replace('\0', "")
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if content.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF",
            ));
        }

        let page_count = match lopdf::Document::load_mem(data) {
            Ok(doc) => doc.get_pages().len() as u32,
            Err(_) => 1,
        };

        let mut segment = Segment::plain(content);
        segment
            .metadata
            .insert("pages".to_string(), page_count.to_string());

        Ok(ParsedDocument::from_segments(FileKind::Pdf, vec![segment]))
    }

    /// Fallback PDF text extraction reading content streams with lopdf
    fn extract_pdf_text_fallback(filename: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let mut all_text = String::new();
        for (page_num, page_id) in doc.get_pages() {
            match doc.get_page_content(page_id) {
                Ok(content) => {
                    let text = Self::extract_text_from_content(&content);
                    if !text.is_empty() {
                        all_text.push_str(&text);
                        all_text.push('\n');
                    }
                }
                Err(e) => {
                    tracing::debug!("Could not get content for page {}: {}", page_num, e);
                }
            }
        }

        if all_text.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        Ok(all_text)
    }

    /// Extract text show operators from a PDF content stream
    fn extract_text_from_content(content: &[u8]) -> String {
        let content_str = String::from_utf8_lossy(content);
        let mut text = String::new();
        let mut in_text_block = false;

        for line in content_str.lines() {
            let line = line.trim();

            if line == "BT" {
                in_text_block = true;
                continue;
            }
            if line == "ET" {
                in_text_block = false;
                text.push(' ');
                continue;
            }

            if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
                if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                    if start < end {
                        let decoded = line[start + 1..end]
                            .replace("\\n", "\n")
                            .replace("\\r", "\r")
                            .replace("\\t", "\t")
                            .replace("\\(", "(")
                            .replace("\\)", ")")
                            .replace("\\\\", "\\");
                        text.push_str(&decoded);
                    }
                }
            }
        }

        text
    }

    /// Word (.docx) paragraph extraction
    fn parse_docx(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let doc =
            docx_rs::read_docx(data).map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        if content.trim().is_empty() {
            return Err(Error::file_parse(filename, "Document contains no text"));
        }

        Ok(ParsedDocument::from_segments(
            FileKind::Word,
            vec![Segment::plain(content)],
        ))
    }

    /// HTML body text
    fn parse_html(data: &[u8]) -> Result<ParsedDocument> {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);

        let body_selector = scraper::Selector::parse("body").unwrap();
        let mut content = String::new();

        if let Some(body) = document.select(&body_selector).next() {
            for text in body.text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !content.is_empty() {
                        content.push(' ');
                    }
                    content.push_str(trimmed);
                }
            }
        }

        Ok(ParsedDocument::from_segments(
            FileKind::Html,
            vec![Segment::plain(content)],
        ))
    }

    /// CSV rows joined with pipe separators
    fn parse_csv(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let mut reader = csv::Reader::from_reader(data);
        let mut content = String::new();

        if let Ok(headers) = reader.headers() {
            content.push_str(&headers.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        for result in reader.records() {
            let record = result.map_err(|e| Error::file_parse(filename, e.to_string()))?;
            content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        Ok(ParsedDocument::from_segments(
            FileKind::Csv,
            vec![Segment::plain(content)],
        ))
    }

    /// Excel/ODS workbook, one segment per sheet
    fn parse_spreadsheet(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let cursor = std::io::Cursor::new(data);
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut segments = Vec::new();

        for sheet_name in workbook.sheet_names().to_vec() {
            if let Ok(range) = workbook.worksheet_range(&sheet_name) {
                let mut sheet_content = format!("Sheet: {}\n", sheet_name);

                for row in range.rows() {
                    let row_text: Vec<String> = row
                        .iter()
                        .map(|cell| match cell {
                            calamine::Data::Empty => String::new(),
                            calamine::Data::String(s) => s.clone(),
                            calamine::Data::Float(f) => f.to_string(),
                            calamine::Data::Int(i) => i.to_string(),
                            calamine::Data::Bool(b) => b.to_string(),
                            calamine::Data::DateTime(dt) => dt.to_string(),
                            _ => String::new(),
                        })
                        .collect();

                    if !row_text.iter().all(|s| s.is_empty()) {
                        sheet_content.push_str(&row_text.join(" | "));
                        sheet_content.push('\n');
                    }
                }

                segments.push(Segment::tagged(sheet_content, "sheet", &sheet_name));
            }
        }

        if segments.is_empty() {
            return Err(Error::file_parse(filename, "Workbook contains no sheets"));
        }

        Ok(ParsedDocument::from_segments(
            FileKind::Spreadsheet,
            segments,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text() {
        let parsed = FileParser::parse("notes.txt", b"hello world").unwrap();
        assert_eq!(parsed.file_kind, FileKind::Text);
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].text, "hello world");
        assert_eq!(parsed.content_hash.len(), 64);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = FileParser::parse("archive.tar.gz", b"data").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)), "{}", err);
    }

    #[test]
    fn parses_csv_rows() {
        let data = b"name,color\nsky,blue\ngrass,green\n";
        let parsed = FileParser::parse("facts.csv", data).unwrap();
        assert_eq!(parsed.file_kind, FileKind::Csv);
        let text = &parsed.segments[0].text;
        assert!(text.contains("name | color"));
        assert!(text.contains("sky | blue"));
        assert!(text.contains("grass | green"));
    }

    #[test]
    fn parses_html_body_text() {
        let data = b"<html><head><title>Hi</title></head>\
            <body><h1>Heading</h1><p>Body paragraph.</p></body></html>";
        let parsed = FileParser::parse("page.html", data).unwrap();
        assert_eq!(parsed.file_kind, FileKind::Html);
        let text = &parsed.segments[0].text;
        assert!(text.contains("Heading"));
        assert!(text.contains("Body paragraph."));
        assert!(!text.contains("Hi"), "head content should be excluded");
    }

    #[test]
    fn identical_text_hashes_identically() {
        let a = FileParser::parse("a.txt", b"same content").unwrap();
        let b = FileParser::parse("b.txt", b"same content").unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }
}
