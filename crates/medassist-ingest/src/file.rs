//! PDF / DOCX text extraction.
//!
//! PDF page policy: a page whose text cannot be decoded contributes an empty
//! string and a warning; only a document-level parse failure is an error.

use std::fmt;
use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use medassist_core::{Error, Result};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Docx,
}

impl MediaType {
    /// Parse a declared MIME type (parameters such as `; charset=` are ignored).
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            PDF_MIME => Ok(Self::Pdf),
            DOCX_MIME => Ok(Self::Docx),
            _ => Err(Error::UnsupportedMediaType(mime.to_string())),
        }
    }

    /// Detect from a file name's extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("docx") => Ok(Self::Docx),
            _ => Err(Error::UnsupportedMediaType(filename.to_string())),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => PDF_MIME,
            Self::Docx => DOCX_MIME,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
        }
    }
}

/// Uploaded bytes plus their declared media type.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            media_type,
        }
    }

    /// Resolve the media type from a declared MIME type, falling back to the
    /// file extension when the declaration is missing or generic.
    pub fn detect(filename: impl Into<String>, bytes: Vec<u8>, mime: Option<&str>) -> Result<Self> {
        let filename = filename.into();
        let media_type = match mime {
            Some(m) if !is_generic_mime(m) => MediaType::from_mime(m)?,
            _ => MediaType::from_filename(&filename)?,
        };
        Ok(Self::new(filename, bytes, media_type))
    }
}

fn is_generic_mime(mime: &str) -> bool {
    let m = mime.trim();
    m.is_empty() || m.eq_ignore_ascii_case("application/octet-stream")
}

/// Converts document bytes into plain (not yet normalized) text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], media_type: MediaType) -> Result<String>;
}

/// Extractor backed by `lopdf` (PDF) and `zip` + `quick-xml` (DOCX).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

impl TextExtractor for DefaultExtractor {
    fn extract(&self, bytes: &[u8], media_type: MediaType) -> Result<String> {
        match media_type {
            MediaType::Pdf => extract_pdf(bytes),
            MediaType::Docx => extract_docx(bytes),
        }
    }
}

/// Page texts in page order, joined by a blank line.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::CorruptDocument(format!("unreadable PDF: {}", e)))?;

    if doc.is_encrypted() {
        return Err(Error::CorruptDocument("encrypted PDF".into()));
    }

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());

    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!("Failed to extract text from page {}: {}", page_num, e);
                texts.push(String::new());
            }
        }
    }

    debug!("Extracted {} PDF pages", texts.len());
    Ok(texts.join("\n\n"))
}

/// Paragraph texts of `word/document.xml` in document order, joined by `\n`.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::CorruptDocument(format!("not a DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::CorruptDocument(format!("missing word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::CorruptDocument(format!("unreadable word/document.xml: {}", e)))?;

    let paragraphs = docx_paragraphs(&xml)?;
    debug!("Extracted {} DOCX paragraphs", paragraphs.len());
    Ok(paragraphs.join("\n"))
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text_run = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::CorruptDocument(format!("malformed document XML: {}", e)))?;

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text_run = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => push_to(&mut current, "\t"),
                b"w:br" | b"w:cr" => push_to(&mut current, "\n"),
                _ => {}
            },
            Event::Text(t) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::CorruptDocument(format!("bad text run: {}", e)))?;
                push_to(&mut current, &text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => {
                    if let Some(p) = current.take() {
                        paragraphs.push(p);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn push_to(current: &mut Option<String>, text: &str) {
    if let Some(p) = current {
        p.push_str(text);
    }
}
