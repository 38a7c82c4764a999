//! Structured PDF extraction.
//!
//! This module pulls the structured signal out of an in-memory PDF:
//! - Per-page text (via pdf-extract)
//! - Document Info metadata (Title, Author, ...) read from the trailer's Info object
//! - Page count
//!
//! The extracted signal is folded into a canonical string that the
//! fingerprinter hashes. Anything that goes wrong here is reported as a
//! [`DocumentError`] so the caller can fall back to the byte digest.

use std::collections::BTreeMap;
use std::panic;
use std::sync::OnceLock;

use regex::bytes::Regex;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use super::ExtractOptions;

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Info dictionary keys included in the metadata signal.
const METADATA_KEYS: &str = "Title|Author|Subject|Keywords|Creator|Producer|CreationDate|ModDate";

/// Errors that can occur during structured extraction.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The content does not start with a PDF header.
    #[error("Content is not a PDF document")]
    NotAPdf,

    /// The PDF parser rejected the document.
    #[error("Failed to extract text from PDF: {message}")]
    PdfError {
        /// Error message from the parser
        message: String,
    },

    /// The PDF parser panicked on malformed input.
    #[error("PDF parser aborted on malformed input: {message}")]
    ParserPanic {
        /// Panic payload, if it was a string
        message: String,
    },
}

/// Structured content pulled out of a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Text of each page, in page order
    pub pages: Vec<String>,
    /// Info dictionary entries (only filled when metadata was requested)
    pub metadata: BTreeMap<String, String>,
}

impl ExtractedDocument {
    /// Number of pages in the document.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Build the canonical signal string that gets hashed.
    ///
    /// Layout: page text (NFC-normalized, concatenated) when text is
    /// requested, then the metadata as a JSON object when metadata is
    /// requested, then `pages:<n>`. Maps are ordered, so the output is
    /// stable for a given document and option set.
    #[must_use]
    pub fn canonical_signal(&self, options: ExtractOptions) -> String {
        let mut signal = String::new();

        if options.extract_text {
            for page in &self.pages {
                signal.extend(page.nfc());
            }
        }

        if options.extract_metadata {
            signal.push_str(&serde_json::to_string(&self.metadata).unwrap_or_default());
        }

        signal.push_str(&format!("pages:{}", self.page_count()));
        signal
    }
}

/// Extractor for in-memory PDF content.
pub struct DocumentExtractor;

impl DocumentExtractor {
    /// Extract the structured signal from PDF bytes.
    ///
    /// # Arguments
    ///
    /// * `content` - Raw PDF bytes
    /// * `options` - Which parts of the signal are wanted
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the bytes are not a PDF or the parser
    /// fails (including parser panics, which are caught).
    pub fn extract(
        content: &[u8],
        options: ExtractOptions,
    ) -> Result<ExtractedDocument, DocumentError> {
        if !Self::looks_like_pdf(content) {
            return Err(DocumentError::NotAPdf);
        }

        let pages = Self::extract_pages(content)?;
        let metadata = if options.extract_metadata {
            Self::extract_metadata(content)
        } else {
            BTreeMap::new()
        };

        Ok(ExtractedDocument { pages, metadata })
    }

    /// Check for the `%PDF-` header, allowing leading whitespace.
    #[must_use]
    pub fn looks_like_pdf(content: &[u8]) -> bool {
        let start = content
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(content.len());
        content[start..].starts_with(PDF_MAGIC)
    }

    /// Extract per-page text.
    fn extract_pages(content: &[u8]) -> Result<Vec<String>, DocumentError> {
        // pdf-extract panics on some malformed documents
        let result = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(content));

        match result {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(DocumentError::PdfError {
                message: e.to_string(),
            }),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(DocumentError::ParserPanic { message })
            }
        }
    }

    /// Read the literal strings of the document Info dictionary.
    ///
    /// Only the object the last trailer's `/Info` reference points at is
    /// scanned, so outline and annotation `/Title` entries never leak in.
    /// When an object is redefined by an incremental update, the last
    /// definition wins. An Info dictionary stored inside a compressed
    /// object stream is not found and yields an empty map.
    #[must_use]
    pub fn extract_metadata(content: &[u8]) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        let (Some(re), Some(info)) = (metadata_regex(), info_dictionary(content)) else {
            return metadata;
        };

        for caps in re.captures_iter(info) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                metadata.insert(
                    String::from_utf8_lossy(key.as_bytes()).into_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                );
            }
        }

        metadata
    }
}

/// Body of the indirect object named by the last `/Info N G R` reference.
fn info_dictionary(content: &[u8]) -> Option<&[u8]> {
    let reference = info_ref_regex()?.captures_iter(content).last()?;
    let target = (number(reference.get(1))?, number(reference.get(2))?);

    object_regex()?
        .captures_iter(content)
        .filter(|caps| {
            number(caps.get(1)) == Some(target.0) && number(caps.get(2)) == Some(target.1)
        })
        .last()
        .and_then(|caps| caps.get(3))
        .map(|body| body.as_bytes())
}

fn number(m: Option<regex::bytes::Match<'_>>) -> Option<u64> {
    std::str::from_utf8(m?.as_bytes()).ok()?.parse().ok()
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::error!("Invalid metadata pattern: {}", e);
            None
        }
    })
    .as_ref()
}

fn metadata_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, &format!(r"(?s-u)/({METADATA_KEYS})\s*\(((?:[^()\\]|\\.)*)\)"))
}

fn info_ref_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?-u)/Info\s+(\d+)\s+(\d+)\s+R")
}

fn object_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?s-u)\b(\d+)\s+(\d+)\s+obj\b(.*?)\bendobj\b")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pages: &[&str]) -> ExtractedDocument {
        ExtractedDocument {
            pages: pages.iter().map(|p| (*p).to_string()).collect(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_not_a_pdf() {
        let result = DocumentExtractor::extract(b"plain text", ExtractOptions::default());
        assert!(matches!(result, Err(DocumentError::NotAPdf)));
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(DocumentExtractor::looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(DocumentExtractor::looks_like_pdf(b"\r\n%PDF-1.4"));
        assert!(!DocumentExtractor::looks_like_pdf(b"PDF-1.4"));
        assert!(!DocumentExtractor::looks_like_pdf(b""));
    }

    #[test]
    fn test_extract_metadata() {
        let raw = b"%PDF-1.4\n1 0 obj << /Title (Quarterly Report) /Author (A. Writer) /Foo (x) >>\nendobj\n\
                    trailer << /Root 2 0 R /Info 1 0 R >>";
        let metadata = DocumentExtractor::extract_metadata(raw);
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["Title"], "Quarterly Report");
        assert_eq!(metadata["Author"], "A. Writer");
    }

    #[test]
    fn test_extract_metadata_ignores_other_objects() {
        let raw = b"%PDF-1.4\n\
                    4 0 obj << /Title (Report) /Producer (Writer 1.0) >> endobj\n\
                    7 0 obj << /Title (Chapter 3) /Parent 6 0 R >> endobj\n\
                    trailer << /Info 4 0 R >>";
        let metadata = DocumentExtractor::extract_metadata(raw);
        assert_eq!(metadata["Title"], "Report");
        assert_eq!(metadata["Producer"], "Writer 1.0");
    }

    #[test]
    fn test_extract_metadata_incremental_update_wins() {
        let raw = b"%PDF-1.4\n\
                    1 0 obj << /Title (Draft) >> endobj\n\
                    trailer << /Info 1 0 R >>\n\
                    11 0 obj << /Title (Outline) >> endobj\n\
                    1 0 obj << /Title (Final) >> endobj\n\
                    trailer << /Prev 9 /Info 1 0 R >>";
        let metadata = DocumentExtractor::extract_metadata(raw);
        assert_eq!(metadata["Title"], "Final");
    }

    #[test]
    fn test_extract_metadata_without_info_reference() {
        let raw = b"%PDF-1.4\n1 0 obj << /Title (Loose) >> endobj\ntrailer << /Root 2 0 R >>";
        assert!(DocumentExtractor::extract_metadata(raw).is_empty());
        // Referenced object missing (e.g. in a compressed object stream)
        let raw = b"%PDF-1.5\ntrailer << /Info 9 0 R >>";
        assert!(DocumentExtractor::extract_metadata(raw).is_empty());
    }

    #[test]
    fn test_extract_metadata_escaped_parens() {
        let raw = br"3 0 obj << /Subject (a \(b\) c) >> endobj trailer << /Info 3 0 R >>";
        let metadata = DocumentExtractor::extract_metadata(raw);
        assert_eq!(metadata["Subject"], r"a \(b\) c");
    }

    #[test]
    fn test_canonical_signal_text_and_pages() {
        let options = ExtractOptions::default();
        assert_eq!(doc(&["one", "two"]).canonical_signal(options), "onetwopages:2");
    }

    #[test]
    fn test_canonical_signal_without_text() {
        let options = ExtractOptions {
            extract_text: false,
            extract_metadata: false,
        };
        assert_eq!(doc(&["one", "two"]).canonical_signal(options), "pages:2");
    }

    #[test]
    fn test_canonical_signal_with_metadata() {
        let mut d = doc(&["body"]);
        d.metadata.insert("Title".to_string(), "T".to_string());
        let options = ExtractOptions {
            extract_text: true,
            extract_metadata: true,
        };
        assert_eq!(d.canonical_signal(options), r#"body{"Title":"T"}pages:1"#);
    }

    #[test]
    fn test_canonical_signal_is_nfc() {
        let composed = doc(&["caf\u{e9}"]);
        let decomposed = doc(&["cafe\u{301}"]);
        let options = ExtractOptions::default();
        assert_eq!(
            composed.canonical_signal(options),
            decomposed.canonical_signal(options)
        );
    }
}
