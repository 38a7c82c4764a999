//! Fingerprinting for registered documents.
//!
//! This module provides functionality for:
//! - Byte-exact digests over the raw content (BLAKE3)
//! - Structured digests over the extracted text, metadata and page count
//! - Per-file digest caching so repeated runs skip unchanged work
//!
//! # Architecture
//!
//! The fingerprinter is divided into submodules:
//! - [`hasher`]: BLAKE3 byte digests and hex helpers
//! - [`document`]: Structured PDF extraction and the canonical signal string
//!
//! # Fallback
//!
//! Structured extraction never fails hard. When the content cannot be
//! parsed the structured digest silently degrades to the byte digest and
//! the fallback is logged at warn level.
//!
//! # Example
//!
//! ```
//! use pdfdupe::fingerprint::{ExtractOptions, Fingerprinter};
//!
//! let fingerprinter = Fingerprinter::new();
//! let structured = fingerprinter.digest_structured(b"not a pdf", ExtractOptions::default());
//!
//! assert!(structured.fallback);
//! assert_eq!(structured.digest, fingerprinter.digest_bytes(b"not a pdf"));
//! ```

pub mod document;
pub mod hasher;

use serde::{Deserialize, Serialize};

use crate::registry::TrackedFile;

pub use document::{DocumentError, DocumentExtractor, ExtractedDocument};
pub use hasher::{digest_bytes, digest_bytes_hex, hash_to_hex, hex_to_hash, Hash};

/// Which parts of a document feed the structured digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Include the text layer.
    pub extract_text: bool,
    /// Include the document Info metadata.
    pub extract_metadata: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            extract_text: true,
            extract_metadata: false,
        }
    }
}

/// A structured digest together with the options that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredDigest {
    /// Options used for extraction
    pub options: ExtractOptions,
    /// Hex digest of the canonical signal (or of the raw bytes on fallback)
    pub digest: String,
    /// Page count, when extraction succeeded
    pub page_count: Option<usize>,
    /// Whether extraction failed and the byte digest was used instead
    pub fallback: bool,
}

/// The digests a strategy needs before it can cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestNeeds {
    /// Byte digest required
    pub bytes: bool,
    /// Structured digest required, with these options
    pub structured: Option<ExtractOptions>,
}

/// Digests cached on a tracked file.
///
/// Content is immutable once registered, so the byte digest never goes
/// stale. The structured digest is only reused when the extraction
/// options match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestCache {
    /// Cached byte digest
    pub bytes: Option<String>,
    /// Cached structured digest
    pub structured: Option<StructuredDigest>,
}

impl DigestCache {
    /// The cached structured digest, if it was produced with `options`.
    #[must_use]
    pub fn structured_for(&self, options: ExtractOptions) -> Option<&StructuredDigest> {
        self.structured.as_ref().filter(|s| s.options == options)
    }

    /// Whether every digest in `needs` is already cached.
    #[must_use]
    pub fn satisfies(&self, needs: &DigestNeeds) -> bool {
        (!needs.bytes || self.bytes.is_some())
            && needs
                .structured
                .is_none_or(|options| self.structured_for(options).is_some())
    }

    /// Page count recorded by the last successful extraction.
    #[must_use]
    pub fn page_count(&self) -> Option<usize> {
        self.structured.as_ref().and_then(|s| s.page_count)
    }
}

/// Per-file fingerprinting failures.
///
/// These are the non-degradable failures: the affected file keeps no
/// fingerprint for the run, but the batch continues.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// The content exceeds the configured size limit.
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Size of the content in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },
}

/// Computes byte and structured digests.
///
/// Holds no state beyond its configuration; all digests are returned to
/// the caller, which decides where to cache them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    max_file_size: Option<u64>,
}

impl Fingerprinter {
    /// Create a fingerprinter with no size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject content larger than `limit` bytes.
    #[must_use]
    pub fn with_max_file_size(mut self, limit: Option<u64>) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Byte-exact digest over the raw content.
    #[must_use]
    pub fn digest_bytes(&self, content: &[u8]) -> String {
        digest_bytes_hex(content)
    }

    /// Structured digest over the extracted signal.
    ///
    /// Falls back to [`Fingerprinter::digest_bytes`] when extraction fails.
    #[must_use]
    pub fn digest_structured(&self, content: &[u8], options: ExtractOptions) -> StructuredDigest {
        match DocumentExtractor::extract(content, options) {
            Ok(document) => {
                let signal = document.canonical_signal(options);
                StructuredDigest {
                    options,
                    digest: digest_bytes_hex(signal.as_bytes()),
                    page_count: Some(document.page_count()),
                    fallback: false,
                }
            }
            Err(e) => {
                log::warn!("Structured extraction failed, using byte digest: {}", e);
                StructuredDigest {
                    options,
                    digest: self.digest_bytes(content),
                    page_count: None,
                    fallback: true,
                }
            }
        }
    }

    /// Compute whatever `needs` asks for that `file` does not have cached.
    ///
    /// Returns the complete cache for the caller to store back on the file.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::TooLarge`] if the file exceeds the
    /// configured size limit.
    pub fn fingerprint(
        &self,
        file: &TrackedFile,
        needs: &DigestNeeds,
    ) -> Result<DigestCache, FingerprintError> {
        if let Some(limit) = self.max_file_size {
            if file.size > limit {
                return Err(FingerprintError::TooLarge {
                    size: file.size,
                    limit,
                });
            }
        }

        let mut cache = file.digests().clone();

        if needs.bytes && cache.bytes.is_none() {
            cache.bytes = Some(self.digest_bytes(file.content()));
        }

        if let Some(options) = needs.structured {
            if cache.structured_for(options).is_none() {
                log::trace!("Structured digest: {}", file.name);
                cache.structured = Some(self.digest_structured(file.content(), options));
            }
        }

        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RawFile;

    fn tracked(content: &[u8]) -> TrackedFile {
        TrackedFile::from_raw("test-1".into(), RawFile::new("a.pdf", content.to_vec()))
    }

    #[test]
    fn test_extract_options_default() {
        let options = ExtractOptions::default();
        assert!(options.extract_text);
        assert!(!options.extract_metadata);
    }

    #[test]
    fn test_structured_fallback_matches_byte_digest() {
        let fp = Fingerprinter::new();
        let structured = fp.digest_structured(b"x", ExtractOptions::default());
        assert!(structured.fallback);
        assert!(structured.page_count.is_none());
        assert_eq!(structured.digest, fp.digest_bytes(b"x"));
    }

    #[test]
    fn test_structured_is_deterministic() {
        let fp = Fingerprinter::new();
        let options = ExtractOptions {
            extract_text: true,
            extract_metadata: true,
        };
        assert_eq!(
            fp.digest_structured(b"%PDF-1.4 broken", options),
            fp.digest_structured(b"%PDF-1.4 broken", options)
        );
    }

    #[test]
    fn test_fingerprint_fills_requested_digests() {
        let fp = Fingerprinter::new();
        let file = tracked(b"content");
        let needs = DigestNeeds {
            bytes: true,
            structured: Some(ExtractOptions::default()),
        };

        let cache = fp.fingerprint(&file, &needs).unwrap();
        assert!(cache.satisfies(&needs));
        assert_eq!(cache.bytes.as_deref(), Some(fp.digest_bytes(b"content").as_str()));
    }

    #[test]
    fn test_fingerprint_only_bytes() {
        let fp = Fingerprinter::new();
        let file = tracked(b"content");
        let needs = DigestNeeds {
            bytes: true,
            structured: None,
        };

        let cache = fp.fingerprint(&file, &needs).unwrap();
        assert!(cache.bytes.is_some());
        assert!(cache.structured.is_none());
    }

    #[test]
    fn test_structured_cache_keyed_by_options() {
        let fp = Fingerprinter::new();
        let mut file = tracked(b"content");
        let text_only = ExtractOptions::default();
        let with_meta = ExtractOptions {
            extract_text: true,
            extract_metadata: true,
        };

        let cache = fp
            .fingerprint(
                &file,
                &DigestNeeds {
                    bytes: false,
                    structured: Some(text_only),
                },
            )
            .unwrap();
        file.set_digests(cache);

        assert!(file.digests().structured_for(text_only).is_some());
        assert!(file.digests().structured_for(with_meta).is_none());
        assert!(!file.digests().satisfies(&DigestNeeds {
            bytes: false,
            structured: Some(with_meta),
        }));
    }

    #[test]
    fn test_size_limit() {
        let fp = Fingerprinter::new().with_max_file_size(Some(3));
        let file = tracked(b"four");
        let err = fp.fingerprint(&file, &DigestNeeds::default()).unwrap_err();
        assert_eq!(err, FingerprintError::TooLarge { size: 4, limit: 3 });
        assert_eq!(
            err.to_string(),
            "File too large: 4 bytes exceeds the 3 byte limit"
        );
    }
}
