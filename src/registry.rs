//! In-memory file registry.
//!
//! Raw blobs enter through [`RawFile`]; only PDFs (by declared MIME type or
//! `.pdf` extension) are accepted and turned into [`TrackedFile`]s. The
//! [`Registry`] is the single owner of tracked files and is only mutated by
//! the detection engine.

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fingerprint::DigestCache;

/// MIME type of the accepted document format.
pub const PDF_MIME: &str = "application/pdf";

/// File extension of the accepted document format.
pub const PDF_EXTENSION: &str = ".pdf";

/// A raw file-like object handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// Display name (usually the file name)
    pub name: String,
    /// Declared content type, if the source provides one
    pub content_type: Option<String>,
    /// Byte content
    pub content: Vec<u8>,
}

impl RawFile {
    /// Create a raw file with no declared content type.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            content: content.into(),
        }
    }

    /// Set the declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, using its file name as the display name.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be read.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, content))
    }

    /// Byte size of the content.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Whether a raw file is a PDF by declared type or name extension.
///
/// # Example
///
/// ```
/// use pdfdupe::registry::{is_accepted, RawFile};
///
/// assert!(is_accepted(&RawFile::new("report.PDF", b"...".to_vec())));
/// assert!(is_accepted(&RawFile::new("blob", b"...".to_vec()).with_content_type("application/pdf")));
/// assert!(!is_accepted(&RawFile::new("notes.txt", b"...".to_vec())));
/// ```
#[must_use]
pub fn is_accepted(raw: &RawFile) -> bool {
    raw.content_type.as_deref() == Some(PDF_MIME)
        || raw.name.to_lowercase().ends_with(PDF_EXTENSION)
}

/// A registered document.
///
/// Content is shared and immutable once registered; clones are cheap.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    /// Unique id assigned at registration
    pub id: String,
    /// Display name
    pub name: String,
    /// Byte size
    pub size: u64,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
    /// Grouping key from the most recent detection run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Page count, when structured extraction succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip)]
    content: Arc<[u8]>,
    #[serde(skip)]
    digests: DigestCache,
}

impl TrackedFile {
    /// Track a raw file under the given id, registered now.
    #[must_use]
    pub fn from_raw(id: String, raw: RawFile) -> Self {
        Self {
            id,
            name: raw.name,
            size: raw.content.len() as u64,
            registered_at: Utc::now(),
            fingerprint: None,
            page_count: None,
            content: Arc::from(raw.content),
            digests: DigestCache::default(),
        }
    }

    /// Override the registration timestamp.
    #[must_use]
    pub fn with_registered_at(mut self, at: DateTime<Utc>) -> Self {
        self.registered_at = at;
        self
    }

    /// Raw byte content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Digests cached from earlier runs.
    #[must_use]
    pub fn digests(&self) -> &DigestCache {
        &self.digests
    }

    /// Store freshly computed digests.
    pub fn set_digests(&mut self, digests: DigestCache) {
        if let Some(pages) = digests.page_count() {
            self.page_count = Some(pages);
        }
        self.digests = digests;
    }
}

/// Ordered collection of tracked files.
///
/// Every mutation is applied to the whole list at once; there is no
/// partially-registered state.
#[derive(Debug, Default)]
pub struct Registry {
    files: Vec<TrackedFile>,
    next_seq: u64,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the PDFs among `raw_files` and append them in input order.
    ///
    /// Returns the newly tracked files.
    pub fn register(&mut self, raw_files: impl IntoIterator<Item = RawFile>) -> Vec<TrackedFile> {
        let mut added = Vec::new();
        for raw in raw_files {
            if !is_accepted(&raw) {
                log::debug!("Skipping non-PDF input: {}", raw.name);
                continue;
            }
            let id = self.next_id();
            added.push(TrackedFile::from_raw(id, raw));
        }

        self.files.extend(added.iter().cloned());
        added
    }

    fn next_id(&mut self) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        format!("{:x}-{:06x}", Utc::now().timestamp_millis(), seq)
    }

    /// Remove a file by id.
    pub fn remove(&mut self, id: &str) -> Option<TrackedFile> {
        let index = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(index))
    }

    /// Keep only the files matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&TrackedFile) -> bool) {
        self.files.retain(keep);
    }

    /// Drop every file.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Look up a file by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedFile> {
        self.files.iter().find(|f| f.id == id)
    }

    /// All files in registration order.
    #[must_use]
    pub fn files(&self) -> &[TrackedFile] {
        &self.files
    }

    /// Mutable access for in-place fingerprint updates.
    pub fn files_mut(&mut self) -> &mut [TrackedFile] {
        &mut self.files
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_is_accepted_by_extension() {
        assert!(is_accepted(&RawFile::new("a.pdf", vec![])));
        assert!(is_accepted(&RawFile::new("A.PDF", vec![])));
        assert!(!is_accepted(&RawFile::new("a.pdf.txt", vec![])));
    }

    #[test]
    fn test_is_accepted_by_mime() {
        let raw = RawFile::new("upload", vec![]).with_content_type(PDF_MIME);
        assert!(is_accepted(&raw));

        let raw = RawFile::new("upload", vec![]).with_content_type("text/plain");
        assert!(!is_accepted(&raw));
    }

    #[test]
    fn test_register_filters_and_assigns_ids() {
        let mut registry = Registry::new();
        let added = registry.register(vec![
            RawFile::new("a.pdf", b"x".to_vec()),
            RawFile::new("notes.txt", b"x".to_vec()),
            RawFile::new("b.pdf", b"yy".to_vec()),
        ]);

        assert_eq!(added.len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(added[0].name, "a.pdf");
        assert_eq!(added[1].size, 2);

        let ids: HashSet<_> = added.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_register_empty_input() {
        let mut registry = Registry::new();
        assert!(registry.register(Vec::new()).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_and_get() {
        let mut registry = Registry::new();
        let added = registry.register(vec![
            RawFile::new("a.pdf", b"a".to_vec()),
            RawFile::new("b.pdf", b"b".to_vec()),
        ]);

        assert!(registry.get(&added[0].id).is_some());
        let removed = registry.remove(&added[0].id).unwrap();
        assert_eq!(removed.name, "a.pdf");
        assert!(registry.get(&added[0].id).is_none());
        assert!(registry.remove("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tracked_file_serializes_without_content() {
        let file = TrackedFile::from_raw("id-1".into(), RawFile::new("a.pdf", b"secret".to_vec()));
        let json = serde_json::to_value(&file).unwrap();

        assert_eq!(json["id"], "id-1");
        assert_eq!(json["name"], "a.pdf");
        assert_eq!(json["size"], 6);
        assert!(json.get("registeredAt").is_some());
        assert!(json.get("content").is_none());
        assert!(json.get("fingerprint").is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"bytes").unwrap();

        let raw = RawFile::from_path(&path).unwrap();
        assert_eq!(raw.name, "doc.pdf");
        assert_eq!(raw.size(), 5);
        assert!(raw.content_type.is_none());
    }
}
