//! Duplicate clusters and key-based bucketing.
//!
//! # Overview
//!
//! A [`DuplicateCluster`] is a fingerprint plus the ordered list of files
//! that share it (or were judged similar by the fuzzy strategy), with one
//! member picked as the keeper. Clusters always hold at least two files;
//! singleton buckets are never turned into clusters.
//!
//! # Example
//!
//! ```
//! use pdfdupe::duplicates::bucket_by_key;
//! use pdfdupe::registry::{RawFile, TrackedFile};
//!
//! let files: Vec<TrackedFile> = ["a", "b", "c"]
//!     .iter()
//!     .map(|n| TrackedFile::from_raw(n.to_string(), RawFile::new(format!("{n}.pdf"), vec![])))
//!     .collect();
//!
//! let keyed = vec![
//!     ("k1".to_string(), &files[0]),
//!     ("k2".to_string(), &files[1]),
//!     ("k1".to_string(), &files[2]),
//! ];
//! let clusters = bucket_by_key(keyed);
//!
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].fingerprint, "k1");
//! assert_eq!(clusters[0].keep_file.id, "a");
//! ```

use std::collections::HashMap;

use serde::Serialize;

use super::keep::{select_keeper, KeepPolicy};
use crate::registry::TrackedFile;

/// A confirmed cluster of duplicate files.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCluster {
    /// Shared fingerprint (for fuzzy clusters, the seed's signature)
    pub fingerprint: String,
    /// All members, in registration order
    pub files: Vec<TrackedFile>,
    /// The member to retain
    pub keep_file: TrackedFile,
    /// Every member except the keeper
    pub duplicates: Vec<TrackedFile>,
}

impl DuplicateCluster {
    /// Create a cluster with the first member as keeper.
    ///
    /// Returns `None` for fewer than two files.
    #[must_use]
    pub fn new(fingerprint: impl Into<String>, files: Vec<TrackedFile>) -> Option<Self> {
        if files.len() < 2 {
            return None;
        }
        let keep_file = files[0].clone();
        let duplicates = files[1..].to_vec();
        Some(Self {
            fingerprint: fingerprint.into(),
            files,
            keep_file,
            duplicates,
        })
    }

    /// Re-pick the keeper under `policy` and recompute the duplicates.
    pub fn apply_keep_policy(&mut self, policy: KeepPolicy) {
        if let Some(keeper) = select_keeper(&self.files, policy) {
            self.keep_file = keeper.clone();
        }
        let keep_id = &self.keep_file.id;
        self.duplicates = self
            .files
            .iter()
            .filter(|f| &f.id != keep_id)
            .cloned()
            .collect();
    }

    /// Number of files in this cluster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this cluster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of duplicate copies (everything but the keeper).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Total size of all files in this cluster.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Bytes freed by dropping every duplicate.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.duplicates.iter().map(|f| f.size).sum()
    }

    /// Whether a file id belongs to this cluster.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.files.iter().any(|f| f.id == id)
    }
}

/// Bucket files by key, preserving first-seen key order.
///
/// Buckets with a single member are dropped. Members keep their input
/// order; the first member of each bucket starts out as keeper.
#[must_use]
pub fn bucket_by_key<'a>(
    keyed: impl IntoIterator<Item = (String, &'a TrackedFile)>,
) -> Vec<DuplicateCluster> {
    let mut order: Vec<(String, Vec<TrackedFile>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (key, file) in keyed {
        match index.get(&key) {
            Some(&i) => order[i].1.push(file.clone()),
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, vec![file.clone()]));
            }
        }
    }

    let buckets = order.len();
    let clusters: Vec<DuplicateCluster> = order
        .into_iter()
        .filter_map(|(key, files)| DuplicateCluster::new(key, files))
        .collect();

    log::debug!(
        "Bucketed into {} keys, {} with duplicates",
        buckets,
        clusters.len()
    );

    clusters
}
