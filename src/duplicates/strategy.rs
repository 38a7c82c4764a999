//! Grouping strategies.
//!
//! # Overview
//!
//! Built-in strategies form a closed set ([`Strategy`]). Each one declares
//! which digests it needs ([`Strategy::needs`]), derives a grouping key per
//! file from the cached digests, and buckets by that key. The fuzzy
//! strategy is the exception: it clusters greedily by [`similarity`].
//!
//! Caller-supplied plugins implement the same [`DetectionStrategy`] trait
//! as the built-ins.
//!
//! # Fuzzy clustering
//!
//! Files are visited in registration order. Each unassigned file seeds a
//! cluster and absorbs every later unassigned file whose similarity *to the
//! seed* reaches the threshold. Similarity between absorbed members is never
//! checked, so the result is not a transitive closure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::engine::DetectOptions;
use super::groups::{bucket_by_key, DuplicateCluster};
use super::DetectError;
use crate::fingerprint::{DigestNeeds, ExtractOptions, Fingerprinter};
use crate::registry::TrackedFile;

/// Width of a token chunk in the token strategy.
pub const TOKEN_WIDTH: usize = 8;

/// Separator between tokens in a token key.
const TOKEN_SEPARATOR: &str = "|";

/// Detection capability shared by built-in strategies and plugins.
///
/// Implementations receive the registered files in registration order and
/// return clusters of two or more files. They must not assume any digest
/// is cached.
pub trait DetectionStrategy: Send + Sync {
    /// Name reported in the outcome.
    fn name(&self) -> &str;

    /// Partition `files` into duplicate clusters.
    ///
    /// # Errors
    ///
    /// Any error aborts this strategy only; the engine records it as a
    /// non-fatal message.
    fn detect(
        &self,
        files: &[TrackedFile],
        options: &DetectOptions,
    ) -> anyhow::Result<Vec<DuplicateCluster>>;
}

/// Name of a built-in strategy.
///
/// Deserializes through [`FromStr`], so aliases and "did you mean"
/// suggestions apply to config files as well as the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum StrategyKind {
    /// Bucket by byte digest
    ByteExact,
    /// Bucket by structured digest
    Structured,
    /// Bucket by the (byte, structured) digest pair
    #[default]
    Combined,
    /// Greedy similarity clustering over structured digests
    Fuzzy,
    /// Bucket by sorted digest chunks
    Token,
}

impl StrategyKind {
    /// Every strategy, in declaration order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::ByteExact,
        StrategyKind::Structured,
        StrategyKind::Combined,
        StrategyKind::Fuzzy,
        StrategyKind::Token,
    ];

    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::ByteExact => "byte-exact",
            StrategyKind::Structured => "structured",
            StrategyKind::Combined => "combined",
            StrategyKind::Fuzzy => "fuzzy",
            StrategyKind::Token => "token",
        }
    }

    fn from_alias(name: &str) -> Option<Self> {
        match name {
            "exact" | "hash" => Some(StrategyKind::ByteExact),
            "content" => Some(StrategyKind::Structured),
            "hybrid" => Some(StrategyKind::Combined),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == needle)
            .or_else(|| Self::from_alias(&needle))
            .ok_or_else(|| DetectError::UnknownStrategy {
                name: s.to_string(),
                suggestion: suggest(&needle, Self::ALL.iter().map(|k| k.as_str())),
            })
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = DetectError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Closest candidate to an unrecognised name, if any is close enough.
pub(crate) fn suggest<'a>(
    needle: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    candidates
        .into_iter()
        .map(|c| (strsim::jaro_winkler(needle, c), c))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Flags that only affect fuzzy similarity scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    /// Compare characters without case folding
    pub case_sensitive: bool,
    /// Drop whitespace before comparing
    pub ignore_whitespace: bool,
    /// Drop ASCII punctuation before comparing
    pub ignore_punctuation: bool,
}

/// Positional-overlap similarity of two signatures in `[0, 1]`.
///
/// Counts positions where both strings hold the same character and divides
/// by the length of the longer string. Two empty strings score `1.0`.
///
/// # Example
///
/// ```
/// use pdfdupe::duplicates::{similarity, SimilarityOptions};
///
/// let opts = SimilarityOptions::default();
/// assert_eq!(similarity("abcd", "abcd", opts), 1.0);
/// assert_eq!(similarity("abcd", "abzz", opts), 0.5);
/// assert_eq!(similarity("ABCD", "abcd", opts), 1.0);
/// ```
#[must_use]
pub fn similarity(a: &str, b: &str, options: SimilarityOptions) -> f64 {
    let prepare = |s: &str| -> Vec<char> {
        s.chars()
            .filter(|c| !(options.ignore_whitespace && c.is_whitespace()))
            .filter(|c| !(options.ignore_punctuation && c.is_ascii_punctuation()))
            .flat_map(|c| {
                let folded: Vec<char> = if options.case_sensitive {
                    vec![c]
                } else {
                    c.to_lowercase().collect()
                };
                folded
            })
            .collect()
    };

    let a = prepare(a);
    let b = prepare(b);
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / longest as f64
}

/// Order-insensitive key built from fixed-width chunks of a digest.
///
/// A trailing partial chunk is dropped.
#[must_use]
pub fn token_key(digest: &str) -> String {
    let mut tokens: Vec<&str> = digest
        .as_bytes()
        .chunks_exact(TOKEN_WIDTH)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    tokens.sort_unstable();
    tokens.join(TOKEN_SEPARATOR)
}

/// A fully parameterised built-in strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Bucket by byte digest
    ByteExact,
    /// Bucket by structured digest
    Structured(ExtractOptions),
    /// Bucket by `"<bytes>:<structured>"`
    Combined(ExtractOptions),
    /// Greedy seed-based similarity clustering
    Fuzzy {
        /// Options for the structured digest used as signature
        extract: ExtractOptions,
        /// Minimum similarity to the seed, in `[0, 1]`
        threshold: f64,
        /// Scoring flags
        similarity: SimilarityOptions,
    },
    /// Bucket by the token key of the structured digest (metadata excluded)
    Token(ExtractOptions),
}

impl Strategy {
    /// Build the strategy described by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidThreshold`] if the threshold is NaN or
    /// outside `[0, 1]`.
    pub fn from_options(options: &DetectOptions) -> Result<Self, DetectError> {
        let threshold = options.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DetectError::InvalidThreshold(threshold));
        }

        let extract = options.extract;
        Ok(match options.strategy {
            StrategyKind::ByteExact => Strategy::ByteExact,
            StrategyKind::Structured => Strategy::Structured(extract),
            StrategyKind::Combined => Strategy::Combined(extract),
            StrategyKind::Fuzzy => Strategy::Fuzzy {
                extract,
                threshold,
                similarity: options.similarity,
            },
            StrategyKind::Token => Strategy::Token(ExtractOptions {
                extract_metadata: false,
                ..extract
            }),
        })
    }

    /// The strategy's name.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::ByteExact => StrategyKind::ByteExact,
            Strategy::Structured(_) => StrategyKind::Structured,
            Strategy::Combined(_) => StrategyKind::Combined,
            Strategy::Fuzzy { .. } => StrategyKind::Fuzzy,
            Strategy::Token(_) => StrategyKind::Token,
        }
    }

    /// Threshold, for fuzzy only.
    #[must_use]
    pub fn threshold(&self) -> Option<f64> {
        match self {
            Strategy::Fuzzy { threshold, .. } => Some(*threshold),
            _ => None,
        }
    }

    /// Digests that must be cached before [`Strategy::cluster`] runs.
    #[must_use]
    pub fn needs(&self) -> DigestNeeds {
        match *self {
            Strategy::ByteExact => DigestNeeds {
                bytes: true,
                structured: None,
            },
            Strategy::Structured(extract)
            | Strategy::Fuzzy { extract, .. }
            | Strategy::Token(extract) => DigestNeeds {
                bytes: false,
                structured: Some(extract),
            },
            Strategy::Combined(extract) => DigestNeeds {
                bytes: true,
                structured: Some(extract),
            },
        }
    }

    /// Grouping key for `file`, from its cached digests.
    ///
    /// Returns `None` if a required digest is missing. For fuzzy this is the
    /// file's own signature; cluster members take the seed's instead.
    #[must_use]
    pub fn fingerprint_key(&self, file: &TrackedFile) -> Option<String> {
        let digests = file.digests();
        match *self {
            Strategy::ByteExact => digests.bytes.clone(),
            Strategy::Structured(extract) | Strategy::Fuzzy { extract, .. } => {
                digests.structured_for(extract).map(|s| s.digest.clone())
            }
            Strategy::Combined(extract) => {
                let bytes = digests.bytes.as_deref()?;
                let structured = digests.structured_for(extract)?;
                Some(format!("{}:{}", bytes, structured.digest))
            }
            Strategy::Token(extract) => digests
                .structured_for(extract)
                .map(|s| token_key(&s.digest)),
        }
    }

    /// Cluster files whose digests are already cached.
    ///
    /// Files without the required digests are left out.
    #[must_use]
    pub fn cluster(&self, files: &[&TrackedFile]) -> Vec<DuplicateCluster> {
        let keyed = files
            .iter()
            .filter_map(|f| self.fingerprint_key(f).map(|key| (key, *f)));

        match *self {
            Strategy::Fuzzy {
                threshold,
                similarity: sim,
                ..
            } => fuzzy_clusters(keyed.collect(), threshold, sim),
            _ => bucket_by_key(keyed),
        }
    }
}

fn fuzzy_clusters(
    keyed: Vec<(String, &TrackedFile)>,
    threshold: f64,
    options: SimilarityOptions,
) -> Vec<DuplicateCluster> {
    let mut assigned = vec![false; keyed.len()];
    let mut clusters = Vec::new();

    for seed in 0..keyed.len() {
        if assigned[seed] {
            continue;
        }
        let (seed_key, seed_file) = &keyed[seed];
        let mut members = vec![(*seed_file).clone()];
        let mut absorbed = Vec::new();

        for (other, (key, file)) in keyed.iter().enumerate().skip(seed + 1) {
            if assigned[other] {
                continue;
            }
            if similarity(seed_key, key, options) >= threshold {
                members.push((*file).clone());
                absorbed.push(other);
            }
        }

        if let Some(cluster) = DuplicateCluster::new(seed_key.clone(), members) {
            assigned[seed] = true;
            for i in absorbed {
                assigned[i] = true;
            }
            clusters.push(cluster);
        }
    }

    log::debug!(
        "Fuzzy clustering at threshold {}: {} clusters",
        threshold,
        clusters.len()
    );
    clusters
}

/// Compute and cache the digests `strategy` needs, then cluster.
///
/// Files that fail to fingerprint keep their previous cache and are left
/// out of the result.
pub fn group(
    files: &mut [TrackedFile],
    strategy: &Strategy,
    fingerprinter: &Fingerprinter,
) -> Vec<DuplicateCluster> {
    let needs = strategy.needs();
    for file in files.iter_mut() {
        if file.digests().satisfies(&needs) {
            continue;
        }
        match fingerprinter.fingerprint(file, &needs) {
            Ok(digests) => file.set_digests(digests),
            Err(e) => log::warn!("Skipping {}: {}", file.name, e),
        }
    }

    let refs: Vec<&TrackedFile> = files.iter().collect();
    strategy.cluster(&refs)
}

impl DetectionStrategy for Strategy {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn detect(
        &self,
        files: &[TrackedFile],
        options: &DetectOptions,
    ) -> anyhow::Result<Vec<DuplicateCluster>> {
        let fingerprinter = Fingerprinter::new().with_max_file_size(options.max_file_size);
        let mut scratch = files.to_vec();
        Ok(group(&mut scratch, self, &fingerprinter))
    }
}
