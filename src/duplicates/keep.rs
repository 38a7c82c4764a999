//! Keeper selection for duplicate clusters.
//!
//! Each policy is a left-to-right reduction over the member list with a
//! strict comparison, so ties always keep the earliest member.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DetectError;
use crate::registry::TrackedFile;

/// Which cluster member to retain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum KeepPolicy {
    /// Earliest in registration order
    #[default]
    First,
    /// Fewest bytes
    Smallest,
    /// Most bytes
    Largest,
    /// Latest registration timestamp
    Newest,
    /// Earliest registration timestamp
    Oldest,
}

impl KeepPolicy {
    /// Every policy, in declaration order.
    pub const ALL: [KeepPolicy; 5] = [
        KeepPolicy::First,
        KeepPolicy::Smallest,
        KeepPolicy::Largest,
        KeepPolicy::Newest,
        KeepPolicy::Oldest,
    ];

    /// Lowercase name as used in config and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeepPolicy::First => "first",
            KeepPolicy::Smallest => "smallest",
            KeepPolicy::Largest => "largest",
            KeepPolicy::Newest => "newest",
            KeepPolicy::Oldest => "oldest",
        }
    }
}

impl fmt::Display for KeepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeepPolicy {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| DetectError::UnknownKeepPolicy {
                name: s.to_string(),
                suggestion: super::strategy::suggest(&needle, Self::ALL.iter().map(|p| p.as_str())),
            })
    }
}

impl TryFrom<String> for KeepPolicy {
    type Error = DetectError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Pick the member to retain under `policy`.
///
/// Pure: never mutates its input. Returns `None` only for an empty slice.
///
/// # Example
///
/// ```
/// use pdfdupe::duplicates::{select_keeper, KeepPolicy};
/// use pdfdupe::registry::{RawFile, TrackedFile};
///
/// let files = vec![
///     TrackedFile::from_raw("a".into(), RawFile::new("a.pdf", vec![0; 10])),
///     TrackedFile::from_raw("b".into(), RawFile::new("b.pdf", vec![0; 30])),
/// ];
/// assert_eq!(select_keeper(&files, KeepPolicy::Largest).unwrap().id, "b");
/// assert_eq!(select_keeper(&files, KeepPolicy::First).unwrap().id, "a");
/// ```
#[must_use]
pub fn select_keeper(files: &[TrackedFile], policy: KeepPolicy) -> Option<&TrackedFile> {
    let mut iter = files.iter();
    let first = iter.next()?;
    let keeper = iter.fold(first, |best, f| {
        let better = match policy {
            KeepPolicy::First => false,
            KeepPolicy::Smallest => f.size < best.size,
            KeepPolicy::Largest => f.size > best.size,
            KeepPolicy::Newest => f.registered_at > best.registered_at,
            KeepPolicy::Oldest => f.registered_at < best.registered_at,
        };
        if better {
            f
        } else {
            best
        }
    });
    Some(keeper)
}
