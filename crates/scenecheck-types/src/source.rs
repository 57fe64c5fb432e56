//! Call-site identity of a check.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// File and line of the assertion call that produced an issue.
///
/// Two values are equal iff both fields match. The same rule line failing on
/// a prefab and on its instances yields equal `SourceInfo`s, which is what
/// parent resolution keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file: String,
    pub line: u32,
}

impl SourceInfo {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Capture the location of the caller.
    ///
    /// Call this from a `#[track_caller]` function to get the rule's call site.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.file
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.file)
    }
}

impl From<&Location<'_>> for SourceInfo {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
