//! Relative path validation.
//!
//! Every user-supplied path is routed through [`sanitize`] before it touches
//! the mirror directory or the remote store.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NorthbaseError, Result};

/// A normalized, forward-slash separated path that is safe to join onto the
/// mirror root and to use as a remote key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of this path under `root`, one component per segment.
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn clean(raw: &str) -> String {
    raw.replace('\\', "/").trim_start_matches('/').to_string()
}

fn is_bad_segment(seg: &str) -> bool {
    seg.trim().is_empty() || seg == "." || seg == ".."
}

/// Validate and normalize a user-supplied relative path.
///
/// Backslashes become slashes and leading slashes are stripped. Anything with
/// an empty, whitespace-only, `.` or `..` segment is rejected.
pub fn sanitize(raw: &str) -> Result<RelativePath> {
    let cleaned = clean(raw);
    if cleaned.is_empty() || cleaned.split('/').any(is_bad_segment) {
        return Err(NorthbaseError::InvalidPath {
            path: raw.to_string(),
        });
    }
    Ok(RelativePath(cleaned))
}

/// Normalize a listing prefix.
///
/// Same rules as [`sanitize`], except that an empty prefix (everything) and a
/// single trailing slash are allowed.
pub fn sanitize_prefix(raw: &str) -> Result<String> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return Ok(cleaned);
    }
    let body = cleaned.strip_suffix('/').unwrap_or(&cleaned);
    if body.split('/').any(is_bad_segment) {
        return Err(NorthbaseError::InvalidPath {
            path: raw.to_string(),
        });
    }
    Ok(cleaned)
}
