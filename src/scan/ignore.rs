//! Directory-name ignore rules for arrangement scans
//!
//! Patterns are matched against the final path component of each
//! directory below the scan root. A matching directory is pruned along
//! with everything beneath it. Files are never matched.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::ffi::OsStr;

/// Directory names pruned when no explicit list is given.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[".git"];

/// Errors for ignore rules
#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Set of directory names to prune
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_DIRS).unwrap_or_else(|_| Self::none())
    }
}

impl IgnoreRules {
    /// Build rules from literal directory names such as `.venv` or
    /// `__pycache__`. Glob metacharacters in a name match only themselves.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, IgnoreError> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            builder.add(Glob::new(&globset::escape(pattern))?);
            kept.push(pattern.to_string());
        }
        Ok(Self {
            glob_set: builder.build()?,
            patterns: kept,
        })
    }

    /// Rules that prune nothing.
    pub fn none() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// True if a directory with this name should be skipped.
    pub fn is_ignored(&self, dir_name: &OsStr) -> bool {
        self.glob_set.is_match(dir_name.to_string_lossy().as_ref())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
