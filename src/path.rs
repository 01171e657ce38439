//! Path utilities for odoo-bootstrap
//!
//! Paths are normalized lexically: `.` components are dropped and `..`
//! components pop their parent, without touching the filesystem. Repository
//! directories may not exist yet when the configuration is resolved, so
//! `std::fs::canonicalize` is not an option here.

use std::path::{Component, Path, PathBuf};

use glob::Pattern;

use crate::error::Result;

/// Lexically normalize a path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `base` and normalize the result.
pub fn absolutize(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Directory filter for repository jobs.
///
/// A directory is selected when the glob matches its absolute path, its path
/// relative to the project root, or when the relative path equals the
/// normalized pattern text.
#[derive(Debug, Clone)]
pub struct DirMatch {
    pattern: Pattern,
    literal: PathBuf,
    root: PathBuf,
}

impl DirMatch {
    pub fn new(glob: &str, root: &Path) -> Result<Self> {
        Ok(Self {
            pattern: Pattern::new(glob)?,
            literal: normalize(Path::new(glob)),
            root: root.to_path_buf(),
        })
    }

    pub fn matches(&self, dir: &Path) -> bool {
        if self.pattern.matches_path(dir) {
            return true;
        }
        match dir.strip_prefix(&self.root) {
            Ok(relative) => self.pattern.matches_path(relative) || relative == self.literal,
            Err(_) => false,
        }
    }
}
