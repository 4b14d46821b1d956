//! Lexical upward directory walk.
//!
//! [`ancestors`] yields a directory and each of its parents, **deepest first**,
//! ending at the filesystem root. It never touches the filesystem: the input is
//! normalized to forward slashes and split on `/`, so it works the same for
//! paths that do not exist (yet) and for back-slash separated inputs.
//!
//! This is the opposite order from a layered-config ancestor walk, where the
//! shallowest directory comes first. Platform detection wants the *nearest*
//! enclosing root, so the deepest directory must be tested first.

use std::path::{Path, PathBuf};

/// Replace back-slashes with forward slashes and drop trailing separators.
pub fn normalize_slashes(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() && raw.starts_with('/') {
        "/".to_string()
    } else if trimmed.ends_with(':') {
        // `C:/` keeps its separator so it still names the drive root.
        format!("{trimmed}/")
    } else {
        trimmed.to_string()
    }
}

/// Walk from `start` to the filesystem root, deepest first.
pub fn ancestors(start: &Path) -> Ancestors {
    let normalized = normalize_slashes(start);
    Ancestors {
        next: (!normalized.is_empty()).then_some(normalized),
    }
}

/// Iterator returned by [`ancestors`]. Single pass.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<String>,
}

impl Iterator for Ancestors {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let current = self.next.take()?;
        self.next = parent_of(&current);
        Some(PathBuf::from(current))
    }
}

fn parent_of(dir: &str) -> Option<String> {
    if dir == "/" || dir.ends_with(":/") {
        return None;
    }
    match dir.rfind('/') {
        None => None,
        Some(0) => Some("/".to_string()),
        Some(idx) => {
            let parent = &dir[..idx];
            if parent.ends_with(':') {
                Some(format!("{parent}/"))
            } else {
                Some(parent.to_string())
            }
        }
    }
}
