//! Path normalization.
//!
//! Engines address entries by a canonical absolute form: rooted at `/`, no
//! `.` or `..` segments, no repeated or trailing separators. Cleaning is
//! purely lexical and never looks at the tree. There is no working
//! directory, so `tmp` and `/tmp` name the same entry, and `..` at the root
//! stays at the root.

use std::path::Path;

/// The root in normalized form.
pub const ROOT: &str = "/";

/// Canonicalize `path` into the engine's absolute form.
pub fn normalize(path: &Path) -> String {
    normalize_str(&path.to_string_lossy())
}

/// [`normalize`] for string input.
pub fn normalize_str(path: &str) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            name => resolved.push(name),
        }
    }
    if resolved.is_empty() {
        ROOT.to_string()
    } else {
        let mut out = String::with_capacity(path.len() + 1);
        for part in resolved {
            out.push('/');
            out.push_str(part);
        }
        out
    }
}

/// Lexically clean a host-side path without rooting it.
///
/// Absolute input comes out as [`normalize_str`] would produce it. Relative
/// input stays relative; leading `..` segments are kept because there is
/// nothing to cancel them against, and an empty result is `.`.
pub fn clean(path: &str) -> String {
    if path.starts_with('/') {
        return normalize_str(path);
    }
    let mut resolved: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." if resolved.last().is_some_and(|last| *last != "..") => {
                resolved.pop();
            }
            name => resolved.push(name),
        }
    }
    if resolved.is_empty() {
        ".".to_string()
    } else {
        resolved.join("/")
    }
}

/// Segments of a normalized path; empty for the root.
pub fn components(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split('/').filter(|part| !part.is_empty())
}

/// Split a normalized path into parent and leaf name.
///
/// Returns `None` for the root, which has no parent.
pub fn split(normalized: &str) -> Option<(&str, &str)> {
    if normalized == ROOT {
        return None;
    }
    match normalized.rfind('/') {
        Some(0) => Some((ROOT, &normalized[1..])),
        Some(pos) => Some((&normalized[..pos], &normalized[pos + 1..])),
        None => Some((ROOT, normalized)),
    }
}

/// Join a normalized directory path and a leaf name.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Whether `path` is `ancestor` itself or lies beneath it (both normalized).
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Re-root `path` from under `from` to under `to` (all normalized).
///
/// `path` must satisfy [`is_within`]`(path, from)`.
pub fn rebase(path: &str, from: &str, to: &str) -> String {
    let rest = if from == ROOT {
        path
    } else {
        &path[from.len()..]
    };
    if rest.is_empty() || rest == ROOT {
        to.to_string()
    } else if to == ROOT {
        rest.to_string()
    } else {
        format!("{}{}", to, rest)
    }
}
