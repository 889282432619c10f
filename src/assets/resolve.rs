//! URL to filesystem path resolution.
//!
//! # Responsibilities
//! - Percent-decode and lexically normalize the request path
//! - Reject anything that climbs above the asset root
//! - Confirm the canonical file still lives under the canonical root
//!
//! # Design Decisions
//! - Decoding happens before splitting, so `%2e%2e%2f` is caught like `../`
//! - Canonicalization catches symlinks that point outside the root
//! - Directories are not served; they fall through to rendering

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Outcome of looking up a request path under the asset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLookup {
    /// A regular file under the root.
    Found(ResolvedFile),
    /// Nothing servable; the router falls through to rendering.
    NotFound,
    /// The path tried to escape the root.
    Forbidden,
}

/// A file that is safe to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical filesystem path.
    pub path: PathBuf,
    /// Normalized URL path, always starting with `/`.
    pub url_path: String,
}

/// Why a request path could not be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    /// `..` above the root, NUL bytes or backslashes.
    Traversal,
    /// Percent-decoding did not yield UTF-8.
    Encoding,
}

/// Decode and normalize `url_path` into root-relative segments.
pub fn normalize(url_path: &str) -> Result<Vec<String>, PathRejection> {
    let decoded = percent_decode_str(url_path)
        .decode_utf8()
        .map_err(|_| PathRejection::Encoding)?;

    if decoded.contains('\0') || decoded.contains('\\') {
        return Err(PathRejection::Traversal);
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathRejection::Traversal);
                }
            }
            other => segments.push(other.to_string()),
        }
    }
    Ok(segments)
}

/// Resolve `url_path` against an already-canonical `root`.
pub async fn resolve(url_path: &str, root: &Path) -> AssetLookup {
    let segments = match normalize(url_path) {
        Ok(segments) => segments,
        Err(PathRejection::Traversal) => return AssetLookup::Forbidden,
        Err(PathRejection::Encoding) => return AssetLookup::NotFound,
    };
    if segments.is_empty() {
        return AssetLookup::NotFound;
    }

    let candidate: PathBuf = segments.iter().fold(root.to_path_buf(), |acc, s| acc.join(s));

    let canonical = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(_) => return AssetLookup::NotFound,
    };
    if !canonical.starts_with(root) {
        return AssetLookup::Forbidden;
    }

    match tokio::fs::metadata(&canonical).await {
        Ok(meta) if meta.is_file() => AssetLookup::Found(ResolvedFile {
            path: canonical,
            url_path: format!("/{}", segments.join("/")),
        }),
        _ => AssetLookup::NotFound,
    }
}
