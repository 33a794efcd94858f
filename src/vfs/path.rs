//! Path normalization and key derivation. Purely local, no store I/O.
//!
//! A path is a `/`-separated sequence of non-empty segments relative to
//! the configured root prefix; the empty path is the filesystem root.
//! `""`, `"."` and `"/"` all normalize to the root. A file maps to the key
//! `prefix/path`, a directory to the marker key `prefix/path/`.

use crate::error::{FsError, Result};

const DELIMITER: char = '/';

/// Derives store keys for filesystem paths under a fixed root prefix.
#[derive(Debug, Clone)]
pub struct PathResolver {
    prefix: String,
}

/// A validated, normalized path together with its derived store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    rel: String,
    blob_key: String,
    marker_key: String,
}

impl Resolved {
    /// Normalized path relative to the root; empty for the root itself.
    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// Store key of the file at this path.
    pub fn blob_key(&self) -> &str {
        &self.blob_key
    }

    /// Store key of the directory marker for this path.
    pub fn marker_key(&self) -> &str {
        &self.marker_key
    }

    pub fn is_root(&self) -> bool {
        self.rel.is_empty()
    }

    /// Final segment; empty for the root.
    pub fn name(&self) -> &str {
        match self.rel.rfind(DELIMITER) {
            Some(i) => &self.rel[i + 1..],
            None => &self.rel,
        }
    }

    /// Parent path, or `None` for the root. Top-level entries return `""`.
    pub fn parent_rel(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(match self.rel.rfind(DELIMITER) {
            Some(i) => &self.rel[..i],
            None => "",
        })
    }
}

/// Proper ancestors of a normalized path, shallowest first, excluding the
/// root and the path itself: `a/b/c` yields `a`, then `a/b`.
pub fn ancestors(rel: &str) -> impl Iterator<Item = &str> {
    rel.match_indices(DELIMITER).map(move |(i, _)| &rel[..i])
}

impl PathResolver {
    pub fn new(root_path: &str) -> Result<Self> {
        let prefix = normalize(root_path)?;
        Ok(Self { prefix })
    }

    /// Normalized root prefix without trailing delimiter; empty when the
    /// filesystem is rooted at the bucket itself.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        let rel = normalize(path)?;
        let blob_key = self.blob_key(&rel);
        let marker_key = format!("{blob_key}{DELIMITER}");
        Ok(Resolved {
            rel,
            blob_key,
            marker_key,
        })
    }

    /// Blob key for an already-normalized relative path.
    pub fn blob_key(&self, rel: &str) -> String {
        if self.prefix.is_empty() {
            rel.to_string()
        } else if rel.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}{DELIMITER}{rel}", self.prefix)
        }
    }

    /// Marker key for an already-normalized relative path.
    pub fn marker_key(&self, rel: &str) -> String {
        format!("{}{DELIMITER}", self.blob_key(rel))
    }

    /// Strips the root prefix from a store key, yielding the relative path
    /// (markers keep their trailing delimiter). `None` if the key is
    /// outside the root.
    pub fn strip_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(key);
        }
        key.strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix(DELIMITER))
    }
}

fn normalize(path: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(DELIMITER) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(FsError::InvalidPath(format!(
                    "'{path}' contains a '..' segment"
                )));
            }
            s if s.chars().any(|c| c.is_control()) => {
                return Err(FsError::InvalidPath(format!(
                    "'{}' contains control characters",
                    path.escape_debug()
                )));
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_keys() {
        // (path, root_path, expected blob key)
        let cases = [
            ("", "", ""),
            (".", "", ""),
            ("/", "", ""),
            ("foo", "", "foo"),
            ("/foo", "", "foo"),
            ("./foo", "", "foo"),
            ("foo/", "", "foo"),
            ("/foo/", "", "foo"),
            ("foo/bar", "", "foo/bar"),
            ("/foo//bar/", "", "foo/bar"),
            ("", "root_path", "root_path"),
            ("./", "root_path", "root_path"),
            ("foo", "root_path", "root_path/foo"),
            ("./foo", "root_path", "root_path/foo"),
            ("foo/bar", "root/sub", "root/sub/foo/bar"),
        ];
        for (path, root, expected) in cases {
            let resolver = PathResolver::new(root).unwrap();
            let resolved = resolver.resolve(path).unwrap();
            assert_eq!(resolved.blob_key(), expected, "path={path:?} root={root:?}");
            assert_eq!(resolved.marker_key(), format!("{expected}/"));
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let resolver = PathResolver::new("base").unwrap();
        for path in ["", "/", "a", "/a/b/", "a//b/./c"] {
            let once = resolver.resolve(path).unwrap();
            let twice = resolver.resolve(once.rel()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_parent_references_and_control_chars() {
        let resolver = PathResolver::new("").unwrap();
        assert!(matches!(
            resolver.resolve(".."),
            Err(FsError::InvalidPath(_))
        ));
        assert!(matches!(
            resolver.resolve("foo/../bar"),
            Err(FsError::InvalidPath(_))
        ));
        assert!(matches!(
            resolver.resolve("foo/ba\0r"),
            Err(FsError::InvalidPath(_))
        ));
        assert!(matches!(
            PathResolver::new("root/.."),
            Err(FsError::InvalidPath(_))
        ));
    }

    #[test]
    fn root_and_parents() {
        let resolver = PathResolver::new("").unwrap();
        let root = resolver.resolve("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.parent_rel(), None);
        assert_eq!(root.name(), "");

        let nested = resolver.resolve("a/b/c").unwrap();
        assert_eq!(nested.parent_rel(), Some("a/b"));
        assert_eq!(nested.name(), "c");
        let ancs: Vec<_> = ancestors(nested.rel()).collect();
        assert_eq!(ancs, vec!["a", "a/b"]);
        assert_eq!(ancestors("top").count(), 0);
    }

    #[test]
    fn strips_keys_back_to_relative_paths() {
        let resolver = PathResolver::new("base").unwrap();
        assert_eq!(resolver.strip_key("base/a/b"), Some("a/b"));
        assert_eq!(resolver.strip_key("base/a/"), Some("a/"));
        assert_eq!(resolver.strip_key("other/a"), None);

        let rootless = PathResolver::new("/").unwrap();
        assert_eq!(rootless.prefix(), "");
        assert_eq!(rootless.strip_key("a/b"), Some("a/b"));
    }
}
