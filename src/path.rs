//! Relative storage paths
//!
//! Both backends address content by forward-separated paths relative to a
//! root. This module owns their normalization so `"/logs//a.md"`,
//! `"logs/./a.md"` and `"logs/a.md"` all name the same object.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};

/// A normalized path relative to a storage root (empty = the root itself)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// Normalize `raw`, rejecting `..` segments
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let unified = raw.replace('\\', "/");
        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(StorageError::InvalidPath(raw.to_string())),
                s => segments.push(s),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// The root itself
    pub fn root() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Split into (parent folder, final name); the root has no name
    pub fn split_parent(&self) -> (RelativePath, Option<&str>) {
        match self.0.rsplit_once('/') {
            Some((parent, name)) => (Self(parent.to_string()), Some(name)),
            None if self.is_root() => (Self::root(), None),
            None => (Self::root(), Some(self.0.as_str())),
        }
    }

    /// Append a child name (itself normalized)
    pub fn join(&self, child: &str) -> StorageResult<RelativePath> {
        let child = Self::parse(child)?;
        if self.is_root() {
            Ok(child)
        } else if child.is_root() {
            Ok(self.clone())
        } else {
            Ok(Self(format!("{}/{}", self.0, child.0)))
        }
    }

    /// Resolve against a filesystem root
    pub fn to_native(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let a = RelativePath::parse("/logs//2026/./a.md/").unwrap();
        let b = RelativePath::parse("logs/2026/a.md").unwrap();
        let c = RelativePath::parse("logs\\2026\\a.md").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "logs/2026/a.md");
    }

    #[test]
    fn test_root() {
        assert!(RelativePath::parse("").unwrap().is_root());
        assert!(RelativePath::parse("/./").unwrap().is_root());
        assert_eq!(RelativePath::root().split_parent(), (RelativePath::root(), None));
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(matches!(
            RelativePath::parse("logs/../../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_split_parent() {
        let path = RelativePath::parse("a/b/c.md").unwrap();
        let (parent, name) = path.split_parent();
        assert_eq!(parent.as_str(), "a/b");
        assert_eq!(name, Some("c.md"));

        let top = RelativePath::parse("c.md").unwrap();
        let (parent, name) = top.split_parent();
        assert!(parent.is_root());
        assert_eq!(name, Some("c.md"));
    }

    #[test]
    fn test_join() {
        let dir = RelativePath::parse("logs").unwrap();
        assert_eq!(dir.join("a.md").unwrap().as_str(), "logs/a.md");
        assert_eq!(RelativePath::root().join("a.md").unwrap().as_str(), "a.md");
        assert!(dir.join("../x").is_err());
    }

    #[test]
    fn test_to_native() {
        let path = RelativePath::parse("logs/a.md").unwrap();
        assert_eq!(
            path.to_native(Path::new("/srv/share")),
            PathBuf::from("/srv/share/logs/a.md")
        );
        assert_eq!(RelativePath::root().to_native(Path::new("/srv")), PathBuf::from("/srv"));
    }
}
