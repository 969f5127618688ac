//! Object paths and key helpers
//!
//! Keys are plain strings; the helpers here only deal with how keys map to
//! and from local filesystem paths.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// An object location inside a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
}

impl ObjectPath {
    /// Create a new ObjectPath
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.bucket)
        } else {
            write!(f, "{}/{}", self.bucket, self.key)
        }
    }
}

/// Derive an object key from the base name of a local file
pub fn key_from_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::InvalidKey(format!(
                "cannot derive a key from '{}': no file name",
                path.display()
            ))
        })
}

/// Join a key prefix and a relative key with exactly one separator
pub fn join_key(prefix: &str, relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    let relative = relative.trim_start_matches('/');
    let base = prefix.trim_end_matches('/');

    if base.is_empty() {
        relative.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

/// Map an object key onto a path under `target_dir`.
///
/// The key prefix becomes a subdirectory chain. Keys that could resolve
/// outside `target_dir` are rejected.
pub fn local_target(target_dir: &Path, key: &str) -> Result<PathBuf> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key cannot be empty".into()));
    }

    if key.ends_with('/') {
        return Err(Error::InvalidKey(format!(
            "'{key}' is a directory marker, not an object"
        )));
    }

    let mut target = target_dir.to_path_buf();
    for segment in key.split('/').filter(|s| !s.is_empty() && *s != ".") {
        match Path::new(segment).components().next() {
            Some(Component::Normal(_)) if Path::new(segment).components().count() == 1 => {
                target.push(segment)
            }
            _ => {
                return Err(Error::InvalidKey(format!(
                    "'{key}' would escape the target directory"
                )));
            }
        }
    }

    if target == target_dir {
        return Err(Error::InvalidKey(format!("'{key}' has no file component")));
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_display() {
        let path = ObjectPath::new("bucket", "key/file.txt");
        assert_eq!(path.to_string(), "bucket/key/file.txt");
        assert_eq!(ObjectPath::new("bucket", "").to_string(), "bucket");
    }

    #[test]
    fn test_key_from_file_name() {
        assert_eq!(key_from_file_name(Path::new("a/b.jpg")).unwrap(), "b.jpg");
        assert_eq!(key_from_file_name(Path::new("b.jpg")).unwrap(), "b.jpg");
        assert!(key_from_file_name(Path::new("..")).is_err());
        assert!(key_from_file_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("", "a.txt"), "a.txt");
        assert_eq!(join_key("photos", "a.txt"), "photos/a.txt");
        assert_eq!(join_key("photos/", "a.txt"), "photos/a.txt");
        assert_eq!(join_key("photos", "2024\\a.txt"), "photos/2024/a.txt");
        assert_eq!(join_key("photos/", "/a.txt"), "photos/a.txt");
    }

    #[test]
    fn test_local_target_preserves_prefix() {
        let target = local_target(Path::new("out"), "prefix/file.jpg").unwrap();
        assert_eq!(target, Path::new("out").join("prefix").join("file.jpg"));

        let target = local_target(Path::new("out"), "file.jpg").unwrap();
        assert_eq!(target, Path::new("out").join("file.jpg"));
    }

    #[test]
    fn test_local_target_rejects_bad_keys() {
        assert!(local_target(Path::new("out"), "").is_err());
        assert!(local_target(Path::new("out"), "dir/").is_err());
        assert!(local_target(Path::new("out"), "../etc/passwd").is_err());
        assert!(local_target(Path::new("out"), "a/../../b").is_err());
        assert!(local_target(Path::new("out"), "./").is_err());
    }

    #[test]
    fn test_local_target_collapses_empty_segments() {
        let target = local_target(Path::new("out"), "/a//b.txt").unwrap();
        assert_eq!(target, Path::new("out").join("a").join("b.txt"));
    }
}
