//! On-disk resources a node may produce (spec §4, `Resource`).
//!
//! A resource is the engine's only notion of a node's durable output. Its identity for
//! dirtiness purposes is a coarse version token — a modification time, not a content hash.
//! Hashing content is an explicit spec Non-goal.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A coarse version token for a resource, used only to detect "did this change since last
/// time", never to inspect content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceHash(pub u128);

impl ResourceHash {
    /// Combines child hashes for a [`MultiResource`]. Wrapping, so the combination never panics
    /// on overflow; it only needs to change when any child changes, not to be order-sensitive.
    #[must_use]
    pub fn combine(hashes: impl IntoIterator<Item = Self>) -> Self {
        Self(hashes.into_iter().fold(0u128, |acc, h| acc.wrapping_add(h.0)))
    }
}

/// A node's durable output: something that outlives the process and can be checked for
/// existence, erased, and given a version token.
///
/// Implementors must not assume `exists`/`hash`/`erase` are called from any particular thread;
/// the engine itself is single-threaded (spec §5), but a resource may be shared across graphs in
/// the same process.
pub trait Resource: std::fmt::Debug {
    /// Whether the resource is currently present.
    fn exists(&self) -> bool;

    /// Removes the resource, if present. Called when a node transitions out of the
    /// clean-persisted state without a fresh evaluate (spec's erase-on-fail and `clear()`
    /// semantics).
    ///
    /// # Errors
    /// Returns an error if the underlying filesystem operation fails for a reason other than
    /// "already absent".
    fn erase(&self) -> std::io::Result<()>;

    /// A coarse version token, or `None` if the resource does not exist.
    ///
    /// # Errors
    /// Returns an error if the resource exists but its metadata cannot be read.
    fn hash(&self) -> std::io::Result<Option<ResourceHash>>;

    /// Whether `evaluate` is expected to overwrite this resource every run (as opposed to a
    /// resource that is only ever written once and then read-only). Mirrors
    /// `FSResource.rewritable` in the original implementation; used only for diagnostics today.
    fn rewritable(&self) -> bool {
        true
    }

    /// A human-readable identifier for logs and `viz-dag` output.
    fn describe(&self) -> String;
}

/// A resource backed by a single path on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsResource {
    path: PathBuf,
    rewritable: bool,
}

impl FsResource {
    /// Creates a resource bound to `path`. `path` need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rewritable: true,
        }
    }

    /// Marks the resource as write-once (see [`Resource::rewritable`]).
    #[must_use]
    pub fn write_once(mut self) -> Self {
        self.rewritable = false;
        self
    }

    /// The bound filesystem path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FsResource {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn erase(&self) -> std::io::Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&self.path),
            Ok(_) => fs::remove_file(&self.path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn hash(&self) -> std::io::Result<Option<ResourceHash>> {
        match fs::metadata(&self.path) {
            Ok(meta) => {
                let modified = meta.modified()?;
                let nanos = modified
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                Ok(Some(ResourceHash(nanos)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn rewritable(&self) -> bool {
        self.rewritable
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A resource made of several sub-resources, all of which must exist for the whole to count as
/// existing. Its hash combines every child's hash, so any child changing marks the whole dirty.
/// existing.
#[derive(Debug)]
pub struct MultiResource {
    children: Vec<Box<dyn Resource>>,
}

impl MultiResource {
    /// Builds a multi-resource from its children.
    #[must_use]
    pub fn new(children: Vec<Box<dyn Resource>>) -> Self {
        Self { children }
    }
}

impl Resource for MultiResource {
    fn exists(&self) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.exists())
    }

    fn erase(&self) -> std::io::Result<()> {
        for child in &self.children {
            child.erase()?;
        }
        Ok(())
    }

    fn hash(&self) -> std::io::Result<Option<ResourceHash>> {
        if !self.exists() {
            return Ok(None);
        }
        let mut hashes = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child.hash()? {
                Some(h) => hashes.push(h),
                None => return Ok(None),
            }
        }
        Ok(Some(ResourceHash::combine(hashes)))
    }

    fn rewritable(&self) -> bool {
        self.children.iter().any(Resource::rewritable)
    }

    fn describe(&self) -> String {
        format!(
            "multi({})",
            self.children
                .iter()
                .map(|c| c.describe())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// A node with no durable output. `exists` is always `false`, so such a node can never be
/// clean-persisted — only clean-cached for the lifetime of the process, or dirty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilResource;

impl Resource for NilResource {
    fn exists(&self) -> bool {
        false
    }

    fn erase(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn hash(&self) -> std::io::Result<Option<ResourceHash>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "<no resource>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_resource_reports_absence_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let resource = FsResource::new(dir.path().join("out.bin"));
        assert!(!resource.exists());
        assert_eq!(resource.hash().unwrap(), None);
    }

    #[test]
    fn fs_resource_hash_changes_after_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        fs::write(&path, b"v1").unwrap();
        let resource = FsResource::new(&path);
        let first = resource.hash().unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&path, b"v2").unwrap();
        let second = resource.hash().unwrap().unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn fs_resource_erase_removes_a_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_dir = dir.path().join("checkpoint");
        fs::create_dir(&checkpoint_dir).unwrap();
        fs::write(checkpoint_dir.join("weights.bin"), b"v1").unwrap();

        let resource = FsResource::new(&checkpoint_dir);
        assert!(resource.exists());
        resource.erase().unwrap();
        assert!(!checkpoint_dir.exists());
    }

    #[test]
    fn fs_resource_erase_on_missing_path_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let resource = FsResource::new(dir.path().join("never-written.bin"));
        resource.erase().unwrap();
    }

    #[test]
    fn multi_resource_requires_every_child_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"a").unwrap();
        let multi = MultiResource::new(vec![
            Box::new(FsResource::new(&a)),
            Box::new(FsResource::new(&b)),
        ]);
        assert!(!multi.exists());
        fs::write(&b, b"b").unwrap();
        assert!(multi.exists());
    }

    #[test]
    fn nil_resource_never_exists() {
        let resource = NilResource;
        assert!(!resource.exists());
        assert_eq!(resource.hash().unwrap(), None);
    }
}
