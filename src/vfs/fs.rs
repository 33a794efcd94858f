//! Path-level filesystem operations over an object backend.
//!
//! Directories are witnessed by zero-byte marker objects whose key ends in
//! `/`; the filesystem root is never marked. Every operation recomputes
//! existence from live store state, so a shared `BucketFs` needs no
//! locking. Composite operations are sequences of idempotent store calls;
//! a crash mid-sequence leaves at worst a missing ancestor marker, which
//! `fix_storage` restores.

use std::collections::BTreeSet;
use std::time::SystemTime;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::{FsError, Result};
use crate::store::client::ObjectBackend;
use crate::vfs::path::{self, PathResolver, Resolved};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub content_type: Option<String>,
}

impl FileInfo {
    fn directory(name: String) -> Self {
        Self {
            name,
            kind: EntryKind::Directory,
            size: 0,
            last_modified: None,
            content_type: None,
        }
    }
}

/// Construction-time configuration.
#[derive(Debug, Clone, Default)]
pub struct FsConfig {
    /// Sub-prefix the filesystem is rooted at; empty for the whole bucket.
    pub root_path: String,
    /// Create an absent `root_path` instead of failing with `CreateFailed`.
    pub create: bool,
}

/// A filesystem view over a flat object store.
pub struct BucketFs<B: ObjectBackend> {
    pub(crate) backend: B,
    pub(crate) resolver: PathResolver,
}

pub type S3Fs = BucketFs<crate::store::s3::S3Backend>;
pub type MemoryFs = BucketFs<crate::store::memory::MemoryBackend>;

impl<B: ObjectBackend> BucketFs<B> {
    /// Binds the filesystem to `backend`, validating (or creating) the
    /// configured root. A bucket-rooted filesystem always exists.
    pub async fn open(backend: B, config: FsConfig) -> Result<Self> {
        let resolver = PathResolver::new(&config.root_path)?;
        let fs = Self { backend, resolver };
        if !fs.resolver.prefix().is_empty() {
            let root = fs.resolver.resolve("")?;
            if fs.backend.head_object(root.blob_key()).await?.is_some() {
                return Err(FsError::DirectoryExpected(config.root_path.clone()));
            }
            let exists = fs.backend.head_object(root.marker_key()).await?.is_some()
                || fs.prefix_occupied(root.marker_key()).await?;
            if !exists {
                if config.create {
                    fs.backend.put_object(root.marker_key(), b"", None).await?;
                } else {
                    return Err(FsError::CreateFailed(config.root_path.clone()));
                }
            }
        }
        Ok(fs)
    }

    // ---- existence ----

    pub async fn kind(&self, path: &str) -> Result<EntryKind> {
        let resolved = self.resolver.resolve(path)?;
        self.kind_of(&resolved).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.kind(path).await? != EntryKind::Missing)
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.kind(path).await? == EntryKind::Directory)
    }

    pub async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(self.kind(path).await? == EntryKind::File)
    }

    pub(crate) async fn kind_of(&self, resolved: &Resolved) -> Result<EntryKind> {
        if resolved.is_root() {
            return Ok(EntryKind::Directory);
        }
        if self.backend.head_object(resolved.blob_key()).await?.is_some() {
            return Ok(EntryKind::File);
        }
        if self.backend.head_object(resolved.marker_key()).await?.is_some() {
            return Ok(EntryKind::Directory);
        }
        // Implicit directory: descendants exist but the marker is missing,
        // e.g. keys written by another tool.
        if self.prefix_occupied(resolved.marker_key()).await? {
            return Ok(EntryKind::Directory);
        }
        Ok(EntryKind::Missing)
    }

    async fn prefix_occupied(&self, prefix: &str) -> Result<bool> {
        let page = self.backend.list_page(prefix, None, None, Some(1)).await?;
        Ok(!page.keys.is_empty() || !page.common_prefixes.is_empty())
    }

    // ---- listing ----

    /// Immediate children of a directory, sub-directories first, each
    /// group in name order.
    pub async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let resolved = self.resolver.resolve(path)?;
        self.expect_dir(&resolved, path).await?;
        let prefix = self.list_prefix(&resolved);

        let mut dirs = BTreeSet::new();
        let mut files = BTreeSet::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(&prefix, Some("/"), token.as_deref(), None)
                .await?;
            for common in &page.common_prefixes {
                let name = common[prefix.len()..].trim_end_matches('/');
                if !name.is_empty() {
                    dirs.insert(name.to_string());
                }
            }
            for meta in &page.keys {
                // The directory's own marker is not a child.
                if meta.key == prefix {
                    continue;
                }
                let name = &meta.key[prefix.len()..];
                if !name.is_empty() {
                    files.insert(name.to_string());
                }
            }
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        // A blob shadows a marker of the same name, matching `kind`.
        for name in &files {
            dirs.remove(name);
        }

        let mut entries: Vec<DirEntry> = dirs
            .into_iter()
            .map(|name| DirEntry {
                name,
                kind: EntryKind::Directory,
            })
            .collect();
        entries.extend(files.into_iter().map(|name| DirEntry {
            name,
            kind: EntryKind::File,
        }));
        Ok(entries)
    }

    /// Listing prefix for a directory; the bucket-rooted filesystem root
    /// lists with no prefix at all.
    pub(crate) fn list_prefix(&self, resolved: &Resolved) -> String {
        if resolved.is_root() && self.resolver.prefix().is_empty() {
            String::new()
        } else {
            resolved.marker_key().to_string()
        }
    }

    async fn expect_dir(&self, resolved: &Resolved, path: &str) -> Result<()> {
        match self.kind_of(resolved).await? {
            EntryKind::Directory => Ok(()),
            EntryKind::File => Err(FsError::DirectoryExpected(path.to_string())),
            EntryKind::Missing => Err(FsError::ResourceNotFound(path.to_string())),
        }
    }

    async fn dir_is_empty(&self, prefix: &str) -> Result<bool> {
        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(prefix, Some("/"), token.as_deref(), Some(2))
                .await?;
            if !page.common_prefixes.is_empty() {
                return Ok(false);
            }
            if page.keys.iter().any(|m| m.key != prefix) {
                return Ok(false);
            }
            token = page.next_token;
            if token.is_none() {
                return Ok(true);
            }
        }
    }

    // ---- markers ----

    /// Writes the zero-byte marker unless one already exists. Never
    /// overwrites, so foreign markers with custom content survive.
    /// Returns whether a marker was written.
    pub(crate) async fn ensure_marker_key(&self, marker_key: &str) -> Result<bool> {
        if self.backend.head_object(marker_key).await?.is_some() {
            return Ok(false);
        }
        self.backend.put_object(marker_key, b"", None).await?;
        debug!(key = marker_key, "created directory marker");
        Ok(true)
    }

    /// Ensures a marker for every ancestor of `resolved`, root-to-leaf, so
    /// the marker invariant holds the moment a descendant appears. Fails
    /// with `DirectoryExpected` when an ancestor is an existing file.
    pub(crate) async fn ensure_ancestor_markers(&self, resolved: &Resolved) -> Result<()> {
        for ancestor in path::ancestors(resolved.rel()) {
            if self
                .backend
                .head_object(&self.resolver.blob_key(ancestor))
                .await?
                .is_some()
            {
                return Err(FsError::DirectoryExpected(ancestor.to_string()));
            }
            self.ensure_marker_key(&self.resolver.marker_key(ancestor))
                .await?;
        }
        Ok(())
    }

    // ---- reads ----

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return Err(FsError::FileExpected(path.to_string()));
        }
        if let Some(data) = self.backend.get_object(resolved.blob_key()).await? {
            return Ok(data);
        }
        match self.kind_of(&resolved).await? {
            EntryKind::Directory => Err(FsError::FileExpected(path.to_string())),
            _ => Err(FsError::ResourceNotFound(path.to_string())),
        }
    }

    pub async fn stat(&self, path: &str) -> Result<FileInfo> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return Ok(FileInfo::directory(String::new()));
        }
        if let Some(meta) = self.backend.head_object(resolved.blob_key()).await? {
            return Ok(FileInfo {
                name: resolved.name().to_string(),
                kind: EntryKind::File,
                size: meta.size,
                last_modified: meta.last_modified,
                content_type: meta.content_type,
            });
        }
        if self.backend.head_object(resolved.marker_key()).await?.is_some()
            || self.prefix_occupied(resolved.marker_key()).await?
        {
            return Ok(FileInfo::directory(resolved.name().to_string()));
        }
        Err(FsError::ResourceNotFound(path.to_string()))
    }

    // ---- mutations ----

    /// Creates or overwrites the file at `path`. With `create_parents`,
    /// missing ancestor markers are written first; otherwise the parent
    /// must already be a directory.
    pub async fn write_file(&self, path: &str, data: &[u8], create_parents: bool) -> Result<()> {
        self.write_file_with_type(path, data, None, create_parents)
            .await
    }

    pub async fn write_file_with_type(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        create_parents: bool,
    ) -> Result<()> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return Err(FsError::FileExpected(path.to_string()));
        }
        if create_parents {
            self.ensure_ancestor_markers(&resolved).await?;
        } else {
            let parent = self.resolver.resolve(resolved.parent_rel().unwrap_or(""))?;
            if self.kind_of(&parent).await? != EntryKind::Directory {
                return Err(FsError::ResourceNotFound(path.to_string()));
            }
        }
        if self.kind_of(&resolved).await? == EntryKind::Directory {
            return Err(FsError::FileExpected(path.to_string()));
        }
        self.backend
            .put_object(resolved.blob_key(), data, content_type)
            .await?;
        Ok(())
    }

    /// Creates a single directory. The parent must already exist. With
    /// `exist_ok`, an existing directory at `path` is not an error.
    pub async fn make_dir(&self, path: &str, exist_ok: bool) -> Result<()> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return if exist_ok {
                Ok(())
            } else {
                Err(FsError::DirectoryExists(path.to_string()))
            };
        }
        let parent = self.resolver.resolve(resolved.parent_rel().unwrap_or(""))?;
        match self.kind_of(&parent).await? {
            EntryKind::Directory => {}
            EntryKind::File => {
                return Err(FsError::DirectoryExpected(parent.rel().to_string()));
            }
            EntryKind::Missing => return Err(FsError::ResourceNotFound(path.to_string())),
        }
        match self.kind_of(&resolved).await? {
            EntryKind::File => Err(FsError::FileExists(path.to_string())),
            EntryKind::Directory => {
                if exist_ok {
                    Ok(())
                } else {
                    Err(FsError::DirectoryExists(path.to_string()))
                }
            }
            EntryKind::Missing => {
                self.backend
                    .put_object(resolved.marker_key(), b"", None)
                    .await?;
                Ok(())
            }
        }
    }

    /// Creates a directory and any missing ancestors. Idempotent; an
    /// implicit directory at `path` gains an explicit marker.
    pub async fn make_dir_all(&self, path: &str) -> Result<()> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return Ok(());
        }
        self.ensure_ancestor_markers(&resolved).await?;
        if self.kind_of(&resolved).await? == EntryKind::File {
            return Err(FsError::FileExists(path.to_string()));
        }
        self.ensure_marker_key(resolved.marker_key()).await?;
        Ok(())
    }

    pub async fn remove_file(&self, path: &str) -> Result<()> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return Err(FsError::FileExpected(path.to_string()));
        }
        match self.kind_of(&resolved).await? {
            EntryKind::Missing => Err(FsError::ResourceNotFound(path.to_string())),
            EntryKind::Directory => Err(FsError::FileExpected(path.to_string())),
            EntryKind::File => {
                if !self.backend.delete_object(resolved.blob_key()).await? {
                    return Err(FsError::ResourceNotFound(path.to_string()));
                }
                Ok(())
            }
        }
    }

    /// Removes an empty directory. The parent keeps its marker even when
    /// this was its last child; explicitly created directories are sticky.
    pub async fn remove_dir(&self, path: &str) -> Result<()> {
        let resolved = self.resolver.resolve(path)?;
        if resolved.is_root() {
            return Err(FsError::InvalidPath(
                "cannot remove the filesystem root".to_string(),
            ));
        }
        match self.kind_of(&resolved).await? {
            EntryKind::Missing => return Err(FsError::ResourceNotFound(path.to_string())),
            EntryKind::File => return Err(FsError::DirectoryExpected(path.to_string())),
            EntryKind::Directory => {}
        }
        if !self.dir_is_empty(resolved.marker_key()).await? {
            return Err(FsError::DirectoryNotEmpty(path.to_string()));
        }
        self.backend.delete_object(resolved.marker_key()).await?;
        Ok(())
    }

    /// Removes a directory and everything beneath it. Safe to re-run after
    /// a partial failure: already-deleted keys are skipped. Removing the
    /// root empties the filesystem but keeps the root itself.
    pub async fn remove_tree(&self, path: &str) -> Result<()> {
        let resolved = self.resolver.resolve(path)?;
        match self.kind_of(&resolved).await? {
            EntryKind::Missing => return Err(FsError::ResourceNotFound(path.to_string())),
            EntryKind::File => return Err(FsError::DirectoryExpected(path.to_string())),
            EntryKind::Directory => {}
        }
        let keep_root_marker = resolved.is_root() && !self.resolver.prefix().is_empty();
        let prefix = self.list_prefix(&resolved);

        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(&prefix, None, token.as_deref(), None)
                .await?;
            let targets: Vec<String> = page
                .keys
                .into_iter()
                .map(|m| m.key)
                .filter(|k| !(keep_root_marker && k == resolved.marker_key()))
                .collect();
            let deleted = !targets.is_empty();
            try_join_all(targets.iter().map(|k| self.backend.delete_object(k))).await?;
            match page.next_token {
                None => break,
                // Everything listed so far is gone; restart from the top
                // unless this page had nothing left to delete.
                Some(t) => token = if deleted { None } else { Some(t) },
            }
        }
        debug!(path, "removed tree");
        Ok(())
    }

    /// Copies a file or a directory tree. Directory copies enumerate the
    /// source descendants flat and re-create them under the destination,
    /// markers included.
    pub async fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let src_resolved = self.resolver.resolve(src)?;
        let dst_resolved = self.resolver.resolve(dst)?;
        if dst_resolved.is_root() {
            return Err(FsError::DestinationExists(dst.to_string()));
        }
        let src_kind = self.kind_of(&src_resolved).await?;
        if src_kind == EntryKind::Missing {
            return Err(FsError::ResourceNotFound(src.to_string()));
        }
        let dst_kind = self.kind_of(&dst_resolved).await?;
        if !overwrite && dst_kind != EntryKind::Missing {
            return Err(FsError::DestinationExists(dst.to_string()));
        }

        if src_kind == EntryKind::File {
            let parent = self
                .resolver
                .resolve(dst_resolved.parent_rel().unwrap_or(""))?;
            if self.kind_of(&parent).await? != EntryKind::Directory {
                return Err(FsError::ResourceNotFound(dst.to_string()));
            }
            if dst_kind == EntryKind::Directory {
                return Err(FsError::FileExpected(dst.to_string()));
            }
            self.backend
                .copy_object(src_resolved.blob_key(), dst_resolved.blob_key())
                .await?;
            return Ok(());
        }

        // Directory copy. Every destination is inside the root, so the
        // root itself can never be a source.
        if src_resolved.is_root() {
            return Err(FsError::InvalidPath(
                "cannot copy the filesystem root".to_string(),
            ));
        }
        if dst_resolved.rel() == src_resolved.rel()
            || dst_resolved
                .rel()
                .starts_with(&format!("{}/", src_resolved.rel()))
        {
            return Err(FsError::InvalidPath(format!(
                "destination '{dst}' is inside source '{src}'"
            )));
        }
        if dst_kind == EntryKind::File {
            return Err(FsError::DestinationExists(dst.to_string()));
        }
        self.ensure_ancestor_markers(&dst_resolved).await?;

        let src_prefix = self.list_prefix(&src_resolved);
        let dst_prefix = dst_resolved.marker_key().to_string();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(&src_prefix, None, token.as_deref(), None)
                .await?;
            try_join_all(page.keys.iter().map(|m| {
                let translated = format!("{dst_prefix}{}", &m.key[src_prefix.len()..]);
                async move {
                    self.backend.copy_object(&m.key, &translated).await
                }
            }))
            .await?;
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        // An implicit source directory has no marker key to copy.
        self.ensure_marker_key(&dst_prefix).await?;
        Ok(())
    }

    /// Moves a file or directory: copy to `dst`, then remove `src`.
    /// Not atomic; a failure in between leaves both copies.
    pub async fn rename(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let src_resolved = self.resolver.resolve(src)?;
        if src_resolved.is_root() {
            return Err(FsError::InvalidPath(
                "cannot move the filesystem root".to_string(),
            ));
        }
        // A move onto the same path must not reach the delete below.
        if self.resolver.resolve(dst)?.rel() == src_resolved.rel() {
            return match self.kind_of(&src_resolved).await? {
                EntryKind::Missing => Err(FsError::ResourceNotFound(src.to_string())),
                _ if !overwrite => Err(FsError::DestinationExists(dst.to_string())),
                _ => Ok(()),
            };
        }
        self.copy(src, dst, overwrite).await?;
        match self.kind_of(&src_resolved).await? {
            EntryKind::File => {
                self.backend.delete_object(src_resolved.blob_key()).await?;
                Ok(())
            }
            EntryKind::Directory => self.remove_tree(src).await,
            EntryKind::Missing => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;

    async fn bucket_fs() -> (MemoryBackend, MemoryFs) {
        let backend = MemoryBackend::new();
        let fs = BucketFs::open(backend.clone(), FsConfig::default())
            .await
            .unwrap();
        (backend, fs)
    }

    #[tokio::test]
    async fn root_is_always_a_directory() {
        let (backend, fs) = bucket_fs().await;
        for root in ["", ".", "/"] {
            assert_eq!(fs.kind(root).await.unwrap(), EntryKind::Directory);
            assert!(fs.is_dir(root).await.unwrap());
            assert!(fs.exists(root).await.unwrap());
        }
        // The bucket root is never represented by a marker object.
        assert_eq!(backend.object_count(), 0);
    }

    #[tokio::test]
    async fn write_read_and_stat_files() {
        let (_, fs) = bucket_fs().await;
        fs.write_file_with_type("notes.txt", b"first", Some("text/plain"), false)
            .await
            .unwrap();
        assert!(fs.is_file("notes.txt").await.unwrap());
        assert_eq!(fs.read_file("notes.txt").await.unwrap(), b"first");
        assert_eq!(
            fs.stat("notes.txt").await.unwrap().content_type.as_deref(),
            Some("text/plain")
        );

        fs.write_file("notes.txt", b"second version", false)
            .await
            .unwrap();
        assert_eq!(fs.read_file("notes.txt").await.unwrap(), b"second version");

        let info = fs.stat("notes.txt").await.unwrap();
        assert_eq!(info.name, "notes.txt");
        assert_eq!(info.kind, EntryKind::File);
        assert_eq!(info.size, 14);
        assert!(info.last_modified.is_some());

        assert!(matches!(
            fs.read_file("absent").await,
            Err(FsError::ResourceNotFound(_))
        ));
        assert!(matches!(
            fs.stat("absent").await,
            Err(FsError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn write_file_requires_parent_unless_created() {
        let (backend, fs) = bucket_fs().await;
        assert!(matches!(
            fs.write_file("a/b/c.txt", b"x", false).await,
            Err(FsError::ResourceNotFound(_))
        ));

        fs.write_file("a/b/c.txt", b"x", true).await.unwrap();
        assert!(fs.is_file("a/b/c.txt").await.unwrap());
        assert!(fs.is_dir("a").await.unwrap());
        assert!(fs.is_dir("a/b").await.unwrap());
        // Ancestor markers were written eagerly, not left implicit.
        assert_eq!(backend.keys(), vec!["a/", "a/b/", "a/b/c.txt"]);
    }

    #[tokio::test]
    async fn writing_over_a_directory_fails() {
        let (_, fs) = bucket_fs().await;
        fs.make_dir("d", false).await.unwrap();
        assert!(matches!(
            fs.write_file("d", b"x", false).await,
            Err(FsError::FileExpected(_))
        ));
        assert!(matches!(
            fs.write_file("/", b"x", false).await,
            Err(FsError::FileExpected(_))
        ));
        assert!(matches!(
            fs.read_file("d").await,
            Err(FsError::FileExpected(_))
        ));
    }

    #[tokio::test]
    async fn implicit_directories_resolve_via_prefix_fallback() {
        let backend = MemoryBackend::new();
        backend.put_object("a/b/c.txt", b"data", None).await.unwrap();
        let fs = BucketFs::open(backend.clone(), FsConfig::default())
            .await
            .unwrap();

        assert!(fs.is_dir("a").await.unwrap());
        assert!(fs.is_dir("a/b").await.unwrap());
        assert_eq!(fs.kind("a/b/c.txt").await.unwrap(), EntryKind::File);
        assert_eq!(fs.kind("a/x").await.unwrap(), EntryKind::Missing);

        let entries = fs.read_dir("a").await.unwrap();
        assert_eq!(
            entries,
            vec![DirEntry {
                name: "b".to_string(),
                kind: EntryKind::Directory,
            }]
        );
        assert_eq!(fs.stat("a").await.unwrap().kind, EntryKind::Directory);
    }

    #[tokio::test]
    async fn make_dir_validates_parent_and_collisions() {
        let (_, fs) = bucket_fs().await;
        // Parent of a top-level entry is the root, which always exists.
        fs.make_dir("x", false).await.unwrap();
        assert!(matches!(
            fs.make_dir("x/y/z", false).await,
            Err(FsError::ResourceNotFound(_))
        ));
        assert!(matches!(
            fs.make_dir("x", false).await,
            Err(FsError::DirectoryExists(_))
        ));
        fs.make_dir("x", true).await.unwrap();

        fs.write_file("f", b"file", false).await.unwrap();
        assert!(matches!(
            fs.make_dir("f", false).await,
            Err(FsError::FileExists(_))
        ));
        assert!(matches!(
            fs.make_dir("f/sub", false).await,
            Err(FsError::DirectoryExpected(_))
        ));

        // make_dir on the root writes nothing.
        assert!(matches!(
            fs.make_dir("", false).await,
            Err(FsError::DirectoryExists(_))
        ));
        fs.make_dir("", true).await.unwrap();
    }

    #[tokio::test]
    async fn make_dir_all_creates_every_ancestor() {
        let (_, fs) = bucket_fs().await;
        fs.make_dir_all("d1/d2/d3").await.unwrap();
        for dir in ["d1", "d1/d2", "d1/d2/d3"] {
            assert!(fs.is_dir(dir).await.unwrap(), "{dir} should be a directory");
        }
        fs.make_dir_all("d1/d2/d3").await.unwrap();
        fs.make_dir_all("").await.unwrap();

        fs.write_file("d1/file", b"x", false).await.unwrap();
        assert!(matches!(
            fs.make_dir_all("d1/file").await,
            Err(FsError::FileExists(_))
        ));
        assert!(matches!(
            fs.make_dir_all("d1/file/deeper").await,
            Err(FsError::DirectoryExpected(_))
        ));
    }

    #[tokio::test]
    async fn read_dir_lists_immediate_children() {
        let (_, fs) = bucket_fs().await;
        fs.make_dir_all("top/sub").await.unwrap();
        fs.write_file("top/f1", b"1", false).await.unwrap();
        fs.write_file("top/f2", b"2", false).await.unwrap();
        fs.write_file("top/sub/deep", b"3", false).await.unwrap();

        let entries = fs.read_dir("top").await.unwrap();
        let names: Vec<(&str, EntryKind)> =
            entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("sub", EntryKind::Directory),
                ("f1", EntryKind::File),
                ("f2", EntryKind::File),
            ]
        );

        let root_entries = fs.read_dir("/").await.unwrap();
        assert_eq!(root_entries.len(), 1);
        assert_eq!(root_entries[0].name, "top");

        assert!(matches!(
            fs.read_dir("top/f1").await,
            Err(FsError::DirectoryExpected(_))
        ));
        assert!(matches!(
            fs.read_dir("nowhere").await,
            Err(FsError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_file_checks_kind() {
        let (_, fs) = bucket_fs().await;
        fs.make_dir_all("d/inner").await.unwrap();
        fs.write_file("d/file", b"x", false).await.unwrap();

        assert!(matches!(
            fs.remove_file("d").await,
            Err(FsError::FileExpected(_))
        ));
        assert!(matches!(
            fs.remove_file("d/ghost").await,
            Err(FsError::ResourceNotFound(_))
        ));
        fs.remove_file("d/file").await.unwrap();
        assert_eq!(fs.kind("d/file").await.unwrap(), EntryKind::Missing);
        // The parent directory survives the removal of its last file.
        assert!(fs.is_dir("d").await.unwrap());
    }

    #[tokio::test]
    async fn remove_dir_requires_empty() {
        let (_, fs) = bucket_fs().await;
        fs.make_dir_all("p/c").await.unwrap();
        fs.write_file("p/c/file", b"x", false).await.unwrap();

        assert!(matches!(
            fs.remove_dir("p/c").await,
            Err(FsError::DirectoryNotEmpty(_))
        ));
        fs.remove_file("p/c/file").await.unwrap();
        fs.remove_dir("p/c").await.unwrap();
        assert_eq!(fs.kind("p/c").await.unwrap(), EntryKind::Missing);
        // Markers are sticky: the now-empty parent keeps its own.
        assert!(fs.is_dir("p").await.unwrap());

        assert!(matches!(
            fs.remove_dir("p/c").await,
            Err(FsError::ResourceNotFound(_))
        ));
        fs.write_file("plain", b"x", false).await.unwrap();
        assert!(matches!(
            fs.remove_dir("plain").await,
            Err(FsError::DirectoryExpected(_))
        ));
        assert!(matches!(
            fs.remove_dir("/").await,
            Err(FsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn remove_tree_deletes_blobs_and_markers() {
        let (backend, fs) = bucket_fs().await;
        fs.make_dir_all("top/sub/empty").await.unwrap();
        fs.write_file("top/f", b"1", false).await.unwrap();
        fs.write_file("top/sub/g", b"2", false).await.unwrap();
        fs.write_file("other", b"keep", false).await.unwrap();

        fs.remove_tree("top").await.unwrap();
        assert_eq!(fs.kind("top").await.unwrap(), EntryKind::Missing);
        assert!(matches!(
            fs.read_dir("top/sub").await,
            Err(FsError::ResourceNotFound(_))
        ));
        assert_eq!(backend.keys(), vec!["other"]);

        // Re-running on the now-missing tree reports the obvious.
        assert!(matches!(
            fs.remove_tree("top").await,
            Err(FsError::ResourceNotFound(_))
        ));

        // Removing the bucket root empties it but the root remains.
        fs.remove_tree("/").await.unwrap();
        assert_eq!(backend.object_count(), 0);
        assert!(fs.is_dir("/").await.unwrap());
    }

    #[tokio::test]
    async fn copy_files_respects_overwrite() {
        let (_, fs) = bucket_fs().await;
        fs.write_file("src.txt", b"payload", false).await.unwrap();
        fs.write_file("taken.txt", b"old", false).await.unwrap();

        fs.copy("src.txt", "dst.txt", false).await.unwrap();
        assert_eq!(fs.read_file("dst.txt").await.unwrap(), b"payload");
        assert_eq!(fs.read_file("src.txt").await.unwrap(), b"payload");

        assert!(matches!(
            fs.copy("src.txt", "taken.txt", false).await,
            Err(FsError::DestinationExists(_))
        ));
        fs.copy("src.txt", "taken.txt", true).await.unwrap();
        assert_eq!(fs.read_file("taken.txt").await.unwrap(), b"payload");

        assert!(matches!(
            fs.copy("ghost", "anywhere", false).await,
            Err(FsError::ResourceNotFound(_))
        ));
        assert!(matches!(
            fs.copy("src.txt", "no/parent.txt", false).await,
            Err(FsError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn copy_directory_reproduces_the_tree() {
        let (backend, fs) = bucket_fs().await;
        fs.make_dir_all("src/empty").await.unwrap();
        fs.write_file("src/a.txt", b"a", false).await.unwrap();
        fs.write_file("src/nested/b.txt", b"b", true).await.unwrap();

        fs.copy("src", "dst", false).await.unwrap();
        assert!(fs.is_dir("dst").await.unwrap());
        assert!(fs.is_dir("dst/empty").await.unwrap());
        assert_eq!(fs.read_file("dst/a.txt").await.unwrap(), b"a");
        assert_eq!(fs.read_file("dst/nested/b.txt").await.unwrap(), b"b");
        // Source untouched.
        assert_eq!(fs.read_file("src/a.txt").await.unwrap(), b"a");
        assert!(backend.keys().contains(&"dst/empty/".to_string()));

        assert!(matches!(
            fs.copy("src", "src/inside", true).await,
            Err(FsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn rename_moves_files_and_trees() {
        let (_, fs) = bucket_fs().await;
        fs.write_file("f.txt", b"f", false).await.unwrap();
        fs.rename("f.txt", "g.txt", false).await.unwrap();
        assert_eq!(fs.kind("f.txt").await.unwrap(), EntryKind::Missing);
        assert_eq!(fs.read_file("g.txt").await.unwrap(), b"f");

        fs.write_file("tree/leaf", b"leaf", true).await.unwrap();
        fs.rename("tree", "moved", false).await.unwrap();
        assert_eq!(fs.kind("tree").await.unwrap(), EntryKind::Missing);
        assert_eq!(fs.read_file("moved/leaf").await.unwrap(), b"leaf");

        assert!(matches!(
            fs.rename("/", "anywhere", false).await,
            Err(FsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn rename_onto_itself_keeps_the_entry() {
        let (_, fs) = bucket_fs().await;
        fs.write_file("f.txt", b"payload", false).await.unwrap();

        fs.rename("f.txt", "f.txt", true).await.unwrap();
        assert_eq!(fs.kind("f.txt").await.unwrap(), EntryKind::File);
        assert_eq!(fs.read_file("f.txt").await.unwrap(), b"payload");
        // Path spellings that normalize to the same entry count too.
        fs.rename("f.txt", "./f.txt", true).await.unwrap();
        assert_eq!(fs.read_file("f.txt").await.unwrap(), b"payload");

        assert!(matches!(
            fs.rename("f.txt", "f.txt", false).await,
            Err(FsError::DestinationExists(_))
        ));
        assert!(matches!(
            fs.rename("ghost", "ghost", true).await,
            Err(FsError::ResourceNotFound(_))
        ));

        fs.make_dir("d", false).await.unwrap();
        fs.rename("d", "d", true).await.unwrap();
        assert!(fs.is_dir("d").await.unwrap());
    }

    #[tokio::test]
    async fn rooted_fs_scopes_all_keys_under_the_prefix() {
        let backend = MemoryBackend::new();
        let fs = BucketFs::open(
            backend.clone(),
            FsConfig {
                root_path: "pre".to_string(),
                create: true,
            },
        )
        .await
        .unwrap();

        fs.write_file("a/f", b"x", true).await.unwrap();
        assert_eq!(backend.keys(), vec!["pre/", "pre/a/", "pre/a/f"]);
        assert!(fs.is_dir("a").await.unwrap());

        // Emptying the rooted filesystem keeps its root marker.
        fs.remove_tree("").await.unwrap();
        assert_eq!(backend.keys(), vec!["pre/"]);
        assert!(fs.is_dir("/").await.unwrap());
    }

    #[tokio::test]
    async fn open_validates_or_creates_the_root() {
        let backend = MemoryBackend::new();
        let missing = BucketFs::open(
            backend.clone(),
            FsConfig {
                root_path: "base/x".to_string(),
                create: false,
            },
        )
        .await;
        assert!(matches!(missing, Err(FsError::CreateFailed(_))));

        BucketFs::open(
            backend.clone(),
            FsConfig {
                root_path: "base/x".to_string(),
                create: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(backend.keys(), vec!["base/x/"]);

        // A file sitting at the root's own blob key is a collision, not an
        // absent root.
        backend.put_object("taken", b"file", None).await.unwrap();
        for create in [false, true] {
            let clash = BucketFs::open(
                backend.clone(),
                FsConfig {
                    root_path: "taken".to_string(),
                    create,
                },
            )
            .await;
            assert!(matches!(clash, Err(FsError::DirectoryExpected(_))));
        }
        assert_eq!(backend.keys(), vec!["base/x/", "taken"]);

        // An implicit root (descendants, no marker) also counts as existing.
        backend.put_object("imp/root/file", b"x", None).await.unwrap();
        BucketFs::open(
            backend.clone(),
            FsConfig {
                root_path: "imp/root".to_string(),
                create: false,
            },
        )
        .await
        .unwrap();

        // Empty-ish root paths never produce a marker object.
        for root in ["", ".", "/"] {
            let b = MemoryBackend::new();
            BucketFs::open(
                b.clone(),
                FsConfig {
                    root_path: root.to_string(),
                    create: true,
                },
            )
            .await
            .unwrap();
            assert_eq!(b.object_count(), 0);
        }
    }

    #[tokio::test]
    async fn blob_shadows_marker_when_both_exist() {
        let backend = MemoryBackend::new();
        backend.put_object("d/x", b"file", None).await.unwrap();
        backend.put_object("d/x/", b"", None).await.unwrap();
        let fs = BucketFs::open(backend, FsConfig::default()).await.unwrap();
        assert_eq!(fs.kind("d/x").await.unwrap(), EntryKind::File);

        // The listing agrees with `kind`: one entry per name, the file.
        assert_eq!(
            fs.read_dir("d").await.unwrap(),
            vec![DirEntry {
                name: "x".to_string(),
                kind: EntryKind::File,
            }]
        );
    }
}
