//! BucketFS: a hierarchical filesystem view over a flat, key-addressed
//! object store.
//!
//! Object stores have no native directory concept. This crate emulates one
//! with zero-byte marker objects (`<dir>/`), resolves paths against a
//! configured root prefix, and ships a repair walk that restores missing
//! markers for directories implied by deeper keys.

pub mod error;
pub mod store;
pub mod vfs;

pub use error::{FsError, Result};
pub use store::client::{BoxError, ListPage, ObjectBackend, ObjectMeta};
pub use store::memory::MemoryBackend;
pub use store::s3::{S3Backend, S3Config};
pub use vfs::fs::{BucketFs, DirEntry, EntryKind, FileInfo, FsConfig, MemoryFs, S3Fs};
pub use vfs::repair::RepairSummary;
