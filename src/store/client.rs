//! Backend abstraction over a flat, key-addressed object store.
//!
//! The filesystem layer only ever talks to this trait. Keys are opaque
//! strings; directory semantics live entirely above this boundary.

use async_trait::async_trait;
use std::time::SystemTime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Metadata of a stored object as reported by head/list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub content_type: Option<String>,
}

/// One page of a prefix listing.
///
/// With a delimiter, keys containing the delimiter past the prefix are
/// grouped into `common_prefixes` (immediate sub-directories); `keys` then
/// holds only the immediate objects. `next_token` is present iff the
/// listing is truncated.
#[derive(Debug, Default)]
pub struct ListPage {
    pub keys: Vec<ObjectMeta>,
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Metadata of the object at `key`, or `None` if absent.
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError>;

    /// Full contents of the object at `key`, or `None` if absent.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError>;

    /// Creates or overwrites the object at `key`.
    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BoxError>;

    /// Deletes the object at `key`. Returns `false` when it did not exist.
    async fn delete_object(&self, key: &str) -> Result<bool, BoxError>;

    /// Server-side copy of `src_key` to `dst_key`.
    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BoxError>;

    /// One page of keys under `prefix`, in lexicographic order. Pass the
    /// `next_token` of the previous page to continue a truncated listing.
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, BoxError>;
}
