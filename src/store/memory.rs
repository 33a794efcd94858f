//! In-memory object store backend (implements `ObjectBackend`).
//!
//! Backed by a sorted map so prefix/delimiter listings behave exactly like
//! an S3-style bucket, including pagination. Clones share the same
//! underlying bucket, which lets tests seed keys out-of-band.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::store::client::{BoxError, ListPage, ObjectBackend, ObjectMeta};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    last_modified: SystemTime,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            content_type: self.content_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored, markers included.
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// All keys in lexicographic order. Test helper.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(key).map(|o| o.meta(key)))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(key).map(|o| o.data.clone()))
    }

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.map(String::from),
                last_modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<bool, BoxError> {
        let mut objects = self.objects.lock().unwrap();
        Ok(objects.remove(key).is_some())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BoxError> {
        let mut objects = self.objects.lock().unwrap();
        let src = objects.get(src_key).cloned().ok_or_else(|| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such key: {src_key}"),
            )) as BoxError
        })?;
        objects.insert(
            dst_key.to_string(),
            StoredObject {
                last_modified: SystemTime::now(),
                ..src
            },
        );
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, BoxError> {
        let objects = self.objects.lock().unwrap();
        let limit = max_keys
            .map(|n| n.max(1) as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let lower = match token {
            Some(t) => Bound::Excluded(t.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut page = ListPage::default();
        // Keys already covered by the last emitted common prefix are
        // consumed without counting, like S3 does.
        let mut grouped: Option<String> = None;
        let mut last_consumed: Option<String> = None;
        let mut count = 0usize;

        for (key, object) in objects.range((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(g) = &grouped {
                if key.starts_with(g.as_str()) {
                    last_consumed = Some(key.clone());
                    continue;
                }
            }
            if count == limit {
                page.next_token = last_consumed;
                return Ok(page);
            }

            let rest = &key[prefix.len()..];
            let split = delimiter
                .filter(|_| !rest.is_empty())
                .and_then(|d| rest.find(d).map(|i| (i, d.len())));
            match split {
                Some((i, dlen)) => {
                    let common = key[..prefix.len() + i + dlen].to_string();
                    page.common_prefixes.push(common.clone());
                    grouped = Some(common);
                }
                None => page.keys.push(object.meta(key)),
            }
            count += 1;
            last_consumed = Some(key.clone());
        }
        Ok(page)
    }
}
