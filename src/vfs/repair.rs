//! Tree walk that restores missing directory markers (`fix_storage`).
//!
//! Keys written by other tools imply directories that may have no marker
//! object. The walk streams a flat listing of every key under the repair
//! root and writes a marker for each implied ancestor not already seen,
//! keeping only directory keys in memory. It only ever adds markers, so it
//! is idempotent and safe to run next to concurrent mutations.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{FsError, Result};
use crate::store::client::ObjectBackend;
use crate::vfs::fs::{BucketFs, EntryKind};

/// Outcome of one repair walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSummary {
    /// Distinct directories implied by the scanned keys.
    pub directories: usize,
    /// Markers written by this run.
    pub created: usize,
    /// Marker writes that failed; the walk continues past them.
    pub failed: usize,
}

impl<B: ObjectBackend> BucketFs<B> {
    /// Scans every key under `path` (the whole filesystem for `""`) and
    /// writes the marker for every directory that lacks one. The bucket
    /// root itself is never marked; the configured root prefix and the
    /// repair root are.
    pub async fn fix_storage(&self, path: &str) -> Result<RepairSummary> {
        let resolved = self.resolver.resolve(path)?;
        if !resolved.is_root() {
            if self.kind_of(&resolved).await? == EntryKind::Missing {
                return Err(FsError::ResourceNotFound(path.to_string()));
            }
            self.ensure_ancestor_markers(&resolved).await?;
        }
        let prefix = self.list_prefix(&resolved);

        let mut summary = RepairSummary::default();
        // Marker keys confirmed present or just written. Only directory
        // keys are retained, so memory stays proportional to the number of
        // distinct directories, not the number of objects.
        let mut present: HashSet<String> = HashSet::new();
        let mut seen_dirs: HashSet<String> = HashSet::new();

        if !prefix.is_empty() {
            seen_dirs.insert(prefix.clone());
            self.repair_marker(&prefix, &mut present, &mut summary).await;
        }

        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(&prefix, None, token.as_deref(), None)
                .await?;
            for meta in &page.keys {
                let key = meta.key.as_str();
                if key.ends_with('/') {
                    present.insert(key.to_string());
                }
                let rel = &key[prefix.len()..];
                for (i, _) in rel.match_indices('/') {
                    let dir_key = &key[..prefix.len() + i + 1];
                    seen_dirs.insert(dir_key.to_string());
                    if !present.contains(dir_key) {
                        self.repair_marker(dir_key, &mut present, &mut summary)
                            .await;
                    }
                }
            }
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        summary.directories = seen_dirs.len();
        info!(
            directories = summary.directories,
            created = summary.created,
            failed = summary.failed,
            "storage repair complete"
        );
        Ok(summary)
    }

    async fn repair_marker(
        &self,
        marker_key: &str,
        present: &mut HashSet<String>,
        summary: &mut RepairSummary,
    ) {
        // Repair tolerates individual failures; remaining directories are
        // still visited.
        match self.ensure_marker_key(marker_key).await {
            Ok(created) => {
                if created {
                    summary.created += 1;
                }
            }
            Err(e) => {
                summary.failed += 1;
                warn!(key = marker_key, error = %e, "failed to restore directory marker");
            }
        }
        present.insert(marker_key.to_string());
    }
}
