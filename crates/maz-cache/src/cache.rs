//! Per-tenant, per-type object mirror

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::{CacheError, Result},
    kind::ObjectType,
    object::{DirectoryObject, DirectoryObjectList},
    storage::{self, FILE_MODE},
};

/// Graph delta tokens are valid for 30 days; stay safely under that
pub const DELTA_LINK_MAX_AGE: Duration = Duration::from_secs(27 * 24 * 3600);

const CHECKPOINT_REMOVE_RETRY: Duration = Duration::from_millis(500);

/// Where a tenant's cache files live and how they are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub cache_dir: PathBuf,
    pub compress: bool,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            cache_dir: cache_dir.into(),
            compress: true,
        }
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// On-disk locations for one cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub data: PathBuf,
    pub delta_link: PathBuf,
    pub checkpoint: PathBuf,
}

impl CachePaths {
    pub fn resolve(ctx: &TenantContext, kind: ObjectType) -> Self {
        let stem = format!("{}{}", ctx.tenant_id, kind.cache_suffix());
        Self {
            data: ctx.cache_dir.join(format!("{stem}.bin")),
            delta_link: ctx.cache_dir.join(format!("{stem}_link.bin")),
            checkpoint: ctx.cache_dir.join(format!("{stem}.bin.partial")),
        }
    }

    /// Delete the data, link and checkpoint files; missing ones are fine
    pub fn remove_all(&self) -> Result<()> {
        for path in [&self.data, &self.delta_link, &self.checkpoint] {
            storage::remove_if_exists(path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DeltaLinkRecord {
    #[serde(rename = "@odata.deltaLink")]
    delta_link: String,
}

/// Outcome of merging a delta set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Distinct objects inserted or merged
    pub upserted: usize,
    /// Objects actually removed from the mirror
    pub removed: usize,
    /// Entries dropped for lack of an identity
    pub skipped: usize,
}

/// The authoritative local mirror of one object type for one tenant
pub struct Cache {
    kind: ObjectType,
    paths: CachePaths,
    compress: bool,
    data: RwLock<DirectoryObjectList>,
}

impl Cache {
    /// Load the cache for `kind`, creating an empty persisted file if none exists
    pub fn open(kind: ObjectType, ctx: &TenantContext) -> Result<Self> {
        storage::ensure_dir(&ctx.cache_dir)?;
        let paths = CachePaths::resolve(ctx, kind);

        let (data, created) = match storage::load::<DirectoryObjectList>(&paths.data, ctx.compress)
        {
            Ok(list) => (list, false),
            Err(e) if e.is_not_found() => (DirectoryObjectList::new(), true),
            Err(e) => return Err(e),
        };

        let cache = Self {
            kind,
            paths,
            compress: ctx.compress,
            data: RwLock::new(data),
        };
        if created {
            debug!(kind = %kind, path = %cache.paths.data.display(), "initializing empty cache");
            cache.save()?;
        }
        Ok(cache)
    }

    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Time since the data file was written. `None` when there is no file yet or
    /// it still holds the empty placeholder written by [`Cache::open`].
    pub fn age(&self) -> Option<Duration> {
        let age = storage::file_age(&self.paths.data)?;
        if self.data.read().is_empty() {
            None
        } else {
            Some(age)
        }
    }

    pub fn count(&self) -> usize {
        self.data.read().len()
    }

    /// Copy of the whole mirror
    pub fn snapshot(&self) -> DirectoryObjectList {
        self.data.read().clone()
    }

    pub fn find_by_id(&self, id: &str) -> Option<DirectoryObject> {
        self.data.read().find_by_id(id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<DirectoryObject> {
        self.data.read().find_by_name(name).cloned()
    }

    /// Objects containing `filter` anywhere, de-duplicated by identity.
    /// An empty filter returns everything.
    pub fn matching(&self, filter: &str) -> DirectoryObjectList {
        let data = self.data.read();
        if filter.is_empty() {
            return data.clone();
        }
        let mut seen = HashSet::new();
        data.iter()
            .filter(|obj| match obj.identity() {
                Some(id) => !seen.contains(&id) && obj.has_string(filter) && seen.insert(id),
                None => false,
            })
            .cloned()
            .collect()
    }

    /// Merge `obj` into the mirror. Call [`Cache::save`] to persist.
    pub fn upsert(&self, obj: &DirectoryObject) -> Result<()> {
        let id = obj.identity().ok_or(CacheError::MissingIdentity)?;
        self.data.write().upsert(&id, obj);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> bool {
        self.data.write().delete_by_id(id)
    }

    pub fn batch_delete(&self, ids: &HashSet<String>) -> usize {
        self.data.write().batch_delete(ids)
    }

    /// Empty the in-memory mirror; files are untouched until the next save
    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Merge a raw delta set: removals are batch-deleted, then changed entries
    /// are trimmed, de-duplicated (last occurrence wins) and upserted.
    pub fn normalize(&self, delta: &[DirectoryObject]) -> NormalizeReport {
        self.apply(delta, false)
    }

    /// Like [`Cache::normalize`] but starting from an empty mirror, for full syncs
    pub fn rebuild(&self, entries: &[DirectoryObject]) -> NormalizeReport {
        self.apply(entries, true)
    }

    fn apply(&self, delta: &[DirectoryObject], replace: bool) -> NormalizeReport {
        let mut report = NormalizeReport::default();

        // Removals first, then the last change per identity. An object both
        // changed and removed in one set ends up present.
        let mut removals = HashSet::new();
        let mut last_change: HashMap<String, usize> = HashMap::with_capacity(delta.len());
        for (i, entry) in delta.iter().enumerate() {
            match entry.identity() {
                Some(id) if entry.is_removed() => {
                    removals.insert(id);
                }
                Some(id) => {
                    last_change.insert(id, i);
                }
                None => report.skipped += 1,
            }
        }
        if report.skipped > 0 {
            warn!(
                kind = %self.kind,
                skipped = report.skipped,
                "skipping delta entries without an identity"
            );
        }

        let mut ordered: Vec<(usize, String)> =
            last_change.into_iter().map(|(id, i)| (i, id)).collect();
        ordered.sort_unstable_by_key(|(i, _)| *i);
        let changed: Vec<(String, DirectoryObject)> = ordered
            .into_iter()
            .map(|(i, id)| (id, delta[i].trim_for_cache(self.kind)))
            .collect();

        let mut data = self.data.write();
        if replace {
            data.clear();
        }
        report.removed = data.batch_delete(&removals);
        report.upserted = data.upsert_many(changed.iter().map(|(id, obj)| (id.as_str(), obj)));
        report
    }

    /// Persist the mirror atomically
    pub fn save(&self) -> Result<()> {
        let data = self.data.read();
        storage::save(&self.paths.data, &*data, FILE_MODE, self.compress)
    }

    pub fn save_delta_link(&self, link: &str) -> Result<()> {
        let record = DeltaLinkRecord {
            delta_link: link.to_string(),
        };
        storage::save(&self.paths.delta_link, &record, FILE_MODE, false)
    }

    /// The stored continuation token, or `None` when it is missing, unreadable
    /// or older than [`DELTA_LINK_MAX_AGE`]
    pub fn load_delta_link(&self) -> Option<String> {
        self.load_delta_link_within(DELTA_LINK_MAX_AGE)
    }

    pub fn load_delta_link_within(&self, max_age: Duration) -> Option<String> {
        let age = storage::file_age(&self.paths.delta_link)?;
        if age > max_age {
            debug!(kind = %self.kind, ?age, "delta link expired");
            return None;
        }
        match storage::load::<DeltaLinkRecord>(&self.paths.delta_link, false) {
            Ok(record) if !record.delta_link.is_empty() => Some(record.delta_link),
            Ok(_) => None,
            Err(e) => {
                debug!(kind = %self.kind, "ignoring unusable delta link: {e}");
                None
            }
        }
    }

    pub fn clear_delta_link(&self) -> Result<()> {
        storage::remove_if_exists(&self.paths.delta_link).map(|_| ())
    }

    /// Snapshot in-progress fetch results next to the data file
    pub fn save_checkpoint(&self, entries: &[DirectoryObject]) -> Result<()> {
        storage::save(&self.paths.checkpoint, entries, FILE_MODE, self.compress)
    }

    pub fn has_checkpoint(&self) -> bool {
        self.paths.checkpoint.exists()
    }

    /// Entries of a checkpoint that is at least as new as the data file.
    /// A stale or unreadable checkpoint is dropped and `None` returned.
    pub fn load_checkpoint(&self) -> Result<Option<Vec<DirectoryObject>>> {
        let Some(checkpoint_time) = storage::modified_at(&self.paths.checkpoint) else {
            return Ok(None);
        };
        let newer = storage::modified_at(&self.paths.data).map_or(true, |t| checkpoint_time >= t);
        if !newer {
            debug!(kind = %self.kind, "discarding checkpoint older than cache");
            self.discard_checkpoint()?;
            return Ok(None);
        }

        match storage::load(&self.paths.checkpoint, self.compress) {
            Ok(entries) => Ok(Some(entries)),
            Err(e) => {
                warn!(kind = %self.kind, "discarding unreadable checkpoint: {e}");
                self.discard_checkpoint()?;
                Ok(None)
            }
        }
    }

    /// Merge a checkpoint left by an interrupted fetch, then persist and drop it
    pub fn resume_checkpoint(&self) -> Result<Option<NormalizeReport>> {
        let Some(entries) = self.load_checkpoint()? else {
            return Ok(None);
        };

        let report = self.normalize(&entries);
        self.save()?;
        self.discard_checkpoint()?;
        info!(
            kind = %self.kind,
            upserted = report.upserted,
            removed = report.removed,
            "resumed interrupted sync from checkpoint"
        );
        Ok(Some(report))
    }

    /// Remove the checkpoint file, retrying once after a short pause
    pub fn discard_checkpoint(&self) -> Result<()> {
        remove_with_one_retry(&self.paths.checkpoint)
    }

    /// Drop every file this cache owns and empty the mirror
    pub fn purge(&self) -> Result<()> {
        let mut data = self.data.write();
        self.paths.remove_all()?;
        data.clear();
        Ok(())
    }

    /// Remove the files of a cache without reading them, so a corrupt cache
    /// can still be dropped and rebuilt
    pub fn purge_files(kind: ObjectType, ctx: &TenantContext) -> Result<()> {
        CachePaths::resolve(ctx, kind).remove_all()?;
        debug!(kind = %kind, "cache files removed");
        Ok(())
    }
}

fn remove_with_one_retry(path: &Path) -> Result<()> {
    match storage::remove_if_exists(path) {
        Ok(_) => Ok(()),
        Err(first) => {
            warn!("retrying removal of {}: {first}", path.display());
            thread::sleep(CHECKPOINT_REMOVE_RETRY);
            storage::remove_if_exists(path).map(|_| ())
        }
    }
}
