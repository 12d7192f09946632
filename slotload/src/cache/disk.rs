//! Disk tier: persisted asset blobs with size-bounded eviction.

use crate::asset::Asset;
use crate::cache::key::{CacheKey, FilenameGenerator};
use crate::cache::types::CacheError;
use crate::cache::CacheStats;
use crate::decode::encode_blob;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Suffix of in-progress writes; such files are never indexed.
const TEMP_SUFFIX: &str = ".part";

/// Fraction of the limit eviction shrinks the tier to.
const EVICTION_TARGET_RATIO: f64 = 0.9;

#[derive(Debug, Default)]
struct Index {
    /// filename → size in bytes
    files: HashMap<String, u64>,
    size_bytes: usize,
}

/// Persistent tier storing encoded assets as flat files in one directory.
///
/// Filenames come from a pluggable [`FilenameGenerator`]. Writes go to a
/// temporary file first and are renamed into place, so readers never see a
/// partial blob and rewriting an existing key is idempotent.
pub struct DiskCache {
    cache_dir: PathBuf,
    filenames: Arc<dyn FilenameGenerator>,
    index: Mutex<Index>,
    max_size_bytes: usize,
    temp_counter: AtomicU64,
    stats: Mutex<CacheStats>,
}

impl DiskCache {
    /// Opens the tier, creating the directory and indexing existing files.
    ///
    /// A tier already over its limit is trimmed before returning.
    pub fn new(
        cache_dir: PathBuf,
        max_size_bytes: usize,
        filenames: Arc<dyn FilenameGenerator>,
    ) -> Result<Self, CacheError> {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let cache = Self {
            cache_dir,
            filenames,
            index: Mutex::new(Index::default()),
            max_size_bytes,
            temp_counter: AtomicU64::new(0),
            stats: Mutex::new(CacheStats::new()),
        };

        cache.scan_cache_dir()?;
        cache.evict_if_over_limit()?;

        Ok(cache)
    }

    /// Path of the persisted blob for `key`, if present.
    pub fn get_path(&self, key: &CacheKey) -> Option<PathBuf> {
        let filename = self.filenames.filename(key);
        let indexed = self
            .index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .contains_key(&filename);

        let path = self.cache_dir.join(&filename);
        let hit = indexed && path.is_file();
        if indexed && !hit {
            // Deleted behind our back
            self.forget(&filename);
        }

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.disk.record_lookup(hit);
        hit.then_some(path)
    }

    /// Path the blob for `key` is (or would be) stored at.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(self.filenames.filename(key))
    }

    /// Writes an asset synchronously.
    pub fn put_sync(&self, key: &CacheKey, asset: &Asset) -> Result<(), CacheError> {
        let filename = self.filenames.filename(key);
        let blob = encode_blob(asset);

        let result = self.write_atomic(&filename, &blob);
        if let Err(e) = result {
            self.stats
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record_disk_write(false);
            return Err(e);
        }

        let (size_bytes, count) = {
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            let len = blob.len() as u64;
            if let Some(old) = index.files.insert(filename, len) {
                index.size_bytes = index.size_bytes.saturating_sub(old as usize);
            }
            index.size_bytes += len as usize;
            (index.size_bytes, index.files.len())
        };

        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.record_disk_write(true);
            stats.disk.set_footprint(size_bytes, count);
        }
        debug!(key = %key, bytes = blob.len(), "Persisted asset");

        if size_bytes > self.max_size_bytes {
            self.evict_if_over_limit()?;
        }
        Ok(())
    }

    fn write_atomic(&self, filename: &str, data: &[u8]) -> Result<(), CacheError> {
        let seq = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let temp = self
            .cache_dir
            .join(format!(".{}.{}{}", filename, seq, TEMP_SUFFIX));
        let target = self.cache_dir.join(filename);

        fs::write(&temp, data)?;
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    fn forget(&self, filename: &str) {
        let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(size) = index.files.remove(filename) {
            index.size_bytes = index.size_bytes.saturating_sub(size as usize);
        }
    }

    /// Deletes the blob for one key. Returns true if it was indexed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let filename = self.filenames.filename(key);
        let present = self
            .index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .contains_key(&filename);
        if !present {
            return Ok(false);
        }

        match fs::remove_file(self.cache_dir.join(&filename)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.forget(&filename);
        Ok(true)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        let filename = self.filenames.filename(key);
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .contains_key(&filename)
    }

    pub fn entry_count(&self) -> usize {
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .len()
    }

    pub fn size_bytes(&self) -> usize {
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Deletes every indexed blob. Returns the number removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let files: Vec<String> = {
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            index.size_bytes = 0;
            index.files.drain().map(|(name, _)| name).collect()
        };

        for name in &files {
            let _ = fs::remove_file(self.cache_dir.join(name));
        }

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.disk.record_evictions(files.len() as u64);
        stats.disk.set_footprint(0, 0);
        Ok(files.len())
    }

    /// Rebuilds the index from the directory contents.
    ///
    /// Leftover temporary files from interrupted writes are deleted.
    fn scan_cache_dir(&self) -> Result<(), CacheError> {
        let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        index.files.clear();
        index.size_bytes = 0;

        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(TEMP_SUFFIX) {
                let _ = fs::remove_file(&path);
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                index.size_bytes += metadata.len() as usize;
                index.files.insert(name.to_string(), metadata.len());
            }
        }

        let (size_bytes, count) = (index.size_bytes, index.files.len());
        drop(index);

        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .disk
            .set_footprint(size_bytes, count);
        debug!(dir = %self.cache_dir.display(), entries = count, bytes = size_bytes, "Indexed disk cache");
        Ok(())
    }

    /// Evicts the oldest files (by modification time) until the tier is at
    /// 90% of its limit. No-op while under the limit.
    pub fn evict_if_over_limit(&self) -> Result<(), CacheError> {
        if self.size_bytes() <= self.max_size_bytes {
            return Ok(());
        }

        let target_size = (self.max_size_bytes as f64 * EVICTION_TARGET_RATIO) as usize;

        let names: Vec<String> = self
            .index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .keys()
            .cloned()
            .collect();

        let mut entries: Vec<(String, SystemTime)> = names
            .into_iter()
            .filter_map(|name| {
                let modified = fs::metadata(self.cache_dir.join(&name))
                    .and_then(|m| m.modified())
                    .ok()?;
                Some((name, modified))
            })
            .collect();
        entries.sort_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| a_name.cmp(b_name)));

        let mut evicted = 0u64;
        let mut freed = 0u64;
        for (name, _) in entries {
            if self.size_bytes() <= target_size {
                break;
            }
            match fs::remove_file(self.cache_dir.join(&name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to evict cached blob");
                    continue;
                }
            }
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(size) = index.files.remove(&name) {
                index.size_bytes = index.size_bytes.saturating_sub(size as usize);
                freed += size;
                evicted += 1;
            }
        }

        let (size_bytes, count) = {
            let index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            (index.size_bytes, index.files.len())
        };
        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.disk.record_evictions(evicted);
            stats.disk.set_footprint(size_bytes, count);
        }

        info!(evicted, freed_bytes = freed, size_bytes, "Disk cache eviction");
        Ok(())
    }
}
