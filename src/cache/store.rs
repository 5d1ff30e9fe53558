//! Persistent annotation cache.
//!
//! # Architecture
//!
//! - Loaded once at startup. A missing or corrupt file starts an empty cache
//!   (logged, never fatal).
//! - Every [`put()`](AnnotationCache::put) rewrites the whole mapping to disk
//!   via tmp file + rename, so a crash mid-write leaves the previous file
//!   intact.
//! - One mutex guards both the map and the persist step: a reader never
//!   observes a half-applied write, and two writers never interleave on disk.
//! - Persist failures are logged and swallowed; the in-memory map stays
//!   authoritative for the rest of the run.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::telemetry;
use crate::types::AnnotationResult;
use crate::Result;

/// Thread-safe, file-backed cache of annotation results keyed on item identity.
pub struct AnnotationCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, AnnotationResult>>,
}

impl AnnotationCache {
    /// Open the cache at `path`, loading any existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        info!(path = %path.display(), entries = entries.len(), "annotation cache loaded");
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Backing file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a previously computed annotation.
    pub fn get(&self, identity: &str) -> Option<AnnotationResult> {
        let hit = self.lock().get(identity).cloned();
        if hit.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        }
        hit
    }

    /// Insert (or overwrite) an annotation and persist the full mapping.
    pub fn put(&self, identity: impl Into<String>, result: AnnotationResult) {
        let mut entries = self.lock();
        entries.insert(identity.into(), result);

        let Some(path) = &self.path else {
            return;
        };
        match persist_entries(path, &entries) {
            Ok(()) => debug!(path = %path.display(), entries = entries.len(), "cache persisted"),
            Err(e) => {
                metrics::counter!(telemetry::CACHE_PERSIST_FAILURES_TOTAL).increment(1);
                warn!(path = %path.display(), error = %e, "failed to persist annotation cache");
            }
        }
    }

    /// Number of cached identities.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cached identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    // A panic elsewhere while holding the lock cannot leave the map half
    // updated (insert is the only mutation), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, AnnotationResult>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, AnnotationResult> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read annotation cache");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt annotation cache, starting empty");
            BTreeMap::new()
        }
    }
}

/// Write the mapping to a sibling tmp file, flush it, then rename over `path`.
fn persist_entries(path: &Path, entries: &BTreeMap<String, AnnotationResult>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(entries)?;
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
