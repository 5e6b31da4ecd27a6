//! File-handle and open-file-descriptor caches.
//!
//! unfs3 keeps two process-wide caches that sit in front of the backend:
//! `fh_cache.c` maps a file handle to the path it last resolved to so
//! repeated lookups don't have to re-walk the tree, and `fd_cache.c` keeps
//! a handful of recently used file descriptors open across WRITE calls so a
//! client streaming writes to the same file doesn't pay an open/close per
//! RPC. SIGUSR1 logs both caches' counters (`daemon.c`'s `print_usage`);
//! see [`crate::lifecycle`] for the signal handler that calls
//! [`FhCache::stats`]/[`FdCache::stats`].
//!
//! This server's own [`crate::vfs::NFSFileSystem`] implementations are
//! already stateless (operations address files by `fileid3`, not by open
//! descriptor), so neither cache sits on the request path by default here
//! — they exist to mirror the ambient diagnostics surface unfs3 exposes on
//! SIGUSR1, and a backend is free to consult them if it wants the same
//! amortization unfs3 gets.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;

use crate::protocol::xdr::nfs3;

/// Default capacity for the file-handle cache. unfs3's `fh_cache` has no
/// CLI-exposed size knob, so neither does this.
const FH_CACHE_CAPACITY: u64 = 4096;

/// Snapshot of a cache's use/hit/miss counters, as reported by SIGUSR1.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub max: u64,
    pub used: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Maps `fileid3` to the path it last resolved to, matching unfs3's
/// `fh_cache`.
pub struct FhCache {
    entries: Cache<nfs3::fileid3, PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FhCache {
    pub fn new() -> Self {
        Self::with_capacity(FH_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Records that `fileid` resolved to `path`, evicting the
    /// least-recently-used entry if the cache is at capacity.
    pub fn insert(&self, fileid: nfs3::fileid3, path: PathBuf) {
        self.entries.insert(fileid, path);
    }

    /// Looks up a cached path, bumping the hit/miss counters SIGUSR1 logs.
    pub fn get(&self, fileid: nfs3::fileid3) -> Option<PathBuf> {
        match self.entries.get(&fileid) {
            Some(path) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(path)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn invalidate(&self, fileid: nfs3::fileid3) {
        self.entries.invalidate(&fileid);
    }

    /// Counters reported by the SIGUSR1 handler: cache capacity, entries
    /// currently resident, and cumulative hits/misses since startup.
    pub fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks();
        CacheStats {
            max: self.entries.policy().max_capacity().unwrap_or(0),
            used: self.entries.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for FhCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One recently used file descriptor kept open across WRITE calls,
/// matching unfs3's `fd_cache` entries (`fd_cache.c`'s `struct
/// fd_cache_entry`, keyed by path, remembering whether it was opened for
/// reading or writing).
struct OpenFd {
    file: std::fs::File,
    writer: bool,
}

/// Keeps a bounded number of recently used file descriptors open, keyed by
/// path, so a client streaming writes to one file doesn't pay an
/// open/close per RPC. Matches unfs3's `fd_cache`: `purge()` (SIGTERM
/// path) closes and flushes every writer; `-w`/`expire_writers` makes the
/// cache proactively close writers once idle instead of waiting for
/// purge.
pub struct FdCache {
    entries: dashmap::DashMap<PathBuf, OpenFd>,
    readers: AtomicU64,
    writers: AtomicU64,
}

impl FdCache {
    pub fn new() -> Self {
        Self { entries: dashmap::DashMap::new(), readers: AtomicU64::new(0), writers: AtomicU64::new(0) }
    }

    /// Inserts (or replaces) the cached descriptor for `path`.
    pub fn insert(&self, path: PathBuf, file: std::fs::File, writer: bool) {
        if self.entries.insert(path, OpenFd { file, writer }).is_none() {
            if writer {
                self.writers.fetch_add(1, Ordering::Relaxed);
            } else {
                self.readers.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn remove(&self, path: &std::path::Path) {
        if let Some((_, entry)) = self.entries.remove(path) {
            if entry.writer {
                self.writers.fetch_sub(1, Ordering::Relaxed);
            } else {
                self.readers.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }

    /// Closes and forgets every cached descriptor, flushing writers first.
    /// Called during graceful shutdown (SIGTERM/SIGINT/SIGQUIT) and, when
    /// `-w`/`expire_writers` is set, proactively by the lifecycle
    /// supervisor instead of waiting for shutdown.
    pub fn purge(&self) {
        self.entries.retain(|_, entry| {
            if entry.writer {
                let _ = entry.file.sync_all();
            }
            false
        });
        self.readers.store(0, Ordering::Relaxed);
        self.writers.store(0, Ordering::Relaxed);
    }

    /// Number of reader/writer descriptors currently held open, reported
    /// by SIGUSR1 alongside [`FhCache::stats`].
    pub fn counts(&self) -> (u64, u64) {
        (self.readers.load(Ordering::Relaxed), self.writers.load(Ordering::Relaxed))
    }
}

impl Default for FdCache {
    fn default() -> Self {
        Self::new()
    }
}

/// How long an idle writer descriptor is kept open before `-w` expires it.
/// unfs3 exposes no tunable here either; this just needs to be shorter
/// than a typical NFS client's idle timeout.
pub const WRITER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fh_cache_tracks_hits_and_misses() {
        let cache = FhCache::with_capacity(8);
        cache.insert(1, PathBuf::from("/a"));
        assert_eq!(cache.get(1), Some(PathBuf::from("/a")));
        assert_eq!(cache.get(2), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.used, 1);
    }

    #[test]
    fn fd_cache_purge_clears_counts() {
        let cache = FdCache::new();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = std::fs::File::open(tmp.path()).unwrap();
        cache.insert(tmp.path().to_path_buf(), file, false);
        assert_eq!(cache.counts(), (1, 0));
        cache.purge();
        assert_eq!(cache.counts(), (0, 0));
    }
}
