//! Buffer pool: a bounded cache of pages keyed by `(table, page_no)`.
//!
//! The pool is the only mutable state shared across connections. The map is
//! guarded by a `parking_lot::RwLock` so cache hits run under the read lock;
//! per-entry pin counts, dirty flags, and access stamps are atomics so the
//! fast path never takes the write lock. Disk I/O (slow-path reads, eviction
//! and flush write-back) always happens with no lock held, in the calling
//! task's own execution context.
//!
//! Callers receive a copy of the cached page and hand mutations back through
//! [`BufferPool::mark_dirty`] while holding a pin. A pinned entry is never
//! evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use super::error::{BufferError, StorageError};
use super::page::Page;
use super::pagefile::PageFiles;

/// Default pool capacity in pages (128 pages = 1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Cache key: one page of one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub table: String,
    pub page_no: u64,
}

impl PageKey {
    pub fn new(table: impl Into<String>, page_no: u64) -> Self {
        Self {
            table: table.into(),
            page_no,
        }
    }
}

/// One cached page with its bookkeeping.
struct BufferEntry {
    page: RwLock<Page>,
    dirty: AtomicBool,
    pin_count: AtomicU32,
    /// Milliseconds since pool construction; drives LRU selection.
    last_access: AtomicU64,
}

impl BufferEntry {
    fn new(page: Page, now: u64) -> Self {
        Self {
            page: RwLock::new(page),
            dirty: AtomicBool::new(false),
            pin_count: AtomicU32::new(1),
            last_access: AtomicU64::new(now),
        }
    }

    fn pin(&self, now: u64) {
        self.pin_count.fetch_add(1, Ordering::SeqCst);
        self.last_access.store(now, Ordering::SeqCst);
    }
}

/// Bounded page cache with pinning, dirty tracking, and LRU eviction.
///
/// NOTE: For production, consider:
/// - Metrics (hit rate, eviction count, dirty page count)
/// - A background flusher so eviction rarely has to write
/// - Sharding the map to reduce write-lock contention on misses
pub struct BufferPool {
    entries: RwLock<HashMap<PageKey, Arc<BufferEntry>>>,
    files: PageFiles,
    capacity: usize,
    started: Instant,
}

impl BufferPool {
    /// Creates a pool over the given page files.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(files: PageFiles, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer pool capacity must be > 0");
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            files,
            capacity,
            started: Instant::now(),
        }
    }

    /// Returns the pool capacity in pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of cached pages.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Fetches a page, pinning it for the caller.
    ///
    /// Cache hits take only the map read lock. On a miss the disk read runs
    /// in the caller's task; if two tasks race on the same key the first
    /// insert wins and the loser pins the winner's entry, so the cache holds
    /// exactly one entry per key.
    ///
    /// The caller must balance this with [`unpin_page`](Self::unpin_page).
    pub async fn get_page(&self, table: &str, page_no: u64) -> Result<Page, BufferError> {
        let key = PageKey::new(table, page_no);
        let now = self.now();

        // Fast path: cache hit under the read lock.
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&key) {
                entry.pin(now);
                return Ok(entry.page.read().clone());
            }
        }

        // Slow path: read from disk with no lock held.
        let page = self.files.read(table, page_no).await?;

        self.ensure_capacity().await;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            // Another task loaded this page while we were doing I/O.
            existing.pin(self.now());
            return Ok(existing.page.read().clone());
        }
        entries.insert(key, Arc::new(BufferEntry::new(page.clone(), self.now())));
        Ok(page)
    }

    /// Replaces the cached copy of a pinned page and marks it dirty.
    ///
    /// # Errors
    ///
    /// - [`BufferError::PageNotCached`] if the page is not in the pool.
    /// - [`BufferError::PageNotPinned`] if the caller holds no pin.
    pub fn mark_dirty(&self, table: &str, page_no: u64, page: Page) -> Result<(), BufferError> {
        let key = PageKey::new(table, page_no);
        let entries = self.entries.read();
        let entry = entries.get(&key).ok_or(BufferError::PageNotCached)?;
        if entry.pin_count.load(Ordering::SeqCst) == 0 {
            return Err(BufferError::PageNotPinned);
        }
        *entry.page.write() = page;
        entry.dirty.store(true, Ordering::SeqCst);
        entry.last_access.store(self.now(), Ordering::SeqCst);
        Ok(())
    }

    /// Releases one pin. At zero pins the page becomes evictable.
    ///
    /// Unpinning a page that is not cached is a warned no-op.
    pub fn unpin_page(&self, table: &str, page_no: u64) {
        let key = PageKey::new(table, page_no);
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(entry) => {
                let _ = entry.pin_count.fetch_update(
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                    |pins| pins.checked_sub(1),
                );
            }
            None => {
                eprintln!(
                    "warning: unpin of uncached page {} of \"{}\"",
                    page_no, table
                );
            }
        }
    }

    /// Writes every dirty page back to disk and clears its dirty flag.
    ///
    /// Returns the number of pages flushed. Individual write failures are
    /// reported and leave the entry dirty, but do not abort the sweep.
    pub async fn flush_all(&self) -> Result<usize, BufferError> {
        let snapshot: Vec<(PageKey, Arc<BufferEntry>)> = {
            let entries = self.entries.read();
            entries
                .iter()
                .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut flushed = 0;
        for (key, entry) in snapshot {
            // Claim the dirty flag before writing: a writer that re-dirties
            // the entry mid-flush sets it again and a later flush picks up
            // the newer image.
            if !entry.dirty.swap(false, Ordering::SeqCst) {
                continue;
            }
            let page = entry.page.read().clone();
            match self.files.write(&key.table, key.page_no, &page).await {
                Ok(()) => flushed += 1,
                Err(e) => {
                    entry.dirty.store(true, Ordering::SeqCst);
                    eprintln!(
                        "warning: flush of page {} of \"{}\" failed: {}",
                        key.page_no, key.table, e
                    );
                }
            }
        }
        Ok(flushed)
    }

    /// Evicts LRU entries until the pool is under capacity.
    ///
    /// A victim is removed from the map first (so nobody can re-pin or
    /// re-dirty it) and flushed afterward with no lock held. If the table's
    /// file has been removed out-of-band the flush counts as successful and
    /// the entry is dropped. Other write failures put the entry back, still
    /// dirty, and the pool grows transiently.
    async fn ensure_capacity(&self) {
        loop {
            let victim = {
                let mut entries = self.entries.write();
                if entries.len() < self.capacity {
                    return;
                }
                let key = entries
                    .iter()
                    .filter(|(_, e)| e.pin_count.load(Ordering::SeqCst) == 0)
                    .min_by_key(|(_, e)| e.last_access.load(Ordering::SeqCst))
                    .map(|(k, _)| k.clone());
                match key {
                    Some(key) => {
                        let entry = entries.remove(&key).unwrap();
                        Some((key, entry))
                    }
                    None => {
                        eprintln!(
                            "warning: buffer pool at capacity ({}) with every page pinned; growing",
                            self.capacity
                        );
                        return;
                    }
                }
            };

            let Some((key, entry)) = victim else { return };
            if entry.dirty.load(Ordering::SeqCst) {
                let page = entry.page.read().clone();
                match self.files.write(&key.table, key.page_no, &page).await {
                    Ok(()) => {}
                    Err(StorageError::FileNotFound(_)) => {
                        // Table removed out-of-band; nothing left to flush to.
                    }
                    Err(e) => {
                        eprintln!(
                            "warning: eviction flush of page {} of \"{}\" failed: {}",
                            key.page_no, key.table, e
                        );
                        // Put the entry back unless another task has already
                        // re-faulted the page in the meantime.
                        self.entries.write().entry(key).or_insert(entry);
                        return;
                    }
                }
            }
            // Entry dropped here; loop in case the pool is still over.
        }
    }

    fn now(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    #[cfg(test)]
    fn is_dirty(&self, table: &str, page_no: u64) -> Option<bool> {
        self.entries
            .read()
            .get(&PageKey::new(table, page_no))
            .map(|e| e.dirty.load(Ordering::SeqCst))
    }

    #[cfg(test)]
    fn pin_count(&self, table: &str, page_no: u64) -> Option<u32> {
        self.entries
            .read()
            .get(&PageKey::new(table, page_no))
            .map(|e| e.pin_count.load(Ordering::SeqCst))
    }

    #[cfg(test)]
    fn contains(&self, table: &str, page_no: u64) -> bool {
        self.entries
            .read()
            .contains_key(&PageKey::new(table, page_no))
    }
}
