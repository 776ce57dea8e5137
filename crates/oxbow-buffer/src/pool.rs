//! Buffer pool manager.

use crate::allocator::PageIdAllocator;
use crate::disk::{DiskManager, LogManager};
use crate::frame::{Frame, FrameId};
use crate::replacer::{ClockReplacer, Replacer};
use oxbow_common::config::StorageConfig;
use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use sysinfo::System;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub pool_size: usize,
    /// Total number of cooperating pool instances sharing the id space.
    pub num_instances: u32,
    /// This instance's index among the cooperating instances.
    pub instance_index: u32,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 1024,
            num_instances: 1,
            instance_index: 0,
        }
    }
}

impl BufferPoolConfig {
    /// Creates a configuration sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so that low-memory systems still get useful
    /// caching; no upper limit.
    pub fn auto_sized() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let pool_size = (target_bytes / PAGE_SIZE).max(1_000);

        Self {
            pool_size,
            ..Default::default()
        }
    }
}

impl From<&StorageConfig> for BufferPoolConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            pool_size: config.pool_pages,
            ..Default::default()
        }
    }
}

/// State guarded by the pool's exclusive lock.
struct PoolInner {
    /// Array of frames; a frame is either in the free list or mapped by
    /// exactly one page table entry.
    frames: Vec<Frame>,
    /// Frames holding no page.
    free_list: VecDeque<FrameId>,
    /// Page id to frame id mapping for resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// Page id allocator for this instance's partition.
    allocator: PageIdAllocator,
}

/// Buffer pool manager.
///
/// Caches pages in a fixed array of frames:
/// - Page id to frame id mapping for resident pages
/// - Free frame list, consulted before eviction
/// - Clock replacement for eviction of unpinned pages
/// - Pin counting and dirty tracking with write-back through the backing
///   store
///
/// Every operation runs under one exclusive lock over the pool state; the
/// replacer's own lock is only ever taken while the pool lock is held.
/// Nothing blocks waiting for capacity: when no frame is free and nothing
/// is evictable, the operation fails with `PoolExhausted` and retrying is
/// the caller's decision.
pub struct BufferPoolManager {
    /// Frame array, free list, page table, and id allocator.
    inner: Mutex<PoolInner>,
    /// Page replacement policy.
    replacer: ClockReplacer,
    /// Durable backing store.
    disk: Arc<dyn DiskManager>,
    /// Log manager, held for recovery integration.
    log: Option<Arc<dyn LogManager>>,
}

impl BufferPoolManager {
    /// Creates a new buffer pool over the given backing store.
    pub fn new(
        config: BufferPoolConfig,
        disk: Arc<dyn DiskManager>,
        log: Option<Arc<dyn LogManager>>,
    ) -> Self {
        assert!(config.pool_size > 0, "a pool needs at least one frame");

        let frames: Vec<_> = (0..config.pool_size)
            .map(|i| Frame::new(FrameId(i as u32)))
            .collect();
        let free_list: VecDeque<_> = (0..config.pool_size).map(|i| FrameId(i as u32)).collect();

        Self {
            inner: Mutex::new(PoolInner {
                frames,
                free_list,
                page_table: HashMap::new(),
                allocator: PageIdAllocator::new(config.num_instances, config.instance_index),
            }),
            replacer: ClockReplacer::new(config.pool_size),
            disk,
            log,
        }
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    /// Returns the number of resident pages.
    pub fn page_count(&self) -> usize {
        self.inner.lock().page_table.len()
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().page_table.contains_key(&page_id)
    }

    /// Returns the log manager this pool was constructed with.
    pub fn log_manager(&self) -> Option<&Arc<dyn LogManager>> {
        self.log.as_ref()
    }

    /// Obtains a frame for a new resident page.
    ///
    /// Takes from the free list first; otherwise evicts a victim, writing
    /// it back if dirty and dropping its stale page table entry. The
    /// returned frame is empty and unpinned.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            debug_assert!(inner.frames[frame_id.index()].is_empty());
            return Ok(frame_id);
        }

        let frame_id = match self.replacer.victim() {
            Some(frame_id) => frame_id,
            None => return Err(OxbowError::PoolExhausted),
        };

        let frame = &mut inner.frames[frame_id.index()];
        debug_assert_eq!(frame.pin_count(), 0, "victims are always unpinned");

        if frame.is_dirty() {
            if let Err(e) = self.disk.write_page(frame.page_id(), frame.data()) {
                // The page stays resident; make the frame eligible again.
                self.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        let stale = frame.page_id();
        frame.reset();
        inner.page_table.remove(&stale);

        Ok(frame_id)
    }

    /// Fetches a page, pinning its frame.
    ///
    /// A resident page that is already pinned cannot be fetched again
    /// until it is unpinned; the call fails with `PageInUse`. On a miss
    /// the page is read from the backing store into a reclaimed frame,
    /// which may first write back a dirty victim.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageHandle<'_>> {
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &mut inner.frames[frame_id.index()];
            if frame.is_pinned() {
                return Err(OxbowError::PageInUse { page_id });
            }
            frame.pin();
            let generation = frame.generation();
            self.replacer.pin(frame_id);
            return Ok(PageHandle {
                pool: self,
                page_id,
                frame_id,
                generation,
            });
        }

        let frame_id = self.acquire_frame(&mut inner)?;

        let read = self
            .disk
            .read_page(page_id, inner.frames[frame_id.index()].data_mut());
        if let Err(e) = read {
            // A failed read leaves the pool as it was: the claimed frame
            // goes back to the free list.
            inner.frames[frame_id.index()].reset();
            inner.free_list.push_back(frame_id);
            return Err(e);
        }

        let frame = &mut inner.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        let generation = frame.generation();

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(PageHandle {
            pool: self,
            page_id,
            frame_id,
            generation,
        })
    }

    /// Creates a new page, pinning its frame.
    ///
    /// The frame is obtained exactly as on a fetch miss; the page id is
    /// allocated only once a frame is secured. The new page starts dirty:
    /// its (zeroed) content has never been written to the backing store.
    pub fn new_page(&self) -> Result<(PageId, PageHandle<'_>)> {
        let mut inner = self.inner.lock();

        if inner.frames.iter().all(|f| f.is_pinned()) {
            return Err(OxbowError::PoolExhausted);
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let page_id = inner.allocator.allocate();

        let frame = &mut inner.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.set_dirty(true);
        frame.pin();
        let generation = frame.generation();

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok((
            page_id,
            PageHandle {
                pool: self,
                page_id,
                frame_id,
                generation,
            },
        ))
    }

    /// Releases one pin on a resident page.
    ///
    /// When the pin count reaches zero the frame becomes eligible for
    /// eviction. The dirty flag is only ever promoted: passing
    /// `is_dirty = false` never clears it.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(OxbowError::PageNotResident { page_id }),
        };

        let frame = &mut inner.frames[frame_id.index()];
        if !frame.is_pinned() {
            return Err(OxbowError::PageNotPinned { page_id });
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.unpin(frame_id);
        }
        Ok(())
    }

    /// Writes a resident page's content to the backing store and clears
    /// its dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(OxbowError::PageNotResident { page_id }),
        };

        let frame = &mut inner.frames[frame_id.index()];
        self.disk.write_page(page_id, frame.data())?;
        frame.set_dirty(false);
        Ok(())
    }

    /// Writes every resident page's content to the backing store,
    /// clearing dirty flags as writes complete.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        let entries: Vec<(PageId, FrameId)> =
            inner.page_table.iter().map(|(&p, &f)| (p, f)).collect();
        for (page_id, frame_id) in entries {
            let frame = &mut inner.frames[frame_id.index()];
            self.disk.write_page(page_id, frame.data())?;
            frame.set_dirty(false);
        }
        Ok(())
    }

    /// Deletes a page from the pool.
    ///
    /// A page that is not resident counts as already deleted. A pinned
    /// page cannot be deleted. Otherwise the frame is reset and returned
    /// to the free list and the id is handed to the reclamation hook.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                inner.allocator.deallocate(page_id);
                return Ok(());
            }
        };

        let frame = &mut inner.frames[frame_id.index()];
        if frame.is_pinned() {
            return Err(OxbowError::PageInUse { page_id });
        }

        frame.reset();
        inner.page_table.remove(&page_id);
        inner.free_list.push_back(frame_id);
        inner.allocator.deallocate(page_id);
        Ok(())
    }

    /// Allocates the next page id in this instance's partition without
    /// bringing a page into the pool.
    pub fn allocate_page(&self) -> PageId {
        self.inner.lock().allocator.allocate()
    }

    /// Hook for backing-store space reclamation; currently a no-op.
    pub fn deallocate_page(&self, page_id: PageId) {
        self.inner.lock().allocator.deallocate(page_id);
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let inner = self.inner.lock();

        let mut pinned_frames = 0;
        let mut dirty_frames = 0;
        for &frame_id in inner.page_table.values() {
            let frame = &inner.frames[frame_id.index()];
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
        }

        BufferPoolStats {
            total_frames: inner.frames.len(),
            free_frames: inner.free_list.len(),
            used_frames: inner.page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }

    /// Runs `f` against the frame a handle refers to, after checking that
    /// the handle is still current: the page must still map to the same
    /// frame, the frame must not have been recycled, and a pin must still
    /// be outstanding.
    fn with_frame<R>(
        &self,
        page_id: PageId,
        frame_id: FrameId,
        generation: u64,
        f: impl FnOnce(&mut Frame) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.lock();

        match inner.page_table.get(&page_id) {
            Some(&mapped) if mapped == frame_id => {}
            _ => return Err(OxbowError::PageNotResident { page_id }),
        }

        let frame = &mut inner.frames[frame_id.index()];
        if frame.generation() != generation || !frame.is_pinned() {
            return Err(OxbowError::PageNotResident { page_id });
        }
        Ok(f(frame))
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// Borrowed view of a pinned page.
///
/// The handle stays valid until the matching unpin drops the page's pin
/// count to zero. Every access revalidates against the pool, so a handle
/// held past its unpin (or past an eviction) fails with `PageNotResident`
/// instead of touching a recycled frame.
pub struct PageHandle<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    frame_id: FrameId,
    generation: u64,
}

impl PageHandle<'_> {
    /// Returns the page id this handle refers to.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the current pin count of the page's frame.
    pub fn pin_count(&self) -> Result<u32> {
        self.pool
            .with_frame(self.page_id, self.frame_id, self.generation, |f| {
                f.pin_count()
            })
    }

    /// Returns true if the page's frame is dirty.
    pub fn is_dirty(&self) -> Result<bool> {
        self.pool
            .with_frame(self.page_id, self.frame_id, self.generation, |f| {
                f.is_dirty()
            })
    }

    /// Reads the page data under the pool lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8; PAGE_SIZE]) -> R) -> Result<R> {
        self.pool
            .with_frame(self.page_id, self.frame_id, self.generation, |frame| {
                f(frame.data())
            })
    }

    /// Writes the page data under the pool lock.
    ///
    /// Mutation does not mark the frame dirty by itself; report the write
    /// through `unpin_page(page_id, true)` when releasing the pin.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8; PAGE_SIZE]) -> R) -> Result<R> {
        self.pool
            .with_frame(self.page_id, self.frame_id, self.generation, |frame| {
                f(frame.data_mut())
            })
    }

    /// Copies page data out of the frame.
    pub fn copy_to(&self, dst: &mut [u8]) -> Result<()> {
        self.pool
            .with_frame(self.page_id, self.frame_id, self.generation, |frame| {
                frame.copy_to(dst)
            })
    }

    /// Copies data into the frame.
    pub fn copy_from(&self, src: &[u8]) -> Result<()> {
        self.pool
            .with_frame(self.page_id, self.frame_id, self.generation, |frame| {
                frame.copy_from(src)
            })
    }
}

impl std::fmt::Debug for PageHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .field("generation", &self.generation)
            .finish()
    }
}
