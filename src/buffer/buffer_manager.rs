use log::{debug, error, trace, warn};

use super::clock::Clock;
use super::config::{BufferConfig, ConfigResult};
use super::directory::PageDirectory;
use super::dump::{self, BufferStats, FrameInfo};
use super::error::{BufferError, BufferResult};
use super::frame::{FrameId, FramePool, FrameTable};
use super::BUFFER_POOL_SIZE;
use crate::file::{FileHandle, PageId, PagedFileManager};

/// Manages a fixed pool of page frames with clock (second-chance) eviction
///
/// Every successful `fetch_page` or `allocate_new_page` pins the page once
/// and must be paired with one `release_page`. A pinned frame is never
/// chosen for eviction; a dirty frame is written back before its slot is
/// reused, flushed, or the manager is dropped.
pub struct BufferManager {
    /// Underlying file manager
    file_manager: PagedFileManager,
    frames: FrameTable,
    pool: FramePool,
    directory: PageDirectory,
    clock: Clock,
    sync_on_flush: bool,
    stats: BufferStats,
}

impl BufferManager {
    /// Create a new buffer manager
    pub fn new(file_manager: PagedFileManager) -> Self {
        Self::with_capacity(file_manager, BUFFER_POOL_SIZE)
    }

    /// Create a new buffer manager with specified capacity
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(file_manager: PagedFileManager, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer pool needs at least one frame");
        Self::build(file_manager, capacity, true)
    }

    /// Create a buffer manager from a validated config
    pub fn with_config(
        file_manager: PagedFileManager,
        config: &BufferConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(
            file_manager,
            config.num_frames,
            config.sync_on_flush,
        ))
    }

    fn build(file_manager: PagedFileManager, num_frames: usize, sync_on_flush: bool) -> Self {
        Self {
            file_manager,
            frames: FrameTable::new(num_frames),
            pool: FramePool::new(num_frames),
            directory: PageDirectory::for_frames(num_frames),
            clock: Clock::new(num_frames),
            sync_on_flush,
            stats: BufferStats::default(),
        }
    }

    /// Get a reference to the file manager
    pub fn file_manager(&self) -> &PagedFileManager {
        &self.file_manager
    }

    /// Get a mutable reference to the file manager
    pub fn file_manager_mut(&mut self) -> &mut PagedFileManager {
        &mut self.file_manager
    }

    /// Pin a page, reading it from its store if it is not cached
    pub fn fetch_page(&mut self, file: FileHandle, page_id: PageId) -> BufferResult<&mut [u8]> {
        if let Some(frame_id) = self.directory.lookup(file, page_id) {
            self.frames.get_mut(frame_id).pin();
            self.stats.hits += 1;
            trace!("hit {} page {} in {}", file, page_id, frame_id);
            return Ok(self.pool.page_mut(frame_id));
        }

        let frame_id = self.allocate_frame()?;

        // On a failed read the frame stays invalid and nothing is registered
        self.file_manager
            .read_page(file, page_id, self.pool.page_mut(frame_id))?;
        self.directory.insert(file, page_id, frame_id)?;
        self.frames.get_mut(frame_id).set(file, page_id);

        self.stats.misses += 1;
        debug!("loaded {} page {} into {}", file, page_id, frame_id);
        Ok(self.pool.page_mut(frame_id))
    }

    /// Drop one pin on a page, marking it dirty if the caller modified it
    pub fn release_page(
        &mut self,
        file: FileHandle,
        page_id: PageId,
        dirty: bool,
    ) -> BufferResult<()> {
        let frame_id = self
            .directory
            .lookup(file, page_id)
            .ok_or(BufferError::NotFound { file, page_id })?;
        let frame = self.frames.get_mut(frame_id);

        // Dirtiness is sticky until the page is written back
        if dirty {
            frame.dirty = true;
        }

        if frame.pin_count == 0 {
            return Err(BufferError::NotPinned { file, page_id });
        }
        frame.pin_count -= 1;
        Ok(())
    }

    /// Allocate a new page in `file` and pin it in a zeroed frame
    ///
    /// If no frame can be obtained the page number already allocated in the
    /// store is not given back.
    pub fn allocate_new_page(
        &mut self,
        file: FileHandle,
    ) -> BufferResult<(PageId, &mut [u8])> {
        let page_id = self.file_manager.allocate_page(file)?;

        let frame_id = match self.allocate_frame() {
            Ok(frame_id) => frame_id,
            Err(e) => {
                warn!(
                    "{} page {} allocated but left without a frame: {}",
                    file, page_id, e
                );
                return Err(e);
            }
        };

        self.directory.insert(file, page_id, frame_id)?;
        self.frames.get_mut(frame_id).set(file, page_id);

        let page = self.pool.page_mut(frame_id);
        page.fill(0);
        debug!("allocated {} page {} in {}", file, page_id, frame_id);
        Ok((page_id, page))
    }

    /// Discard a page from the pool (without writing it back) and free it in
    /// its store
    pub fn dispose_page(&mut self, file: FileHandle, page_id: PageId) -> BufferResult<()> {
        if let Some(frame_id) = self.directory.lookup(file, page_id) {
            let frame = self.frames.get_mut(frame_id);
            if frame.pin_count > 0 {
                warn!(
                    "disposing {} page {} with {} outstanding pins",
                    file, page_id, frame.pin_count
                );
            }
            frame.clear();
            self.directory.remove(file, page_id)?;
        }

        self.file_manager.dispose_page(file, page_id)?;
        Ok(())
    }

    /// Write back and drop every cached page of `file`
    ///
    /// Fails on the first pinned page; frames handled before it stay flushed.
    pub fn flush_file(&mut self, file: FileHandle) -> BufferResult<()> {
        for i in 0..self.frames.len() {
            let frame_id = FrameId(i);
            let frame = self.frames.get_mut(frame_id);

            if frame.valid && frame.owner == Some(file) {
                if frame.pin_count > 0 {
                    return Err(BufferError::PagePinned {
                        file,
                        page_id: frame.page_id,
                    });
                }

                if frame.dirty {
                    debug!("flushing {} page {} from {}", file, frame.page_id, frame_id);
                    self.file_manager
                        .write_page(file, frame.page_id, self.pool.page(frame_id))?;
                    frame.dirty = false;
                    self.stats.write_backs += 1;
                }

                self.directory.remove(file, frame.page_id)?;
                frame.clear();
            } else if !frame.valid && frame.owner == Some(file) {
                return Err(BufferError::BadBuffer { frame: frame_id });
            }
        }

        // A handle closed earlier has nothing left to sync
        if self.sync_on_flush && self.file_manager.is_file_open(file) {
            self.file_manager.sync_file(file)?;
        }
        Ok(())
    }

    /// Write back every dirty page, keeping all pages cached
    pub fn flush_all(&mut self) -> BufferResult<()> {
        for i in 0..self.frames.len() {
            let frame_id = FrameId(i);
            let frame = self.frames.get_mut(frame_id);

            if let (true, true, Some(owner)) = (frame.valid, frame.dirty, frame.owner) {
                self.file_manager
                    .write_page(owner, frame.page_id, self.pool.page(frame_id))?;
                frame.dirty = false;
                self.stats.write_backs += 1;
            }
        }

        // Sync all files to ensure data is persisted to disk
        self.file_manager.sync_all()?;
        Ok(())
    }

    /// Flush a file's pages out of the pool and close it
    pub fn close_file(&mut self, file: FileHandle) -> BufferResult<()> {
        self.flush_file(file)?;
        self.file_manager.close_file(file)?;
        Ok(())
    }

    /// Write back everything and tear the manager down, reporting failures
    pub fn shutdown(mut self) -> BufferResult<()> {
        self.flush_all()
    }

    /// Borrow the bytes of a page the caller already holds a pin on
    pub fn page(&self, file: FileHandle, page_id: PageId) -> BufferResult<&[u8]> {
        let frame_id = self.pinned_frame(file, page_id)?;
        Ok(self.pool.page(frame_id))
    }

    /// Mutably borrow the bytes of a page the caller already holds a pin on
    ///
    /// Changes only reach disk if the page is later released as dirty.
    pub fn page_mut(&mut self, file: FileHandle, page_id: PageId) -> BufferResult<&mut [u8]> {
        let frame_id = self.pinned_frame(file, page_id)?;
        Ok(self.pool.page_mut(frame_id))
    }

    fn pinned_frame(&self, file: FileHandle, page_id: PageId) -> BufferResult<FrameId> {
        let frame_id = self
            .directory
            .lookup(file, page_id)
            .ok_or(BufferError::NotFound { file, page_id })?;
        if self.frames.get(frame_id).pin_count == 0 {
            return Err(BufferError::NotPinned { file, page_id });
        }
        Ok(frame_id)
    }

    /// Pick a frame for a new page using the clock algorithm
    ///
    /// An invalid frame is taken as is. A valid frame with its reference bit
    /// set gets the bit cleared and is passed over; an unreferenced, unpinned
    /// frame is the victim and is written back first if dirty. Pinned frames
    /// are counted once per call so the scan ends with `AllBuffersPinned`
    /// when every frame is pinned.
    fn allocate_frame(&mut self) -> BufferResult<FrameId> {
        self.clock.begin_sweep();

        while !self.clock.all_pinned() {
            let frame_id = self.clock.advance();
            if self.clock.seen_pinned(frame_id) {
                continue;
            }

            let frame = self.frames.get_mut(frame_id);
            if !frame.valid {
                return Ok(frame_id);
            }
            if frame.ref_bit {
                frame.ref_bit = false;
                continue;
            }
            if frame.pin_count > 0 {
                self.clock.mark_pinned(frame_id);
                continue;
            }

            let owner = frame.owner.ok_or(BufferError::BadBuffer { frame: frame_id })?;
            let page_id = frame.page_id;

            // A failed write-back leaves the victim and the directory untouched
            if frame.dirty {
                self.file_manager
                    .write_page(owner, page_id, self.pool.page(frame_id))?;
                self.stats.write_backs += 1;
            }

            self.directory.remove(owner, page_id)?;
            frame.clear();
            self.stats.evictions += 1;
            debug!("evicted {} page {} from {}", owner, page_id, frame_id);
            return Ok(frame_id);
        }

        Err(BufferError::AllBuffersPinned)
    }

    /// Get the number of frames in the pool
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Get the number of pages currently in the buffer pool
    pub fn buffer_pool_size(&self) -> usize {
        self.frames.iter().filter(|f| f.valid).count()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, file: FileHandle, page_id: PageId) -> bool {
        self.directory.lookup(file, page_id).is_some()
    }

    /// Pin count of a cached page
    pub fn pin_count(&self, file: FileHandle, page_id: PageId) -> Option<u32> {
        self.directory
            .lookup(file, page_id)
            .map(|frame_id| self.frames.get(frame_id).pin_count)
    }

    /// Frame caching a page, if any
    pub fn frame_of(&self, file: FileHandle, page_id: PageId) -> Option<FrameId> {
        self.directory.lookup(file, page_id)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.valid && f.dirty).count()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    /// Occupancy and pin state of every frame
    pub fn frame_infos(&self) -> Vec<FrameInfo> {
        self.frames.iter().map(FrameInfo::from).collect()
    }

    /// Human-readable dump of the pool
    pub fn dump(&self) -> String {
        format!(
            "clock hand at {}\n{}",
            self.clock.hand(),
            dump::render_table(&self.frame_infos())
        )
    }

    pub fn dump_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.frame_infos())
    }

    /// Verify that the directory and the frame table agree
    pub fn check_consistency(&self) -> BufferResult<()> {
        for frame in self.frames.iter() {
            let consistent = match (frame.valid, frame.owner) {
                (true, Some(owner)) => {
                    self.directory.lookup(owner, frame.page_id) == Some(frame.frame_id())
                }
                (false, None) => true,
                _ => false,
            };
            if !consistent {
                return Err(BufferError::BadBuffer {
                    frame: frame.frame_id(),
                });
            }
        }

        // Every valid frame has its entry, so any surplus entry is stale
        if self.directory.len() != self.buffer_pool_size() {
            let stale = self
                .directory
                .iter()
                .find(|&(file, page_id, frame_id)| {
                    frame_id.as_usize() >= self.frames.len()
                        || !self.frames.get(frame_id).holds(file, page_id)
                })
                .map_or(FrameId(0), |(_, _, frame_id)| frame_id);
            return Err(BufferError::BadBuffer { frame: stale });
        }
        Ok(())
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        // Best effort: keep going past failures, there is no caller to report to
        for i in 0..self.frames.len() {
            let frame_id = FrameId(i);
            let frame = self.frames.get_mut(frame_id);

            if let (true, true, Some(owner)) = (frame.valid, frame.dirty, frame.owner) {
                debug!("flushing {} page {} from {}", owner, frame.page_id, frame_id);
                match self
                    .file_manager
                    .write_page(owner, frame.page_id, self.pool.page(frame_id))
                {
                    Ok(()) => frame.dirty = false,
                    Err(e) => error!(
                        "lost dirty {} page {} from {}: {}",
                        owner, frame.page_id, frame_id, e
                    ),
                }
            }
        }

        if let Err(e) = self.file_manager.sync_all() {
            error!("sync on shutdown failed: {}", e);
        }
    }
}
