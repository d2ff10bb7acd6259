//! Per-frame metadata and the raw page memory behind it.

use std::fmt;

use crate::file::{FileHandle, PAGE_SIZE, PageId};

/// Index of a frame in both the frame table and the frame pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Bookkeeping for one frame of the pool
#[derive(Debug, Clone)]
pub struct FrameDesc {
    frame_id: FrameId,
    /// Store whose page is cached here
    pub(crate) owner: Option<FileHandle>,
    /// Page number within `owner`; meaningless unless `valid`
    pub(crate) page_id: PageId,
    pub(crate) pin_count: u32,
    pub(crate) dirty: bool,
    /// Second-chance bit for the clock
    pub(crate) ref_bit: bool,
    pub(crate) valid: bool,
}

impl FrameDesc {
    fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            owner: None,
            page_id: 0,
            pin_count: 0,
            dirty: false,
            ref_bit: false,
            valid: false,
        }
    }

    /// Install `page_id` of `owner` with a single pin
    pub(crate) fn set(&mut self, owner: FileHandle, page_id: PageId) {
        self.owner = Some(owner);
        self.page_id = page_id;
        self.pin_count = 1;
        self.dirty = false;
        self.ref_bit = true;
        self.valid = true;
    }

    /// Return the frame to the empty state
    pub(crate) fn clear(&mut self) {
        self.owner = None;
        self.page_id = 0;
        self.pin_count = 0;
        self.dirty = false;
        self.ref_bit = false;
        self.valid = false;
    }

    pub(crate) fn pin(&mut self) {
        self.pin_count += 1;
        self.ref_bit = true;
    }

    pub(crate) fn holds(&self, owner: FileHandle, page_id: PageId) -> bool {
        self.valid && self.owner == Some(owner) && self.page_id == page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn owner(&self) -> Option<FileHandle> {
        self.owner
    }

    /// The cached page, if the frame holds one
    pub fn page_id(&self) -> Option<PageId> {
        self.valid.then_some(self.page_id)
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn ref_bit(&self) -> bool {
        self.ref_bit
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Fixed array of frame descriptors, one per pool slot
pub(crate) struct FrameTable {
    frames: Box<[FrameDesc]>,
}

impl FrameTable {
    pub(crate) fn new(num_frames: usize) -> Self {
        let frames = (0..num_frames).map(|i| FrameDesc::new(FrameId(i))).collect();
        Self { frames }
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn get(&self, frame_id: FrameId) -> &FrameDesc {
        &self.frames[frame_id.0]
    }

    pub(crate) fn get_mut(&mut self, frame_id: FrameId) -> &mut FrameDesc {
        &mut self.frames[frame_id.0]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &FrameDesc> {
        self.frames.iter()
    }
}

/// One contiguous allocation holding the bytes of every frame
pub(crate) struct FramePool {
    data: Box<[u8]>,
}

impl FramePool {
    pub(crate) fn new(num_frames: usize) -> Self {
        Self {
            data: vec![0u8; num_frames * PAGE_SIZE].into_boxed_slice(),
        }
    }

    pub(crate) fn page(&self, frame_id: FrameId) -> &[u8] {
        let start = frame_id.0 * PAGE_SIZE;
        &self.data[start..start + PAGE_SIZE]
    }

    pub(crate) fn page_mut(&mut self, frame_id: FrameId) -> &mut [u8] {
        let start = frame_id.0 * PAGE_SIZE;
        &mut self.data[start..start + PAGE_SIZE]
    }
}
