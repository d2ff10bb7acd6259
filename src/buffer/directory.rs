use ahash::AHashMap;

use super::error::DirectoryError;
use super::frame::FrameId;
use crate::file::{FileHandle, PageId};

/// Key identifying a cached page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DirectoryKey {
    file: FileHandle,
    page_id: PageId,
}

/// Maps (file, page) to the frame caching it
pub struct PageDirectory {
    entries: AHashMap<DirectoryKey, FrameId>,
}

impl PageDirectory {
    /// Size the table at roughly 1.2x the frame count, rounded to odd
    pub fn for_frames(num_frames: usize) -> Self {
        let capacity = (num_frames * 6 / 5) | 1;
        Self {
            entries: AHashMap::with_capacity(capacity),
        }
    }

    pub fn lookup(&self, file: FileHandle, page_id: PageId) -> Option<FrameId> {
        self.entries.get(&DirectoryKey { file, page_id }).copied()
    }

    pub fn insert(
        &mut self,
        file: FileHandle,
        page_id: PageId,
        frame_id: FrameId,
    ) -> Result<(), DirectoryError> {
        let key = DirectoryKey { file, page_id };
        if self.entries.contains_key(&key) {
            return Err(DirectoryError::Duplicate { file, page_id });
        }
        self.entries.insert(key, frame_id);
        Ok(())
    }

    pub fn remove(&mut self, file: FileHandle, page_id: PageId) -> Result<FrameId, DirectoryError> {
        self.entries
            .remove(&DirectoryKey { file, page_id })
            .ok_or(DirectoryError::Missing { file, page_id })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every (file, page, frame) triple, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (FileHandle, PageId, FrameId)> + '_ {
        self.entries
            .iter()
            .map(|(key, &frame_id)| (key.file, key.page_id, frame_id))
    }
}
