use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageId};

/// A container of fixed-size pages addressable by page number.
///
/// The buffer manager never touches a store directly; it goes through the
/// [`PagedFileManager`](super::PagedFileManager), which owns every open store
/// and identifies it by a [`FileHandle`](super::FileHandle).
pub trait PageStore {
    /// Read page `page_id` into `buffer` (exactly `PAGE_SIZE` bytes)
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()>;

    /// Write `buffer` (exactly `PAGE_SIZE` bytes) to page `page_id`
    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()>;

    /// Allocate a fresh, zeroed page and return its number
    fn allocate_page(&mut self) -> FileResult<PageId>;

    /// Return `page_id` to the store for reuse
    fn dispose_page(&mut self, page_id: PageId) -> FileResult<()>;

    /// Number of page slots the store spans, allocated or free
    fn page_count(&self) -> usize;

    /// Push buffered writes down to durable storage
    fn sync(&mut self) -> FileResult<()> {
        Ok(())
    }
}

/// Reject buffers that are not exactly one page long
pub fn check_page_size(len: usize) -> FileResult<()> {
    if len != PAGE_SIZE {
        return Err(FileError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}
