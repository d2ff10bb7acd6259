use ahash::AHashMap;

use super::error::{FileError, FileResult};
use super::page_store::{PageStore, check_page_size};
use super::{PAGE_SIZE, PageId};

/// A volatile page store that keeps every page in memory
#[derive(Default)]
pub struct MemFile {
    pages: AHashMap<PageId, Box<[u8]>>,
    next_page: PageId,
    free_pages: Vec<PageId>,
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages currently allocated
    pub fn allocated_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }
}

impl PageStore for MemFile {
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        check_page_size(buffer.len())?;
        let page = self
            .pages
            .get(&page_id)
            .ok_or(FileError::PageNotFound(page_id))?;
        buffer.copy_from_slice(page);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        check_page_size(buffer.len())?;
        let page = self
            .pages
            .get_mut(&page_id)
            .ok_or(FileError::PageNotFound(page_id))?;
        page.copy_from_slice(buffer);
        Ok(())
    }

    fn allocate_page(&mut self) -> FileResult<PageId> {
        let page_id = match self.free_pages.pop() {
            Some(page_id) => page_id,
            None => {
                let page_id = self.next_page;
                self.next_page += 1;
                page_id
            }
        };
        self.pages
            .insert(page_id, vec![0u8; PAGE_SIZE].into_boxed_slice());
        Ok(page_id)
    }

    fn dispose_page(&mut self, page_id: PageId) -> FileResult<()> {
        if self.pages.remove(&page_id).is_none() {
            return Err(FileError::PageNotFound(page_id));
        }
        self.free_pages.push(page_id);
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.next_page
    }
}
