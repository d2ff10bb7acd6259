mod error;
mod file_manager;
mod mem_file;
mod page_store;
mod paged_file;

pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, PagedFileManager};
pub use mem_file::MemFile;
pub use page_store::{PageStore, check_page_size};
pub use paged_file::PagedFile;

/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Page ID type
pub type PageId = usize;
