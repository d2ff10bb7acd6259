pub mod buffer;
pub mod file;

pub use buffer::{
    BUFFER_POOL_SIZE, BufferConfig, BufferError, BufferManager, BufferResult, BufferStats,
    FrameId, FrameInfo,
};
pub use file::{
    FileError, FileHandle, FileResult, MemFile, PAGE_SIZE, PageId, PageStore, PagedFile,
    PagedFileManager,
};
