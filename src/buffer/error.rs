use thiserror::Error;

use super::frame::FrameId;
use crate::file::{FileError, FileHandle, PageId};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory already maps {file}, page_id={page_id}")]
    Duplicate { file: FileHandle, page_id: PageId },

    #[error("Directory has no entry for {file}, page_id={page_id}")]
    Missing { file: FileHandle, page_id: PageId },
}

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("All buffer frames are pinned")]
    AllBuffersPinned,

    #[error("Page not in buffer pool: {file}, page_id={page_id}")]
    NotFound { file: FileHandle, page_id: PageId },

    #[error("Page not pinned: {file}, page_id={page_id}")]
    NotPinned { file: FileHandle, page_id: PageId },

    #[error("Page is pinned: {file}, page_id={page_id}")]
    PagePinned { file: FileHandle, page_id: PageId },

    #[error("Inconsistent buffer state in {frame}")]
    BadBuffer { frame: FrameId },

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("File error: {0}")]
    File(#[from] FileError),
}

pub type BufferResult<T> = Result<T, BufferError>;
