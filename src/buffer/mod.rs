//! Fixed-size buffer pool with clock replacement.

mod buffer_manager;
mod clock;
mod config;
mod directory;
mod dump;
mod error;
mod frame;


pub use buffer_manager::BufferManager;
pub use config::{BufferConfig, ConfigError, ConfigResult};
pub use directory::PageDirectory;
pub use dump::{BufferStats, FrameInfo};
pub use error::{BufferError, BufferResult, DirectoryError};
pub use frame::FrameId;

/// Default number of frames in the buffer pool
/// With 1024 frames × 8KB = 8MB of page memory
pub const BUFFER_POOL_SIZE: usize = 1024;
