use prettytable::{Table, row};
use serde::Serialize;

use super::frame::FrameDesc;
use crate::file::PageId;

/// Snapshot of one frame, as shown by the diagnostic dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    pub frame: usize,
    pub file: Option<usize>,
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    pub dirty: bool,
    pub ref_bit: bool,
    pub valid: bool,
}

impl From<&FrameDesc> for FrameInfo {
    fn from(desc: &FrameDesc) -> Self {
        Self {
            frame: desc.frame_id().as_usize(),
            file: desc.owner().map(|h| h.as_usize()),
            page_id: desc.page_id(),
            pin_count: desc.pin_count(),
            dirty: desc.is_dirty(),
            ref_bit: desc.ref_bit(),
            valid: desc.is_valid(),
        }
    }
}

/// Counters accumulated over the manager's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Fetches served from a cached frame
    pub hits: u64,
    /// Fetches that had to read from a store
    pub misses: u64,
    /// Valid frames reclaimed by the clock
    pub evictions: u64,
    /// Dirty pages written back (eviction, flush, shutdown)
    pub write_backs: u64,
}

/// Render frame snapshots as a text table
pub fn render_table(frames: &[FrameInfo]) -> String {
    let mut table = Table::new();
    table.set_titles(row!["frame", "file", "page", "pins", "dirty", "ref", "valid"]);

    for info in frames {
        let file = info.file.map_or("-".to_string(), |f| f.to_string());
        let page = info.page_id.map_or("-".to_string(), |p| p.to_string());
        table.add_row(row![
            info.frame,
            file,
            page,
            info.pin_count,
            info.dirty,
            info.ref_bit,
            info.valid
        ]);
    }

    table.to_string()
}
