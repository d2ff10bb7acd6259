//! Clock hand and the per-sweep record of frames found pinned.

use super::frame::FrameId;

const WORD_BITS: usize = u64::BITS as usize;

/// Circular pointer over the frame table
///
/// The hand starts on the last frame so the first advance lands on frame 0.
/// Each victim search is a sweep: frames seen pinned during the sweep are
/// marked in a bitmap and skipped on later passes, and once every frame is
/// marked the sweep is over.
pub(crate) struct Clock {
    hand: usize,
    num_frames: usize,
    pinned: Vec<u64>,
    pinned_count: usize,
}

impl Clock {
    pub(crate) fn new(num_frames: usize) -> Self {
        Self {
            hand: num_frames.saturating_sub(1),
            num_frames,
            pinned: vec![0; num_frames.div_ceil(WORD_BITS)],
            pinned_count: 0,
        }
    }

    /// Current position of the hand
    pub(crate) fn hand(&self) -> FrameId {
        FrameId(self.hand)
    }

    /// Move the hand one frame forward, wrapping at the end
    pub(crate) fn advance(&mut self) -> FrameId {
        self.hand = (self.hand + 1) % self.num_frames;
        FrameId(self.hand)
    }

    /// Forget the marks left by the previous sweep
    pub(crate) fn begin_sweep(&mut self) {
        self.pinned.fill(0);
        self.pinned_count = 0;
    }

    pub(crate) fn seen_pinned(&self, frame_id: FrameId) -> bool {
        let (word, bit) = Self::slot(frame_id);
        self.pinned[word] & bit != 0
    }

    pub(crate) fn mark_pinned(&mut self, frame_id: FrameId) {
        let (word, bit) = Self::slot(frame_id);
        if self.pinned[word] & bit == 0 {
            self.pinned[word] |= bit;
            self.pinned_count += 1;
        }
    }

    /// True once every frame has been marked in this sweep
    pub(crate) fn all_pinned(&self) -> bool {
        self.pinned_count >= self.num_frames
    }

    fn slot(frame_id: FrameId) -> (usize, u64) {
        (frame_id.0 / WORD_BITS, 1u64 << (frame_id.0 % WORD_BITS))
    }
}
