//! FIFO frame replacement.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// First-in-first-out victim selection.
///
/// Frames become candidates the first time a page lands in them and
/// keep their queue position across re-accesses; a victim is the oldest
/// candidate whose page is unpinned. Index builds and scans touch pages
/// in long one-way sweeps, so age order loses little against fancier
/// policies here.
pub struct FifoReplacer {
    /// Candidate frames, oldest at the front.
    queue: VecDeque<FrameId>,

    /// Frames currently somewhere in `queue`.
    queued: HashSet<FrameId>,

    /// Frames whose page has pin count zero.
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            evictable: HashSet::new(),
        }
    }

    /// Note an access to a frame.
    ///
    /// Enqueues the frame on first sight; later accesses leave its age
    /// position alone.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if self.queued.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    /// Mark whether a frame may be evicted (its pin count is zero).
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Pop the oldest evictable frame, or None while every candidate is
    /// pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        while let Some(frame_id) = self.queue.pop_front() {
            self.queued.remove(&frame_id);

            if self.evictable.remove(&frame_id) {
                return Some(frame_id);
            }
            // Pinned or already removed; drop it from the queue and
            // let the next access re-enqueue it
        }
        None
    }

    /// Forget a frame whose page left the pool.
    ///
    /// The stale queue entry stays behind; `evict` skips it because the
    /// frame is no longer in `queued`.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.queued.remove(&frame_id);
        self.evictable.remove(&frame_id);
    }

    /// Number of frames currently eligible for eviction.
    pub fn evictable_count(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(n: usize) -> FrameId {
        FrameId::new(n)
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut replacer = FifoReplacer::new();

        for n in 0..3 {
            replacer.record_access(fid(n));
            replacer.set_evictable(fid(n), true);
        }
        assert_eq!(replacer.evictable_count(), 3);

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pinned_frames_skipped() {
        let mut replacer = FifoReplacer::new();

        for n in 0..3 {
            replacer.record_access(fid(n));
        }
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_removed_frame_never_evicted() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        replacer.remove(fid(0));

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_reaccess_keeps_age_position() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.record_access(fid(0));

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        // Frame 0 keeps its original (oldest) position
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_unpinning_restores_eligibility() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.evictable_count(), 0);

        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.evict(), Some(fid(0)));
    }
}
