// crates/engine-types/src/buffer.rs
//
// BlockBuffer: time-indexed ring of decoded, converted Blocks for one stream
// (§3, §4.A). Single exclusive writer (the Decoding Worker), many readers
// (the Rendering Worker, external capture).
//
// Blocks are kept behind `Arc` so a reader's guard can outlive an eviction —
// the writer never blocks on a held block, it just drops its own reference
// and the last reader to drop theirs frees the memory. `resetting` is the
// protocol-level guard described in §3: while true, no new borrow is handed
// out, even though existing `Arc` clones remain valid until dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::block::Block;

/// A borrowed Block. Cheap to clone (reference-counted); holding one does not
/// prevent the buffer from evicting the slot it came from.
pub type BlockGuard = Arc<Block>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRange {
    pub start:    Duration,
    pub end:      Duration,
}

impl BufferRange {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer is resetting, no operations accepted")]
    Resetting,
}

struct Inner {
    blocks: VecDeque<BlockGuard>,
}

/// Ordered, gap-tolerant but start-time-monotonic ring of Blocks for one
/// stream type.
pub struct BlockBuffer {
    capacity:  usize,
    inner:     Mutex<Inner>,
    resetting: AtomicBool,
}

impl BlockBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner { blocks: VecDeque::with_capacity(capacity) }),
            resetting: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity
    }

    pub fn range(&self) -> Option<BufferRange> {
        let inner = self.inner.lock();
        let first = inner.blocks.front()?;
        let last  = inner.blocks.back()?;
        Some(BufferRange { start: first.start_time, end: last.end_time })
    }

    /// Insert `block` per §4.A: `add(frame, container) -> Block` is the
    /// container-side conversion step; this is the insertion half. Appends
    /// if `block.start_time >= last.start_time`; otherwise the stream
    /// reordered (§5 ordering guarantee) and the ring is reset first.
    pub fn insert(&self, block: Block) -> Result<(), BufferError> {
        if self.resetting.load(Ordering::Acquire) {
            return Err(BufferError::Resetting);
        }
        let mut inner = self.inner.lock();
        let out_of_order = inner.blocks.back()
            .map(|last| block.start_time < last.start_time)
            .unwrap_or(false);
        if out_of_order {
            inner.blocks.clear();
        }
        if inner.blocks.len() >= self.capacity {
            inner.blocks.pop_front();
        }
        inner.blocks.push_back(Arc::new(block));
        Ok(())
    }

    /// Returns the unique block whose `[start, end)` contains `t`; `None` if
    /// `t` precedes the buffered range; the last block if `t` is past the
    /// end (trailing-frame behavior, §4.A).
    pub fn get(&self, t: Duration) -> Option<BlockGuard> {
        if self.resetting.load(Ordering::Acquire) {
            return None;
        }
        let inner = self.inner.lock();
        if let Some(first) = inner.blocks.front() {
            if t < first.start_time {
                return None;
            }
        } else {
            return None;
        }
        if let Some(hit) = inner.blocks.iter().find(|b| b.contains(t)) {
            return Some(Arc::clone(hit));
        }
        let last = inner.blocks.back().unwrap();
        if t >= last.end_time {
            return Some(Arc::clone(last));
        }
        None
    }

    pub fn first(&self) -> Option<BlockGuard> {
        self.inner.lock().blocks.front().map(Arc::clone)
    }

    pub fn last(&self) -> Option<BlockGuard> {
        self.inner.lock().blocks.back().map(Arc::clone)
    }

    /// Try to acquire a reader guard on the block currently at `t`, without
    /// distinguishing "no block" from "resetting" — used by the Rendering
    /// Worker, which treats both as "nothing to render this cycle."
    pub fn try_acquire_reader_lock(&self, t: Duration) -> Option<BlockGuard> {
        self.get(t)
    }

    /// Evict blocks strictly older than `cutoff` (§4.F look-behind eviction).
    /// Never evicts the block that currently contains `cutoff` itself.
    pub fn evict_older_than(&self, cutoff: Duration) {
        if self.resetting.load(Ordering::Acquire) {
            return;
        }
        let mut inner = self.inner.lock();
        while let Some(front) = inner.blocks.front() {
            if front.end_time <= cutoff {
                inner.blocks.pop_front();
            } else {
                break;
            }
        }
    }

    /// Release all blocks and refuse borrows until the reset completes.
    pub fn reset(&self) {
        self.resetting.store(true, Ordering::Release);
        self.inner.lock().blocks.clear();
        self.resetting.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockPayload, VideoPayload};

    fn block(start_ms: u64, end_ms: u64) -> Block {
        Block::new(
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
            BlockPayload::Video(VideoPayload {
                pixels: vec![0; 4], width: 1, height: 1, stride: 4,
                closed_captions: Vec::new(),
            }),
        )
    }

    #[test]
    fn insert_then_get_at_start() {
        let buf = BlockBuffer::new(4);
        buf.insert(block(0, 40)).unwrap();
        buf.insert(block(40, 80)).unwrap();
        let got = buf.get(Duration::from_millis(50)).unwrap();
        assert_eq!(got.start_time, Duration::from_millis(40));
    }

    #[test]
    fn get_before_range_is_none() {
        let buf = BlockBuffer::new(4);
        buf.insert(block(100, 140)).unwrap();
        assert!(buf.get(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn get_past_range_returns_last() {
        let buf = BlockBuffer::new(4);
        buf.insert(block(0, 40)).unwrap();
        buf.insert(block(40, 80)).unwrap();
        let got = buf.get(Duration::from_millis(1000)).unwrap();
        assert_eq!(got.start_time, Duration::from_millis(40));
    }

    #[test]
    fn capacity_is_enforced_by_eviction() {
        let buf = BlockBuffer::new(2);
        buf.insert(block(0, 10)).unwrap();
        buf.insert(block(10, 20)).unwrap();
        buf.insert(block(20, 30)).unwrap();
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.first().unwrap().start_time, Duration::from_millis(10));
    }

    #[test]
    fn out_of_order_insert_resets_ring() {
        let buf = BlockBuffer::new(4);
        buf.insert(block(100, 140)).unwrap();
        buf.insert(block(140, 180)).unwrap();
        // Stream reordered — earlier start than the last inserted block.
        buf.insert(block(0, 40)).unwrap();
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.first().unwrap().start_time, Duration::from_millis(0));
    }

    #[test]
    fn evict_older_than_keeps_block_containing_cutoff() {
        let buf = BlockBuffer::new(8);
        buf.insert(block(0, 40)).unwrap();
        buf.insert(block(40, 80)).unwrap();
        buf.insert(block(80, 120)).unwrap();
        buf.evict_older_than(Duration::from_millis(90));
        // Block [40,80) ends at or before 90 and is strictly older -> evicted.
        // Block [80,120) is retained since it's not "end_time <= cutoff".
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.first().unwrap().start_time, Duration::from_millis(80));
    }

    #[test]
    fn reader_guard_survives_eviction() {
        let buf = BlockBuffer::new(1);
        buf.insert(block(0, 40)).unwrap();
        let guard = buf.get(Duration::from_millis(10)).unwrap();
        buf.insert(block(40, 80)).unwrap(); // evicts slot 0's block from the ring
        assert_eq!(buf.count(), 1);
        assert_eq!(guard.start_time, Duration::from_millis(0)); // still valid
    }

    #[test]
    fn reset_clears_and_refuses_nothing_after_completion() {
        let buf = BlockBuffer::new(4);
        buf.insert(block(0, 40)).unwrap();
        buf.reset();
        assert_eq!(buf.count(), 0);
        assert!(buf.insert(block(0, 40)).is_ok());
    }
}
