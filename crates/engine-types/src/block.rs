// crates/engine-types/src/block.rs
//
// Block: a presentable unit after format conversion (§3). Owned exclusively
// by its BlockBuffer once inserted; renderers borrow it under a reader guard.

use std::time::Duration;

use crate::stream::StreamType;

/// SMPTE-style timecode, attached to video blocks when the container reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmpteTimecode {
    pub hours:        u8,
    pub minutes:      u8,
    pub seconds:      u8,
    pub frames:       u8,
    pub drop_frame:   bool,
}

/// Closed-caption side-data attached opportunistically to a video Block.
/// The engine does not decode these — see SPEC_FULL.md §9 — it only carries
/// whatever raw CEA-608/708 packets the container surfaced alongside the frame.
#[derive(Debug, Clone)]
pub struct ClosedCaptionPacket {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct VideoPayload {
    /// Normalized BGRA8 pixels, tightly packed (no stride padding).
    pub pixels:  Vec<u8>,
    pub width:   u32,
    pub height:  u32,
    pub stride:  u32,
    pub closed_captions: Vec<ClosedCaptionPacket>,
}

#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// PCM16 interleaved stereo at 48 kHz, fixed after resampling (§3).
    pub samples: Vec<i16>,
}

#[derive(Debug, Clone)]
pub struct SubtitlePayload {
    pub lines:       Vec<String>,
    pub markup:      String,
    pub format_tag:  String,
}

#[derive(Debug, Clone)]
pub enum BlockPayload {
    Video(VideoPayload),
    Audio(AudioPayload),
    Subtitle(SubtitlePayload),
}

impl BlockPayload {
    pub fn kind(&self) -> StreamType {
        match self {
            BlockPayload::Video(_)    => StreamType::Video,
            BlockPayload::Audio(_)    => StreamType::Audio,
            BlockPayload::Subtitle(_) => StreamType::Subtitle,
        }
    }
}

/// A presentable unit (§3). `start_time`/`end_time` are absolute media time;
/// `duration` is always `end_time - start_time`.
#[derive(Debug, Clone)]
pub struct Block {
    pub start_time: Duration,
    pub end_time:   Duration,
    pub display_picture_number: Option<u64>,
    pub smpte_timecode:         Option<SmpteTimecode>,
    pub payload:                BlockPayload,
}

impl Block {
    pub fn new(start_time: Duration, end_time: Duration, payload: BlockPayload) -> Self {
        debug_assert!(end_time >= start_time, "Block end_time must not precede start_time");
        Self { start_time, end_time, display_picture_number: None, smpte_timecode: None, payload }
    }

    pub fn duration(&self) -> Duration {
        self.end_time.saturating_sub(self.start_time)
    }

    pub fn kind(&self) -> StreamType {
        self.payload.kind()
    }

    /// Does `[start_time, end_time)` contain `t`?
    pub fn contains(&self, t: Duration) -> bool {
        t >= self.start_time && t < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_block(start_ms: u64, end_ms: u64) -> Block {
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
    fn duration_is_end_minus_start() {
        let b = video_block(100, 140);
        assert_eq!(b.duration(), Duration::from_millis(40));
    }

    #[test]
    fn contains_is_half_open() {
        let b = video_block(100, 140);
        assert!(b.contains(Duration::from_millis(100)));
        assert!(b.contains(Duration::from_millis(139)));
        assert!(!b.contains(Duration::from_millis(140)));
        assert!(!b.contains(Duration::from_millis(99)));
    }
}
