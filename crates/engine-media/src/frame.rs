// crates/engine-media/src/frame.rs
//
// Frame: a decoded-but-not-yet-converted unit (§3). Short-lived — the
// Decoding Worker turns each one into a Block via `convert` and discards it.

use std::time::Duration;

use engine_types::StreamType;
use ffmpeg_the_third as ffmpeg;

pub enum Frame {
    Video(ffmpeg::util::frame::video::Video),
    Audio(ffmpeg::util::frame::audio::Audio),
    /// Subtitle packets are handled as raw bytes — ffmpeg-the-third has no
    /// dedicated subtitle frame type for the text codecs this engine
    /// supports (SRT/WebVTT/mov_text). `start`/`end` are carried from the
    /// packet's own pts/duration since the decoder never sees them.
    SubtitleText { text: String, start: Duration, end: Duration },
}

impl Frame {
    pub fn kind(&self) -> StreamType {
        match self {
            Frame::Video(_)           => StreamType::Video,
            Frame::Audio(_)           => StreamType::Audio,
            Frame::SubtitleText { .. } => StreamType::Subtitle,
        }
    }
}
