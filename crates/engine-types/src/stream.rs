// crates/engine-types/src/stream.rs
//
// Stream-type tagging and per-open media metadata (MediaInfo, §3).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tagged variant of the kind of component a `Container` can expose.
///
/// `None` is the tag used for a `Packet`/`Frame` that could not be matched to
/// a known component — the Reading Worker drops these without queuing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
    Data,
    None,
}

impl StreamType {
    pub fn is_media(self) -> bool {
        matches!(self, StreamType::Video | StreamType::Audio | StreamType::Subtitle)
    }
}

/// Per-stream descriptor, reported once at Open and whenever `ChangeMedia`
/// selects a different component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub index:        usize,
    pub kind:         StreamType,
    pub codec:        String,
    pub bitrate:      Option<u64>,
    pub sample_rate:  Option<u32>,
    pub channels:     Option<u16>,
    pub pixel_format: Option<String>,
    pub frame_rate:   Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub rotation:     i32,
    pub metadata:     HashMap<String, String>,
}

impl StreamDescriptor {
    pub fn is_main_candidate(&self) -> bool {
        matches!(self.kind, StreamType::Video | StreamType::Audio)
    }
}

/// Snapshot of everything the `Container` knows about an opened media,
/// per §3 "Media Info".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration:          Option<Duration>,
    pub is_seekable:       bool,
    pub streams:           Vec<StreamDescriptor>,
    pub container_format:  String,
    pub total_size_bytes:  Option<u64>,
    pub is_network:        bool,
    pub is_live:           bool,
}

impl MediaInfo {
    /// The Main component per §3: prefer Video, else Audio, else the first
    /// playable stream. Returns `None` if nothing is playable (`NoStreams`).
    pub fn main_stream(&self) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.kind == StreamType::Video)
            .or_else(|| self.streams.iter().find(|s| s.kind == StreamType::Audio))
            .or_else(|| self.streams.iter().find(|s| s.kind.is_media()))
    }

    pub fn stream_of(&self, kind: StreamType) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.kind == kind)
    }

    pub fn has(&self, kind: StreamType) -> bool {
        self.stream_of(kind).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(kind: StreamType) -> StreamDescriptor {
        StreamDescriptor {
            index: 0, kind, codec: "test".into(), bitrate: None,
            sample_rate: None, channels: None, pixel_format: None,
            frame_rate: None, aspect_ratio: None, rotation: 0,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn main_stream_prefers_video() {
        let info = MediaInfo {
            duration: None, is_seekable: true,
            streams: vec![desc(StreamType::Audio), desc(StreamType::Video)],
            container_format: "mp4".into(), total_size_bytes: None,
            is_network: false, is_live: false,
        };
        assert_eq!(info.main_stream().unwrap().kind, StreamType::Video);
    }

    #[test]
    fn main_stream_falls_back_to_audio() {
        let info = MediaInfo {
            duration: None, is_seekable: true,
            streams: vec![desc(StreamType::Audio)],
            container_format: "mp3".into(), total_size_bytes: None,
            is_network: false, is_live: false,
        };
        assert_eq!(info.main_stream().unwrap().kind, StreamType::Audio);
    }

    #[test]
    fn main_stream_none_when_no_media() {
        let info = MediaInfo {
            duration: None, is_seekable: false,
            streams: vec![desc(StreamType::Data)],
            container_format: "raw".into(), total_size_bytes: None,
            is_network: false, is_live: false,
        };
        assert!(info.main_stream().is_none());
    }
}
