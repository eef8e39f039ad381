// crates/engine-types/src/state.rs
//
// EngineState: the aggregated, read-mostly snapshot described in §3 "Engine
// State" and §4.I, plus the MediaState transition machine of §4.H. Follows
// the teacher's ProjectState pattern (plain serde-derived struct, Default
// impl, single writer updates it wholesale).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stream::StreamType;

/// Top-level playback state (§4.H state diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaState {
    Close,
    Open,
    Play,
    Pause,
    Stop,
}

impl Default for MediaState {
    fn default() -> Self {
        MediaState::Close
    }
}

impl MediaState {
    /// Validates one step of the §4.H diagram. `Seek` is a substate
    /// overlay handled separately (`EngineState::is_seeking`), not a
    /// `MediaState` value, so it is not represented here.
    pub fn can_transition_to(self, next: MediaState) -> bool {
        use MediaState::*;
        match (self, next) {
            (_, Close)            => true,
            (Close, Open)         => true,
            (Open, Stop)          => true,
            (Stop, Play)          => true,
            (Play, Pause)         => true,
            (Pause, Play)         => true,
            (Play, Stop) | (Pause, Stop) => true,
            (a, b) if a == b      => true,
            _                     => false,
        }
    }
}

/// What happens at Main end-of-stream (§4.H "Main EOS" row), selected by
/// the caller via `MediaEngine::set_looping` / policy, not hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndOfStreamAction {
    Pause,
    Loop,
    Stop,
    Close,
}

impl Default for EndOfStreamAction {
    fn default() -> Self {
        EndOfStreamAction::Pause
    }
}

/// Aggregated, read-mostly snapshot (§3, §4.I). Published by a single
/// writer (Rendering Worker state-update tick) at ~33ms cadence plus on
/// transitions; consumed by many readers via `MediaEngine::state()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub media_state: MediaState,

    pub position:           Duration,
    pub frame_position:     Option<u64>,
    pub natural_duration:   Option<Duration>,
    pub playback_start_time: Option<Duration>,
    pub playback_end_time:   Option<Duration>,

    pub buffering_progress: f64, // 0..1
    pub download_progress:  f64, // 0..1
    pub packet_buffer_length: u64,
    pub packet_buffer_count:  u64,
    pub decoding_bitrate:      f64,

    pub is_buffering: bool,
    pub is_seeking:   bool,
    pub is_opening:   bool,
    pub is_changing:  bool,

    pub has_audio:           bool,
    pub has_video:           bool,
    pub has_subtitles:       bool,
    pub has_closed_captions: bool,

    pub volume:       f64, // 0..1
    pub balance:      f64, // -1..1
    pub is_muted:     bool,
    pub speed_ratio:  f64, // (0, 8]
    pub is_looping:   bool,

    pub video_info: Option<String>,
    pub audio_info: Option<String>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            media_state: MediaState::default(),
            position: Duration::ZERO,
            frame_position: None,
            natural_duration: None,
            playback_start_time: None,
            playback_end_time: None,
            buffering_progress: 0.0,
            download_progress: 0.0,
            packet_buffer_length: 0,
            packet_buffer_count: 0,
            decoding_bitrate: 0.0,
            is_buffering: false,
            is_seeking: false,
            is_opening: false,
            is_changing: false,
            has_audio: false,
            has_video: false,
            has_subtitles: false,
            has_closed_captions: false,
            volume: 1.0,
            balance: 0.0,
            is_muted: false,
            speed_ratio: 1.0,
            is_looping: false,
            video_info: None,
            audio_info: None,
        }
    }
}

impl EngineState {
    pub fn has_stream(&self, kind: StreamType) -> bool {
        match kind {
            StreamType::Video    => self.has_video,
            StreamType::Audio    => self.has_audio,
            StreamType::Subtitle => self.has_subtitles,
            _                    => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MediaState::*;

    #[test]
    fn default_state_is_closed() {
        assert_eq!(EngineState::default().media_state, Close);
    }

    #[test]
    fn valid_transport_transitions_are_allowed() {
        assert!(Close.can_transition_to(Open));
        assert!(Open.can_transition_to(Stop));
        assert!(Stop.can_transition_to(Play));
        assert!(Play.can_transition_to(Pause));
        assert!(Pause.can_transition_to(Play));
        assert!(Play.can_transition_to(Stop));
        assert!(Pause.can_transition_to(Stop));
    }

    #[test]
    fn close_is_reachable_from_any_state() {
        for s in [Close, Open, Play, Pause, Stop] {
            assert!(s.can_transition_to(Close));
        }
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert!(!Close.can_transition_to(Play));
        assert!(!Stop.can_transition_to(Pause));
        assert!(!Open.can_transition_to(Play));
    }
}
