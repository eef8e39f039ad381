// crates/engine-types/src/policy.rs
//
// EnginePolicy: every tunable named in §4.E-§4.H collected into one config
// struct instead of scattered constants, following the teacher's
// ProjectState-style serde + Default config pattern.

use serde::{Deserialize, Serialize};

/// Tunables governing buffering, cadence and fault tolerance. Constructed
/// with calibrated defaults; callers override only what they need to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Capacity of the video BlockBuffer, in Blocks.
    pub video_buffer_capacity:    usize,
    /// Capacity of the audio BlockBuffer, in Blocks.
    pub audio_buffer_capacity:    usize,
    /// Capacity of the subtitle BlockBuffer, in Blocks.
    pub subtitle_buffer_capacity: usize,

    /// Byte budget for the Reading Worker's packet queue (§4.E).
    pub packet_queue_byte_budget: u64,
    /// Duration budget for the Reading Worker's packet queue, ahead of
    /// the clock's current position.
    pub packet_queue_duration_budget_secs: f64,

    /// Reading Worker poll cadence.
    pub read_cadence_ms:   u64,
    /// Decoding Worker poll cadence.
    pub decode_cadence_ms: u64,
    /// Minimum Rendering Worker tick rate; the loop runs faster when a
    /// renderer reports a higher natural refresh rate.
    pub min_render_hz: f64,

    /// How far ahead of the clock the Decoding Worker tries to keep each
    /// BlockBuffer filled, in seconds.
    pub look_ahead_secs:  f64,
    /// How far behind the clock blocks are retained before eviction.
    pub look_behind_secs: f64,

    /// Buffering-state low water mark, as a fraction of target buffer fill.
    pub low_water_mark:  f64,
    /// Buffering-state recovery ("full enough to resume") water mark.
    pub full_water_mark: f64,

    /// Consecutive decode errors on one stream before it is disabled for
    /// the remainder of playback (§7).
    pub max_consecutive_decode_errors: u32,

    /// Reserved: no pitch-correction implementation ships (§9 Open
    /// Question #1). Kept so a future renderer can opt in without an
    /// EnginePolicy layout break.
    pub pitch_correction: bool,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            video_buffer_capacity:    18,
            audio_buffer_capacity:    48,
            subtitle_buffer_capacity: 16,

            packet_queue_byte_budget: 16 * 1024 * 1024,
            packet_queue_duration_budget_secs: 4.0,

            read_cadence_ms:   25,
            decode_cadence_ms: 10,
            min_render_hz:     60.0,

            look_ahead_secs:  2.0,
            look_behind_secs: 1.0,

            low_water_mark:  0.1,
            full_water_mark: 0.75,

            max_consecutive_decode_errors: 16,

            pitch_correction: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calibrated_constants() {
        let p = EnginePolicy::default();
        assert_eq!(p.video_buffer_capacity, 18);
        assert_eq!(p.audio_buffer_capacity, 48);
        assert_eq!(p.subtitle_buffer_capacity, 16);
        assert_eq!(p.max_consecutive_decode_errors, 16);
        assert!(!p.pitch_correction);
    }

    #[test]
    fn water_marks_are_ordered() {
        let p = EnginePolicy::default();
        assert!(p.low_water_mark < p.full_water_mark);
    }
}
