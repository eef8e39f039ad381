// crates/engine-media/src/workers/decoding.rs
//
// Decoding Worker (§4.F): drains decoded frames from the Container,
// converts each to a Block, and inserts it into the owning stream's
// BlockBuffer. Seek decoding (decode-without-render until the target lands)
// is handled here too, driven by `EngineShared::seeking`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use engine_types::StreamType;

use crate::shared::EngineShared;

pub fn run(shared: Arc<EngineShared>) {
    let cadence = Duration::from_millis(shared.policy.decode_cadence_ms);
    let mut seek_target: Option<Duration> = None;

    loop {
        if shared.should_stop() {
            return;
        }
        if shared.is_paused_for_command() {
            std::thread::sleep(cadence);
            continue;
        }

        if shared.seeking.load(Ordering::Acquire) && seek_target.is_none() {
            seek_target = Some(shared.clock.position());
        } else if !shared.seeking.load(Ordering::Acquire) {
            seek_target = None;
        }

        // Backpressure (§4.F step 2): stall once the main buffer is full and
        // the playhead is already inside it, rather than decode further
        // ahead than anything can consume.
        if seek_target.is_none() {
            if let Some(kind) = *shared.main_kind.lock() {
                if let Some(buffer) = shared.buffer_for(kind) {
                    let t = shared.clock.position();
                    let playhead_inside = buffer.range().map(|r| t >= r.start && t < r.end).unwrap_or(false);
                    if buffer.is_full() && playhead_inside {
                        std::thread::sleep(cadence);
                        continue;
                    }
                }
            }
        }

        let frames = {
            let mut container = shared.container.lock();
            container.decode()
        };

        match frames {
            Ok(frames) => {
                for (stream_index, frame) in frames {
                    if shared.is_stream_disabled(stream_index) {
                        continue;
                    }
                    let kind = frame.kind();
                    let block = {
                        let mut container = shared.container.lock();
                        container.convert(stream_index, frame)
                    };
                    match block {
                        Ok(block) => {
                            shared.clear_decode_errors(stream_index);
                            // During seek-decode, discard blocks before the target
                            // (§4.F: "discard earlier blocks after the first
                            // keyframe") — once one contains the target, evict the
                            // seeking flag so Rendering can resume normal flow.
                            if let Some(target) = seek_target {
                                if !block.contains(target) && block.end_time < target {
                                    continue;
                                }
                            }
                            if let Some(buffer) = shared.buffer_for(kind) {
                                let _ = buffer.insert(block);
                            }
                            // The seek completes once the Main stream (whichever
                            // kind that is — audio-only media has no video block
                            // to key off of) produces a block covering the target.
                            if seek_target.is_some() && Some(kind) == *shared.main_kind.lock() {
                                shared.seeking.store(false, Ordering::Release);
                                seek_target = None;
                            }
                        }
                        Err(e) => {
                            eprintln!("[decoding] convert failed on stream {stream_index}: {e}");
                            let disabled = shared.record_decode_error(stream_index);
                            if disabled {
                                eprintln!("[decoding] stream {stream_index} disabled after repeated decode errors");
                            }
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("[decoding] container.decode() failed: {e}");
                if e.is_fatal() {
                    shared.request_fatal_close();
                    return;
                }
            }
        }

        evict_look_behind(&shared);
        std::thread::sleep(cadence);
    }
}

/// §4.F step 4: once the main buffer's range reaches the playhead plus
/// look-ahead, drop blocks the playhead has fully passed, keeping each
/// buffer's memory bounded to the retention window rather than its capacity.
fn evict_look_behind(shared: &EngineShared) {
    let Some(main_kind) = *shared.main_kind.lock() else { return };
    let Some(main_buffer) = shared.buffer_for(main_kind) else { return };
    let t = shared.clock.position();
    let within_look_ahead = main_buffer.range()
        .map(|r| r.end >= t + Duration::from_secs_f64(shared.policy.look_ahead_secs))
        .unwrap_or(false);
    if !within_look_ahead {
        return;
    }
    let cutoff = t.saturating_sub(Duration::from_secs_f64(shared.policy.look_behind_secs));
    for kind in [StreamType::Video, StreamType::Audio, StreamType::Subtitle] {
        if let Some(buffer) = shared.buffer_for(kind) {
            buffer.evict_older_than(cutoff);
        }
    }
}
