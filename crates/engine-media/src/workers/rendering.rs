// crates/engine-media/src/workers/rendering.rs
//
// Rendering Worker (§4.G): the single writer of EngineState, drives the
// buffering gate, end-of-stream transition, and per-cycle render/update
// dispatch to whichever renderers are registered.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_types::{EndOfStreamAction, MediaState, StreamType};

use crate::shared::EngineShared;

const STATE_PUBLISH_CADENCE: Duration = Duration::from_millis(33);

pub fn run(shared: Arc<EngineShared>) {
    let cycle = Duration::from_secs_f64(1.0 / shared.policy.min_render_hz.max(1.0));
    let mut last_video_start: Option<Duration> = None;
    let mut last_audio_start: Option<Duration> = None;
    let mut last_subtitle_start: Option<Duration> = None;
    let mut last_state_publish = Instant::now();

    loop {
        if shared.should_stop() {
            return;
        }
        if shared.is_paused_for_command() {
            std::thread::sleep(cycle);
            continue;
        }

        let media_state = shared.state.lock().media_state;
        if media_state == MediaState::Close {
            std::thread::sleep(cycle);
            continue;
        }

        let is_buffering = update_buffering_gate(&shared);

        if is_buffering || media_state != MediaState::Play {
            dispatch_update_only(&shared, shared.clock.position());
            maybe_publish_state(&shared, &mut last_state_publish, is_buffering);
            std::thread::sleep(cycle);
            continue;
        }

        let t = shared.clock.position();

        dispatch_render(&shared, StreamType::Video, t, &mut last_video_start);
        // §9: no pitch correction at non-unity speed, so audio is muted
        // rather than played back pitch-shifted.
        if (shared.clock.speed_ratio() - 1.0).abs() < f64::EPSILON {
            dispatch_render(&shared, StreamType::Audio, t, &mut last_audio_start);
        } else {
            dispatch_update_only_kind(&shared, StreamType::Audio, t);
        }
        dispatch_render(&shared, StreamType::Subtitle, t, &mut last_subtitle_start);

        // §4.G step 5: end-of-stream fires only once the playhead has
        // consumed everything buffered AND the container has nothing left
        // to read — otherwise a transient decode underrun (playhead
        // catching up to the last buffered block while more is still
        // coming) would be mistaken for the end of the media.
        if let Some(end) = shared.video_buffer.range().map(|r| r.end).or_else(|| shared.audio_buffer.range().map(|r| r.end)) {
            if t >= end && shared.container_eof.load(Ordering::Acquire) {
                handle_end_of_stream(&shared);
            }
        }

        maybe_publish_state(&shared, &mut last_state_publish, is_buffering);
        std::thread::sleep(cycle);
    }
}

fn dispatch_render(shared: &EngineShared, kind: StreamType, t: Duration, last_start: &mut Option<Duration>) {
    let Some(buffer) = shared.buffer_for(kind) else { return };
    let renderers = shared.renderers.read();
    let Some(renderer) = renderers.for_kind(kind) else { return };

    match buffer.get(t) {
        Some(block) => {
            let changed = last_start.map(|s| s != block.start_time).unwrap_or(true);
            let result = if changed {
                *last_start = Some(block.start_time);
                renderer.render(&block, t)
            } else {
                renderer.update(t)
            };
            if let Err(e) = result {
                eprintln!("[rendering] renderer failed on {kind:?}: {e}");
            }
        }
        None => {
            let _ = renderer.update(t);
        }
    }
}

fn dispatch_update_only(shared: &EngineShared, t: Duration) {
    let renderers = shared.renderers.read();
    for kind in [StreamType::Video, StreamType::Audio, StreamType::Subtitle] {
        if let Some(renderer) = renderers.for_kind(kind) {
            let _ = renderer.update(t);
        }
    }
}

fn dispatch_update_only_kind(shared: &EngineShared, kind: StreamType, t: Duration) {
    let renderers = shared.renderers.read();
    if let Some(renderer) = renderers.for_kind(kind) {
        let _ = renderer.update(t);
    }
}

/// §4.G buffering gate: enter when the Main buffer is exhausted at the
/// playhead; exit once it is full enough or strictly contains the playhead.
fn update_buffering_gate(shared: &EngineShared) -> bool {
    let main_kind = shared.main_kind.lock().unwrap_or(StreamType::Video);
    let Some(buffer) = shared.buffer_for(main_kind) else { return false };
    let t = shared.clock.position();

    let mut state = shared.state.lock();
    let progress = buffer.count() as f64 / buffer.capacity().max(1) as f64;

    let at_or_past_end = buffer.range().map(|r| t >= r.end).unwrap_or(true);
    let should_enter = progress < shared.policy.low_water_mark && at_or_past_end;
    let should_exit = progress >= shared.policy.full_water_mark
        || buffer.range().map(|r| t > r.start && t < r.end).unwrap_or(false);

    if !state.is_buffering && should_enter {
        state.is_buffering = true;
        drop(state);
        shared.connector.read().on_buffering_started();
    } else if state.is_buffering && should_exit {
        state.is_buffering = false;
        drop(state);
        shared.connector.read().on_buffering_ended();
    }
    shared.state.lock().is_buffering
}

fn handle_end_of_stream(shared: &EngineShared) {
    shared.clock.pause();
    shared.connector.read().on_media_ended();

    let action = *shared.end_of_stream_action.lock();
    let mut state = shared.state.lock();
    let old = state.media_state;
    state.media_state = match action {
        EndOfStreamAction::Pause => MediaState::Pause,
        EndOfStreamAction::Loop  => MediaState::Play,
        EndOfStreamAction::Stop  => MediaState::Stop,
        EndOfStreamAction::Close => MediaState::Close,
    };
    let new = state.media_state;
    drop(state);

    if matches!(action, EndOfStreamAction::Loop) {
        shared.clock.set_position(Duration::ZERO);
        shared.clock.play();
    }
    if old != new {
        shared.connector.read().on_media_state_changed(old, new);
    }
}

fn maybe_publish_state(shared: &EngineShared, last_publish: &mut Instant, is_buffering: bool) {
    if last_publish.elapsed() < STATE_PUBLISH_CADENCE {
        return;
    }
    *last_publish = Instant::now();

    let position = shared.clock.position();
    let mut state = shared.state.lock();
    let old_position = state.position;
    if !shared.seeking.load(Ordering::Acquire) {
        state.position = position;
    }
    state.is_buffering = is_buffering;
    state.speed_ratio = shared.clock.speed_ratio();
    let new_position = state.position;
    drop(state);

    if !shared.seeking.load(Ordering::Acquire) && old_position != new_position {
        shared.connector.read().on_position_changed(old_position, new_position);
    }
}
