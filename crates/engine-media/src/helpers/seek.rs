// crates/engine-media/src/helpers/seek.rs
//
// Seek helper wrapping ffmpeg's avformat seek with consistent Windows EPERM
// soft-fail behaviour.
//
// Background:
//   On Windows, `avformat_seek_file` returns EPERM ("Operation not permitted")
//   in certain conditions — notably when called on a freshly-opened context
//   with max_ts=0, or on some container formats that don't support random
//   access.
//
//   Rather than duplicating the guard + eprintln pattern at every call site,
//   all seeks route through here. The caller chooses how to handle failure
//   via the return value — hard error vs soft-fail is a policy decision at
//   the call site, not here.

use ffmpeg_the_third as ffmpeg;

/// Seek `ictx` to `target_secs` seconds from the start of the file.
///
/// Returns `true` if the seek succeeded (or the context was already at
/// position 0 and the seek-to-0 call failed for that reason — see below).
/// Returns `false` if the seek failed — the demuxer will decode from wherever
/// it currently is, and the caller's PTS-based frame filtering will skip
/// pre-roll frames correctly.
///
/// # Why backward seek (`..=seek_ts`)
/// A forward seek (`seek_ts..`) lands on the keyframe AT OR AFTER `target_secs`.
/// When `target_secs` falls mid-GOP, that forward keyframe may be several
/// seconds away, producing a visible freeze while frames between the target
/// and the keyframe are simply absent from the decode stream.
///
/// A backward seek lands on the keyframe BEFORE `target_secs`. Pre-roll
/// frames are discarded by the caller's PTS filter, so the first rendered
/// frame is still correctly at `target_secs`.
///
/// # Target 0.0 always attempts a real seek
/// `avformat_seek_file(max_ts=0)` returns EPERM on Windows when called on a
/// freshly-opened context that hasn't read any packets yet — that's already
/// where the demuxer sits, so we treat that specific failure as success.
/// A context that has since read forward must still actually rewind, so the
/// seek call itself is never skipped.
pub fn seek_to_secs(
    ictx: &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label: &str,   // caller description for log messages, e.g. "container::seek"
) -> bool {
    let target_secs = target_secs.max(0.0);
    let seek_ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    match ictx.seek(seek_ts, ..=seek_ts) {
        Ok(()) => true,
        Err(e) => {
            if target_secs == 0.0 {
                return true;
            }
            eprintln!(
                "[seek] soft-fail in {label} at {target_secs:.3}s: {e} \
                 — decoding from current position, PTS filter will skip pre-roll"
            );
            false
        }
    }
}
