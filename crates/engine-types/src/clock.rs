// crates/engine-types/src/clock.rs
//
// MediaClock: monotonic wall clock adjusted for speed ratio and seek (§4.B).
//
//   position = offset + (now - started_at) * speed_ratio   while running
//            = offset                                       while paused
//
// Setting speed_ratio preserves `position` at the instant of the switch —
// `offset` absorbs whatever had accumulated under the old ratio so the next
// read is continuous.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub const MIN_SPEED_RATIO: f64 = 0.0; // exclusive lower bound
pub const MAX_SPEED_RATIO: f64 = 8.0; // inclusive upper bound

fn dur_to_bits(d: Duration) -> u64 {
    d.as_nanos() as u64
}

fn bits_to_dur(b: u64) -> Duration {
    Duration::from_nanos(b)
}

struct Inner {
    /// Position at the last `started_at` anchor (or the frozen position, if paused).
    offset:      Duration,
    started_at:  Instant,
}

pub struct MediaClock {
    inner:       Mutex<Inner>,
    running:     AtomicBool,
    // Stored as fixed-point bits via `f64::to_bits` since `AtomicF64` doesn't exist.
    speed_bits:  AtomicU64,
    // The most recently published position, for `position_bits_hint` fast-paths.
    last_bits:   AtomicU64,
}

impl MediaClock {
    pub fn new() -> Self {
        Self {
            inner:      Mutex::new(Inner { offset: Duration::ZERO, started_at: Instant::now() }),
            running:    AtomicBool::new(false),
            speed_bits: AtomicU64::new(1.0_f64.to_bits()),
            last_bits:  AtomicU64::new(dur_to_bits(Duration::ZERO)),
        }
    }

    pub fn speed_ratio(&self) -> f64 {
        f64::from_bits(self.speed_bits.load(Ordering::Acquire))
    }

    /// Set the speed ratio. Rejects anything outside `(0, 8]` (§3 boundary
    /// behavior, §8 testable property). Preserves `position` at the switch
    /// instant by folding the elapsed-since-anchor delta into `offset`.
    pub fn set_speed_ratio(&self, ratio: f64) -> Result<(), crate::error::EngineError> {
        if !(ratio > MIN_SPEED_RATIO && ratio <= MAX_SPEED_RATIO) {
            return Err(crate::error::EngineError::InvalidArgument(format!(
                "speed_ratio must be in (0, {MAX_SPEED_RATIO}], got {ratio}"
            )));
        }
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if self.running.load(Ordering::Acquire) {
            let old_ratio = self.speed_ratio();
            let elapsed = now.saturating_duration_since(inner.started_at);
            inner.offset += elapsed.mul_f64(old_ratio);
            inner.started_at = now;
        }
        self.speed_bits.store(ratio.to_bits(), Ordering::Release);
        Ok(())
    }

    pub fn position(&self) -> Duration {
        let inner = self.inner.lock();
        let pos = if self.running.load(Ordering::Acquire) {
            let elapsed = Instant::now().saturating_duration_since(inner.started_at);
            inner.offset + elapsed.mul_f64(self.speed_ratio())
        } else {
            inner.offset
        };
        self.last_bits.store(dur_to_bits(pos), Ordering::Release);
        pos
    }

    /// Last position computed by `position()`, without touching the system
    /// clock — used for log lines where a stale-by-one-cycle value is fine.
    pub fn last_known_position(&self) -> Duration {
        bits_to_dur(self.last_bits.load(Ordering::Acquire))
    }

    /// Used on seek: freezes/resumes the anchor at `t` without altering the
    /// running/paused state.
    pub fn set_position(&self, t: Duration) {
        let mut inner = self.inner.lock();
        inner.offset = t;
        inner.started_at = Instant::now();
    }

    pub fn play(&self) {
        let mut inner = self.inner.lock();
        if !self.running.swap(true, Ordering::AcqRel) {
            inner.started_at = Instant::now();
        }
    }

    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if self.running.swap(false, Ordering::AcqRel) {
            let elapsed = Instant::now().saturating_duration_since(inner.started_at);
            inner.offset += elapsed.mul_f64(self.speed_ratio());
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for MediaClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn paused_clock_is_frozen() {
        let c = MediaClock::new();
        c.set_position(Duration::from_secs(5));
        let p1 = c.position();
        sleep(Duration::from_millis(20));
        let p2 = c.position();
        assert_eq!(p1, p2);
    }

    #[test]
    fn running_clock_advances() {
        let c = MediaClock::new();
        c.play();
        sleep(Duration::from_millis(30));
        assert!(c.position() >= Duration::from_millis(25));
    }

    #[test]
    fn pause_then_play_resumes_from_frozen_position() {
        let c = MediaClock::new();
        c.play();
        sleep(Duration::from_millis(20));
        c.pause();
        let frozen = c.position();
        sleep(Duration::from_millis(20));
        assert_eq!(c.position(), frozen);
        c.play();
        sleep(Duration::from_millis(20));
        assert!(c.position() > frozen);
    }

    #[test]
    fn set_speed_ratio_rejects_zero_and_out_of_range() {
        let c = MediaClock::new();
        assert!(c.set_speed_ratio(0.0).is_err());
        assert!(c.set_speed_ratio(-1.0).is_err());
        assert!(c.set_speed_ratio(8.1).is_err());
        assert!(c.set_speed_ratio(8.0).is_ok());
        assert!(c.set_speed_ratio(0.25).is_ok());
    }

    #[test]
    fn speed_change_preserves_position_at_switch_instant() {
        let c = MediaClock::new();
        c.play();
        c.set_speed_ratio(2.0).unwrap();
        let before = c.position();
        c.set_speed_ratio(1.0).unwrap();
        let after = c.position();
        assert!((after.as_secs_f64() - before.as_secs_f64()).abs() < 0.01);
    }
}
