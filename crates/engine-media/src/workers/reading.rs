// crates/engine-media/src/workers/reading.rs
//
// Reading Worker (§4.E): pulls packets from the Container at a fixed
// cadence, respecting per-stream byte/duration budgets. Blocks on I/O
// inside `container.read()` (§5 suspension points) — that blocking call
// itself is the rate limiter; the cadence sleep just caps CPU spin when
// every stream is already over budget.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::container::ReadOutcome;
use crate::shared::EngineShared;

pub fn run(shared: Arc<EngineShared>) {
    let cadence = Duration::from_millis(shared.policy.read_cadence_ms);

    loop {
        if shared.should_stop() {
            return;
        }
        if shared.is_paused_for_command() {
            std::thread::sleep(cadence);
            continue;
        }

        let all_over_budget = {
            let container = shared.container.lock();
            let reference = shared.clock.position();
            let kinds = [engine_types::StreamType::Video, engine_types::StreamType::Audio, engine_types::StreamType::Subtitle];
            let mut any_open = false;
            let over = kinds.into_iter().all(|kind| {
                let indices = container.stream_indices_of(kind);
                if indices.is_empty() {
                    return true; // nothing of this kind to read; vacuously satisfied
                }
                any_open = true;
                indices.iter().all(|&idx| {
                    let (bytes, last_pts) = container.packet_queue_stats(idx);
                    bytes >= shared.policy.packet_queue_byte_budget
                        || last_pts.map(|pts| pts.saturating_sub(reference).as_secs_f64()
                            >= shared.policy.packet_queue_duration_budget_secs)
                            .unwrap_or(false)
                })
            });
            any_open && over
        };
        if all_over_budget {
            std::thread::sleep(cadence);
            continue;
        }

        let outcome = {
            let mut container = shared.container.lock();
            container.read()
        };

        match outcome {
            Ok(ReadOutcome::PacketRead { .. }) => {
                // Immediately loop again — decode cadence, not read cadence,
                // governs how fast frames actually get produced.
                shared.container_eof.store(false, Ordering::Release);
            }
            Ok(ReadOutcome::NeedsDelay) => {
                std::thread::sleep(cadence);
            }
            Ok(ReadOutcome::EndOfStream) => {
                shared.container_eof.store(true, Ordering::Release);
                std::thread::sleep(cadence);
            }
            Err(e) => {
                eprintln!("[reading] container.read() failed: {e}");
                if e.is_fatal() {
                    shared.request_fatal_close();
                    return;
                }
                std::thread::sleep(cadence);
            }
        }
    }
}
