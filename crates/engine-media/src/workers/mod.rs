// crates/engine-media/src/workers/mod.rs
//
// The three long-lived cooperative workers (§4.E/F/G, §5): each owns a
// thread, runs a periodic cycle, and reads/writes `EngineShared` under its
// own locks. Grounded on the teacher's `worker.rs` — dedicated threads
// instead of async tasks, backpressure via blocking sends/locks rather than
// explicit sleeps where possible.

pub mod decoding;
pub mod reading;
pub mod rendering;

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::shared::EngineShared;

/// Handles for the three worker threads, joined on engine close/drop.
pub struct WorkerHandles {
    pub reading:   Option<JoinHandle<()>>,
    pub decoding:  Option<JoinHandle<()>>,
    pub rendering: Option<JoinHandle<()>>,
}

impl WorkerHandles {
    pub fn spawn(shared: Arc<EngineShared>) -> Self {
        let reading = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || reading::run(shared))
        };
        let decoding = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || decoding::run(shared))
        };
        let rendering = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || rendering::run(shared))
        };
        Self { reading: Some(reading), decoding: Some(decoding), rendering: Some(rendering) }
    }

    pub fn join(&mut self) {
        for handle in [self.reading.take(), self.decoding.take(), self.rendering.take()].into_iter().flatten() {
            let _ = handle.join();
        }
    }
}
