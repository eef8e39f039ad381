// crates/engine-media/src/shared.rs
//
// EngineShared: state visible to all three workers and the command
// executor (§5 Shared resources). A single `Arc<EngineShared>` is cloned
// into each worker thread at spawn time — the teacher's MediaWorker does
// the same with its frame-request slot and cancel-flag maps, just for a
// simpler single-clip pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use engine_types::{BlockBuffer, EndOfStreamAction, EngineCommand, EngineState, EnginePolicy, MediaClock, MediaConnector, NullConnector, StreamType};
use parking_lot::{Mutex, RwLock};

use crate::command_queue::CommandQueue;
use crate::container::Container;
use crate::renderer::RendererSet;

pub struct EngineShared {
    pub container: Mutex<Box<dyn Container>>,
    pub video_buffer:    BlockBuffer,
    pub audio_buffer:    BlockBuffer,
    pub subtitle_buffer: BlockBuffer,
    pub clock:  MediaClock,
    pub policy: EnginePolicy,
    pub state:  Mutex<EngineState>,
    pub connector: RwLock<Arc<dyn MediaConnector>>,
    pub renderers: RwLock<RendererSet>,

    /// Set once a stream is open; `None` while Closed.
    pub main_kind: Mutex<Option<StreamType>>,
    /// Consecutive decode errors per stream index (§7 error budget).
    pub decode_error_counts: Mutex<HashMap<usize, u32>>,
    /// Streams disabled after exceeding `policy.max_consecutive_decode_errors`.
    pub disabled_streams: Mutex<std::collections::HashSet<usize>>,

    pub end_of_stream_action: Mutex<EndOfStreamAction>,
    pub is_looping: AtomicBool,

    /// Workers idle cooperatively when this is set (§5 cancellation model);
    /// cleared when the command executor restarts them after a Blocking op.
    pub workers_paused: AtomicBool,
    /// Process-wide shutdown — workers exit their loops entirely.
    pub shutdown: AtomicBool,

    /// True while a Seek is in flight; the Decoding Worker is in seek-decode
    /// mode (decode-without-render until the target block lands), and the
    /// Rendering Worker withholds position updates (§4.I).
    pub seeking: AtomicBool,

    /// Whether the currently open media supports random-access seek; Stop
    /// only resets position to 0 when this is true (§4.H).
    pub is_seekable: AtomicBool,

    /// Mirrors `Container::is_at_end_of_stream` (§4.G step 5): set by the
    /// Reading Worker once `read()` reports `EndOfStream`, cleared on a new
    /// `Open`/`Seek` so the Rendering Worker doesn't need to lock the
    /// container just to check it every cycle.
    pub container_eof: AtomicBool,

    /// Set once, right after construction, so a worker that hits a fatal
    /// error can request a close through the normal command path (§7)
    /// instead of tearing down state itself.
    pub command_queue: std::sync::OnceLock<Arc<CommandQueue>>,
}

impl EngineShared {
    pub fn new(container: Box<dyn Container>, policy: EnginePolicy) -> Self {
        Self {
            video_buffer:    BlockBuffer::new(policy.video_buffer_capacity),
            audio_buffer:    BlockBuffer::new(policy.audio_buffer_capacity),
            subtitle_buffer: BlockBuffer::new(policy.subtitle_buffer_capacity),
            container: Mutex::new(container),
            policy,
            state: Mutex::new(EngineState::default()),
            connector: RwLock::new(Arc::new(NullConnector)),
            renderers: RwLock::new(RendererSet::default()),
            clock: MediaClock::new(),
            main_kind: Mutex::new(None),
            decode_error_counts: Mutex::new(HashMap::new()),
            disabled_streams: Mutex::new(std::collections::HashSet::new()),
            end_of_stream_action: Mutex::new(EndOfStreamAction::default()),
            is_looping: AtomicBool::new(false),
            workers_paused: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            seeking: AtomicBool::new(false),
            is_seekable: AtomicBool::new(true),
            container_eof: AtomicBool::new(false),
            command_queue: std::sync::OnceLock::new(),
        }
    }

    /// Ask the command executor to close as if the embedder had called
    /// `close()` — the path a worker takes after a fatal error (§7), rather
    /// than tearing down shared state from inside the worker thread.
    pub fn request_fatal_close(&self) {
        match self.command_queue.get() {
            Some(queue) => { queue.submit(EngineCommand::Close { id: uuid::Uuid::new_v4() }); }
            None => eprintln!("[shared] fatal close requested before command queue was wired up"),
        }
    }

    pub fn buffer_for(&self, kind: StreamType) -> Option<&BlockBuffer> {
        match kind {
            StreamType::Video    => Some(&self.video_buffer),
            StreamType::Audio    => Some(&self.audio_buffer),
            StreamType::Subtitle => Some(&self.subtitle_buffer),
            _ => None,
        }
    }

    pub fn is_stream_disabled(&self, stream_index: usize) -> bool {
        self.disabled_streams.lock().contains(&stream_index)
    }

    /// Record a decode failure; returns true if the stream just crossed the
    /// disable threshold (§7).
    pub fn record_decode_error(&self, stream_index: usize) -> bool {
        let mut counts = self.decode_error_counts.lock();
        let count = counts.entry(stream_index).or_insert(0);
        *count += 1;
        if *count >= self.policy.max_consecutive_decode_errors {
            self.disabled_streams.lock().insert(stream_index);
            true
        } else {
            false
        }
    }

    pub fn clear_decode_errors(&self, stream_index: usize) {
        self.decode_error_counts.lock().remove(&stream_index);
    }

    pub fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn is_paused_for_command(&self) -> bool {
        self.workers_paused.load(Ordering::Acquire)
    }
}
