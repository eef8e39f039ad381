// crates/engine-media/src/command_queue.rs
//
// CommandQueue: single-executor dispatcher for reified transport commands
// (§4.H). One dedicated thread drains the queue; Direct commands coalesce,
// Priority (Seek) commands replace their predecessor, Blocking commands
// (Open/Close/ChangeMedia) pause the workers before running exclusively.
//
// Grounded on the teacher's `MediaWorker` playback-thread pattern (a
// crossbeam channel feeding a single consumer thread) generalized from one
// fixed command type to the priority/coalescing rules §4.H specifies.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use engine_types::{CommandPriority, EngineCommand};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::engine::EngineInner;

/// Handed back to the caller when a command is submitted; `wait()` blocks
/// until the executor finishes it (§4.H "completion handle").
pub struct CompletionHandle {
    rx: Receiver<Result<(), engine_types::EngineError>>,
}

impl CompletionHandle {
    pub fn wait(self) -> Result<(), engine_types::EngineError> {
        self.rx.recv().unwrap_or(Err(engine_types::EngineError::Cancelled))
    }
}

struct Pending {
    command:    EngineCommand,
    completion: Sender<Result<(), engine_types::EngineError>>,
}

pub struct CommandQueue {
    queue: Mutex<VecDeque<Pending>>,
    notify_tx: Sender<()>,
    notify_rx: Receiver<()>,
    in_flight_seek_cancel: Mutex<Option<Arc<std::sync::atomic::AtomicBool>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (notify_tx, notify_rx) = bounded(64);
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify_tx, notify_rx,
            in_flight_seek_cancel: Mutex::new(None),
        }
    }

    /// Submit a command, applying §4.H's coalescing/replacement rules, and
    /// return a handle the caller may `wait()` on.
    pub fn submit(&self, command: EngineCommand) -> CompletionHandle {
        let (tx, rx) = bounded(1);
        let mut queue = self.queue.lock();

        match command.priority() {
            CommandPriority::Direct => {
                if let Some(key) = command.coalesce_key() {
                    queue.retain(|p| p.command.coalesce_key() != Some(key));
                }
            }
            CommandPriority::Priority => {
                queue.retain(|p| !matches!(p.command, EngineCommand::Seek { .. }));
                if let Some(cancel) = self.in_flight_seek_cancel.lock().as_ref() {
                    cancel.store(true, Ordering::Release);
                }
            }
            CommandPriority::Blocking => {
                // Drains the queue outright — nothing queued before an Open/
                // Close/ChangeMedia matters once it runs.
                for dropped in queue.drain(..) {
                    let _ = dropped.completion.send(Err(engine_types::EngineError::Cancelled));
                }
            }
        }

        queue.push_back(Pending { command, completion: tx });
        drop(queue);
        let _ = self.notify_tx.try_send(());
        CompletionHandle { rx }
    }

    /// Run forever on the executor thread, dispatching one command at a
    /// time against `inner`.
    pub fn run(self: Arc<Self>, inner: Arc<EngineInner>) {
        loop {
            if inner.shared.should_stop() {
                return;
            }
            let pending = {
                let mut queue = self.queue.lock();
                queue.pop_front()
            };
            let Some(pending) = pending else {
                let _ = self.notify_rx.recv_timeout(std::time::Duration::from_millis(100));
                continue;
            };

            let id = pending.command.id();
            let is_blocking = matches!(
                pending.command,
                EngineCommand::Open { .. } | EngineCommand::Close { .. } | EngineCommand::ChangeMedia { .. }
            );
            if is_blocking {
                inner.shared.workers_paused.store(true, Ordering::Release);
            }

            let cancel_flag = if matches!(pending.command, EngineCommand::Seek { .. }) {
                let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
                *self.in_flight_seek_cancel.lock() = Some(Arc::clone(&flag));
                Some(flag)
            } else {
                None
            };

            let result = inner.execute(pending.command, cancel_flag.as_deref());

            if is_blocking {
                inner.shared.workers_paused.store(false, Ordering::Release);
            }
            let _ = id;
            let _ = pending.completion.send(result);
        }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience constructor for commands that don't need a caller-chosen id.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}
