// crates/engine-media/src/engine.rs
//
// MediaEngine: the public facade (§6). Wraps a CommandQueue + the three
// workers + an EngineShared, and exposes the transport verbs an embedder
// calls (open/close/play/pause/stop/seek/speed/volume/balance/mute/loop)
// plus a state snapshot and connector subscription.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use engine_types::{
    ContainerConfig, EndOfStreamAction, EngineCommand, EngineError, EnginePolicy, EngineState,
    MediaConnector, MediaState, OpenRequest, SeekRequest, StreamType,
};

use crate::command_queue::{new_id, CommandQueue, CompletionHandle};
use crate::container::{Container, FfmpegContainer};
use crate::renderer::RendererSet;
use crate::shared::EngineShared;
use crate::workers::WorkerHandles;

pub struct EngineInner {
    pub shared: Arc<EngineShared>,
}

impl EngineInner {
    /// Execute one command to completion on the command-executor thread.
    /// `cancel` is set only for Seek; checked between the coarse steps
    /// §5 names (worker-stop, container-op, worker-start).
    pub fn execute(&self, command: EngineCommand, cancel: Option<&std::sync::atomic::AtomicBool>) -> Result<(), EngineError> {
        match command {
            EngineCommand::Open { request, .. } => self.do_open(request),
            EngineCommand::ChangeMedia { request, .. } => {
                self.do_close();
                self.do_open(request)
            }
            EngineCommand::Close { .. } => { self.do_close(); Ok(()) }
            EngineCommand::Play { .. } => self.do_play(),
            EngineCommand::Pause { .. } => self.do_pause(),
            EngineCommand::Stop { .. } => self.do_stop(),
            EngineCommand::Seek { request, .. } => self.do_seek(request, cancel),
            EngineCommand::SetSpeedRatio { ratio, .. } => self.shared.clock.set_speed_ratio(ratio),
            EngineCommand::SetVolume { volume, .. } => {
                let volume = volume.clamp(0.0, 1.0);
                self.shared.state.lock().volume = volume;
                if let Some(audio) = &self.shared.renderers.read().audio {
                    audio.set_volume(volume);
                }
                Ok(())
            }
            EngineCommand::SetBalance { balance, .. } => {
                let balance = balance.clamp(-1.0, 1.0);
                self.shared.state.lock().balance = balance;
                if let Some(audio) = &self.shared.renderers.read().audio {
                    audio.set_balance(balance);
                }
                Ok(())
            }
            EngineCommand::SetMuted { muted, .. } => {
                self.shared.state.lock().is_muted = muted;
                if let Some(audio) = &self.shared.renderers.read().audio {
                    audio.set_muted(muted);
                }
                Ok(())
            }
            EngineCommand::SetEndOfStreamAction { action, .. } => {
                *self.shared.end_of_stream_action.lock() = action;
                Ok(())
            }
        }
    }

    fn transition(&self, next: MediaState) {
        let mut state = self.shared.state.lock();
        let old = state.media_state;
        if !old.can_transition_to(next) {
            eprintln!("[engine] ignoring invalid transition {old:?} -> {next:?}");
            return;
        }
        state.media_state = next;
        drop(state);
        if old != next {
            self.shared.connector.read().on_media_state_changed(old, next);
        }
    }

    fn do_open(&self, request: OpenRequest) -> Result<(), EngineError> {
        self.shared.connector.read().on_media_initializing(&request.config, &request.source);
        self.transition(MediaState::Open);

        let opened = {
            let mut container = self.shared.container.lock();
            container.open(&request.source, &request.config)
        };
        let info = match opened.and_then(|info| {
            info.main_stream().cloned().ok_or(EngineError::NoStreams).map(|main| (info, main))
        }) {
            Ok((info, main)) => {
                *self.shared.main_kind.lock() = Some(main.kind);
                info
            }
            Err(e) => {
                self.shared.connector.read().on_media_failed(&e);
                self.transition(MediaState::Close);
                return Err(e);
            }
        };

        self.shared.decode_error_counts.lock().clear();
        self.shared.disabled_streams.lock().clear();
        if let Some(preferred) = request.config.preferred_audio_stream {
            let mut disabled = self.shared.disabled_streams.lock();
            for s in info.streams.iter().filter(|s| s.kind == StreamType::Audio && s.index != preferred) {
                disabled.insert(s.index);
            }
        }

        {
            let mut state = self.shared.state.lock();
            state.natural_duration = info.duration;
            state.has_video = info.has(StreamType::Video);
            state.has_audio = info.has(StreamType::Audio);
            state.has_subtitles = info.has(StreamType::Subtitle);
        }
        self.shared.is_seekable.store(info.is_seekable, Ordering::Release);
        self.shared.container_eof.store(false, Ordering::Release);

        self.shared.clock.set_position(Duration::ZERO);
        self.shared.video_buffer.reset();
        self.shared.audio_buffer.reset();
        self.shared.subtitle_buffer.reset();

        self.shared.connector.read().on_media_opening(&request.source, &info);
        self.transition(MediaState::Stop);
        self.shared.connector.read().on_media_opened(&info);
        Ok(())
    }

    fn do_close(&self) {
        self.shared.clock.pause();
        let mut container = self.shared.container.lock();
        container.close();
        drop(container);
        *self.shared.main_kind.lock() = None;
        self.shared.decode_error_counts.lock().clear();
        self.shared.disabled_streams.lock().clear();
        self.shared.video_buffer.reset();
        self.shared.audio_buffer.reset();
        self.shared.subtitle_buffer.reset();
        self.shared.container_eof.store(false, Ordering::Release);
        self.transition(MediaState::Close);
        self.shared.connector.read().on_media_closed();
    }

    fn do_play(&self) -> Result<(), EngineError> {
        self.shared.clock.play();
        self.transition(MediaState::Play);
        Ok(())
    }

    fn do_pause(&self) -> Result<(), EngineError> {
        self.shared.clock.pause();
        self.transition(MediaState::Pause);
        Ok(())
    }

    fn do_stop(&self) -> Result<(), EngineError> {
        self.shared.clock.pause();
        if self.shared.is_seekable.load(Ordering::Acquire) {
            self.shared.clock.set_position(Duration::ZERO);
        }
        self.transition(MediaState::Stop);
        Ok(())
    }

    fn do_seek(&self, request: SeekRequest, cancel: Option<&std::sync::atomic::AtomicBool>) -> Result<(), EngineError> {
        self.shared.seeking.store(true, Ordering::Release);
        self.shared.connector.read().on_seeking_started();

        if cancel.map(|c| c.load(Ordering::Acquire)).unwrap_or(false) {
            self.shared.seeking.store(false, Ordering::Release);
            return Err(EngineError::Cancelled);
        }

        let result = {
            let mut container = self.shared.container.lock();
            container.flush();
            container.seek(request.target)
        };

        self.shared.video_buffer.reset();
        self.shared.audio_buffer.reset();
        self.shared.subtitle_buffer.reset();
        self.shared.container_eof.store(false, Ordering::Release);
        self.shared.clock.set_position(request.target);

        match result {
            Ok(actual) => {
                self.shared.clock.set_position(actual);
                self.shared.connector.read().on_seeking_ended();
                Ok(())
            }
            Err(e) => {
                self.shared.seeking.store(false, Ordering::Release);
                self.shared.connector.read().on_seeking_ended();
                Err(e)
            }
        }
    }
}

/// The public facade (§6). Owns the command executor and the three worker
/// threads for the lifetime of the engine.
pub struct MediaEngine {
    inner: Arc<EngineInner>,
    queue: Arc<CommandQueue>,
    workers: std::sync::Mutex<WorkerHandles>,
}

impl MediaEngine {
    pub fn new(policy: EnginePolicy) -> Self {
        Self::with_container(Box::new(FfmpegContainer::new()), policy)
    }

    pub fn with_container(container: Box<dyn Container>, policy: EnginePolicy) -> Self {
        let shared = Arc::new(EngineShared::new(container, policy));
        let queue = Arc::new(CommandQueue::new());
        let _ = shared.command_queue.set(Arc::clone(&queue));

        let workers = WorkerHandles::spawn(Arc::clone(&shared));
        let inner = Arc::new(EngineInner { shared });

        {
            let queue = Arc::clone(&queue);
            let inner = Arc::clone(&inner);
            std::thread::spawn(move || queue.run(inner));
        }

        Self { inner, queue, workers: std::sync::Mutex::new(workers) }
    }

    pub fn set_connector(&self, connector: Arc<dyn MediaConnector>) {
        *self.inner.shared.connector.write() = connector;
    }

    pub fn set_renderers(&self, renderers: RendererSet) {
        if let Some(audio) = &renderers.audio {
            let state = self.inner.shared.state.lock();
            audio.set_volume(state.volume);
            audio.set_balance(state.balance);
            audio.set_muted(state.is_muted);
        }
        *self.inner.shared.renderers.write() = renderers;
    }

    pub fn open(&self, source: impl Into<String>, config: ContainerConfig) -> CompletionHandle {
        self.queue.submit(EngineCommand::Open { id: new_id(), request: OpenRequest { source: source.into(), config } })
    }

    pub fn change_media(&self, source: impl Into<String>, config: ContainerConfig) -> CompletionHandle {
        self.queue.submit(EngineCommand::ChangeMedia { id: new_id(), request: OpenRequest { source: source.into(), config } })
    }

    pub fn close(&self) -> CompletionHandle {
        self.queue.submit(EngineCommand::Close { id: new_id() })
    }

    pub fn play(&self) -> CompletionHandle {
        self.queue.submit(EngineCommand::Play { id: new_id() })
    }

    pub fn pause(&self) -> CompletionHandle {
        self.queue.submit(EngineCommand::Pause { id: new_id() })
    }

    pub fn stop(&self) -> CompletionHandle {
        self.queue.submit(EngineCommand::Stop { id: new_id() })
    }

    pub fn seek(&self, target: Duration) -> CompletionHandle {
        self.queue.submit(EngineCommand::Seek { id: new_id(), request: SeekRequest { target } })
    }

    pub fn set_speed_ratio(&self, ratio: f64) -> CompletionHandle {
        self.queue.submit(EngineCommand::SetSpeedRatio { id: new_id(), ratio })
    }

    pub fn set_volume(&self, volume: f64) -> CompletionHandle {
        self.queue.submit(EngineCommand::SetVolume { id: new_id(), volume })
    }

    pub fn set_balance(&self, balance: f64) -> CompletionHandle {
        self.queue.submit(EngineCommand::SetBalance { id: new_id(), balance })
    }

    pub fn set_muted(&self, muted: bool) -> CompletionHandle {
        self.queue.submit(EngineCommand::SetMuted { id: new_id(), muted })
    }

    pub fn set_looping(&self, looping: bool) -> CompletionHandle {
        let action = if looping { EndOfStreamAction::Loop } else { EndOfStreamAction::Pause };
        self.inner.shared.is_looping.store(looping, Ordering::Release);
        self.queue.submit(EngineCommand::SetEndOfStreamAction { id: new_id(), action })
    }

    pub fn state(&self) -> EngineState {
        self.inner.shared.state.lock().clone()
    }

    pub fn shutdown(&self) {
        self.inner.shared.shutdown.store(true, Ordering::Release);
        self.workers.lock().unwrap().join();
    }
}

impl Drop for MediaEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use engine_types::{ContainerConfig, MediaInfo, StreamDescriptor};

    use crate::container::ReadOutcome;
    use crate::frame::Frame;

    /// Substitutes `FfmpegContainer` for `do_open`/`do_close` tests, per the
    /// trait's own doc comment: "kept as a trait so tests can substitute a
    /// fake container without a real media file".
    struct FakeContainer {
        info: MediaInfo,
        fail_open: bool,
    }

    impl FakeContainer {
        fn with_streams(streams: Vec<StreamDescriptor>) -> Self {
            Self {
                info: MediaInfo {
                    duration: Some(Duration::from_secs(10)),
                    is_seekable: true,
                    streams,
                    container_format: "fake".into(),
                    total_size_bytes: None,
                    is_network: false,
                    is_live: false,
                },
                fail_open: false,
            }
        }

        fn failing() -> Self {
            Self::with_streams(Vec::new()).with_fail_open()
        }

        fn with_fail_open(mut self) -> Self {
            self.fail_open = true;
            self
        }
    }

    impl Container for FakeContainer {
        fn open(&mut self, _source: &str, _config: &ContainerConfig) -> Result<MediaInfo, EngineError> {
            if self.fail_open {
                return Err(EngineError::OpenFailure("no such file".into()));
            }
            Ok(self.info.clone())
        }
        fn read(&mut self) -> Result<ReadOutcome, EngineError> { Ok(ReadOutcome::EndOfStream) }
        fn decode(&mut self) -> Result<Vec<(usize, Frame)>, EngineError> { Ok(Vec::new()) }
        fn convert(&mut self, _stream_index: usize, _frame: Frame) -> Result<engine_types::Block, EngineError> {
            Err(EngineError::Fatal("unused in this test".into()))
        }
        fn seek(&mut self, target: Duration) -> Result<Duration, EngineError> { Ok(target) }
        fn flush(&mut self) {}
        fn close(&mut self) {}
        fn stream_descriptor(&self, _stream_index: usize) -> Option<StreamDescriptor> { None }
        fn packet_queue_stats(&self, _stream_index: usize) -> (u64, Option<Duration>) { (0, None) }
        fn stream_indices_of(&self, _kind: StreamType) -> Vec<usize> { Vec::new() }
        fn is_at_end_of_stream(&self) -> bool { true }
    }

    fn desc(index: usize, kind: StreamType) -> StreamDescriptor {
        StreamDescriptor {
            index, kind, codec: "test".into(), bitrate: None,
            sample_rate: None, channels: None, pixel_format: None,
            frame_rate: None, aspect_ratio: None, rotation: 0,
            metadata: HashMap::new(),
        }
    }

    #[derive(Default)]
    struct SpyConnector {
        failed: StdMutex<Vec<String>>,
        state_changes: StdMutex<Vec<(MediaState, MediaState)>>,
    }

    impl MediaConnector for SpyConnector {
        fn on_media_failed(&self, error: &EngineError) {
            self.failed.lock().unwrap().push(error.to_string());
        }
        fn on_media_state_changed(&self, old: MediaState, new: MediaState) {
            self.state_changes.lock().unwrap().push((old, new));
        }
    }

    fn inner_with(container: FakeContainer) -> (EngineInner, Arc<SpyConnector>) {
        let shared = EngineShared::new(Box::new(container), EnginePolicy::default());
        let spy = Arc::new(SpyConnector::default());
        *shared.connector.write() = Arc::clone(&spy) as Arc<dyn MediaConnector>;
        (EngineInner { shared: Arc::new(shared) }, spy)
    }

    fn open_request(config: ContainerConfig) -> OpenRequest {
        OpenRequest { source: "fake://clip".into(), config }
    }

    #[test]
    fn do_open_selects_preferred_audio_stream_and_disables_the_rest() {
        let container = FakeContainer::with_streams(vec![
            desc(0, StreamType::Video),
            desc(1, StreamType::Audio),
            desc(2, StreamType::Audio),
            desc(3, StreamType::Audio),
        ]);
        let (inner, _spy) = inner_with(container);
        let config = ContainerConfig { preferred_audio_stream: Some(2), ..Default::default() };

        inner.do_open(open_request(config)).unwrap();

        assert!(inner.shared.is_stream_disabled(1));
        assert!(!inner.shared.is_stream_disabled(2));
        assert!(inner.shared.is_stream_disabled(3));
    }

    #[test]
    fn do_open_failure_reports_media_failed_and_transitions_to_close() {
        let (inner, spy) = inner_with(FakeContainer::failing());

        let err = inner.do_open(open_request(ContainerConfig::default())).unwrap_err();

        assert!(matches!(err, EngineError::OpenFailure(_)));
        assert_eq!(spy.failed.lock().unwrap().len(), 1);
        assert_eq!(inner.shared.state.lock().media_state, MediaState::Close);
    }

    #[test]
    fn do_open_with_no_playable_streams_fails_as_no_streams() {
        let container = FakeContainer::with_streams(vec![desc(0, StreamType::Data)]);
        let (inner, spy) = inner_with(container);

        let err = inner.do_open(open_request(ContainerConfig::default())).unwrap_err();

        assert!(matches!(err, EngineError::NoStreams));
        assert_eq!(spy.failed.lock().unwrap().len(), 1);
        assert_eq!(inner.shared.state.lock().media_state, MediaState::Close);
    }

    #[test]
    fn do_open_success_reaches_stop_with_stream_flags_set() {
        let container = FakeContainer::with_streams(vec![
            desc(0, StreamType::Video),
            desc(1, StreamType::Audio),
        ]);
        let (inner, _spy) = inner_with(container);

        inner.do_open(open_request(ContainerConfig::default())).unwrap();

        let state = inner.shared.state.lock();
        assert_eq!(state.media_state, MediaState::Stop);
        assert!(state.has_video);
        assert!(state.has_audio);
        assert!(!state.has_subtitles);
    }

    #[test]
    fn do_close_clears_disabled_streams_and_error_counts() {
        let container = FakeContainer::with_streams(vec![desc(0, StreamType::Video)]);
        let (inner, _spy) = inner_with(container);
        inner.do_open(open_request(ContainerConfig::default())).unwrap();
        inner.shared.record_decode_error(0);
        assert!(inner.shared.decode_error_counts.lock().contains_key(&0));

        inner.do_close();

        assert!(inner.shared.decode_error_counts.lock().is_empty());
        assert!(!inner.shared.is_stream_disabled(0));
        assert_eq!(inner.shared.state.lock().media_state, MediaState::Close);
    }

    #[test]
    fn transition_ignores_a_jump_with_no_path_in_the_diagram() {
        let (inner, spy) = inner_with(FakeContainer::with_streams(vec![desc(0, StreamType::Video)]));

        inner.transition(MediaState::Play); // Close -> Play has no edge

        assert_eq!(inner.shared.state.lock().media_state, MediaState::Close);
        assert!(spy.state_changes.lock().unwrap().is_empty());
    }

    /// §8 scenario 6 end-to-end, driven through the real `MediaEngine`
    /// facade and its worker threads rather than calling `do_open` directly.
    #[test]
    fn open_close_lifecycle_through_the_command_queue() {
        let container = FakeContainer::with_streams(vec![desc(0, StreamType::Video)]);
        let engine = MediaEngine::with_container(Box::new(container), EnginePolicy::default());

        engine.open("fake://clip", ContainerConfig::default()).wait().unwrap();
        assert_eq!(engine.state().media_state, MediaState::Stop);

        engine.close().wait().unwrap();
        assert_eq!(engine.state().media_state, MediaState::Close);
    }

    /// §8 scenario 6: opening a source the fake container rejects yields
    /// the open command's own error, not a hang or panic on the executor.
    #[test]
    fn open_failure_through_the_command_queue_surfaces_on_the_completion_handle() {
        let engine = MediaEngine::with_container(Box::new(FakeContainer::failing()), EnginePolicy::default());

        let err = engine.open("fake://missing", ContainerConfig::default()).wait().unwrap_err();

        assert!(matches!(err, EngineError::OpenFailure(_)));
        assert_eq!(engine.state().media_state, MediaState::Close);
    }
}
