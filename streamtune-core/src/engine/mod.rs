//! Streaming playback engine.
//!
//! Exactly one stream is active at a time. Every load gets a fresh generation;
//! loader messages carrying any other generation are dropped, so a superseded
//! load can never mark the current one ready, failed or ended.

pub mod backend;
pub mod decode;
pub mod hls;
pub mod output;
pub mod progressive;

use std::{collections::VecDeque, sync::Arc};

use crossbeam_channel::{Receiver, Sender};
use tokio::{runtime::Handle, task::AbortHandle};

pub use backend::{LoaderMessage, OpenedStream, StreamBackend};
pub use hls::HlsBackend;
pub use output::{AudioOutput, RodioOutput, default_output};
pub use progressive::ProgressiveBackend;

use crate::{
    config::{BackendKind, PlayerConfig},
    error::{ErrorCategory, PlaybackError, StreamError},
    source::{PositionTracker, PreparedStream},
    transport::{TransportSnapshot, TransportState},
};

/// Build the backend selected in the configuration
pub fn backend_for(config: &PlayerConfig, client: reqwest::Client) -> Arc<dyn StreamBackend> {
    match config.backend {
        BackendKind::Progressive => Arc::new(ProgressiveBackend::new(client)),
        BackendKind::Hls => Arc::new(HlsBackend::new(client, config.bitrate)),
    }
}

/// Notifications produced by the engine, drained by the player
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback reached the end with looping off. Emitted once per stream.
    TrackEnded,
    /// Terminal failure of the current stream
    Error(PlaybackError),
    LoadStateChanged(bool),
    TransportChanged(TransportSnapshot),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub looping: bool,
    pub autoplay: bool,
    /// Position to resume from once ready
    pub start_at: f32,
}

struct ActiveStream {
    url: String,
    generation: u64,
    task: Option<AbortHandle>,
    ready: Option<(PreparedStream, PositionTracker)>,
    /// Play intent applied on ready; flipped by play/pause while loading
    autoplay: bool,
    start_at: f32,
    ended: bool,
    network_faults: u32,
    media_faults: u32,
}

impl ActiveStream {
    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// A completely delivered stream starts over with a full recovery budget
    fn clear_faults(&mut self) {
        self.network_faults = 0;
        self.media_faults = 0;
    }
}

pub struct StreamEngine {
    backend: Arc<dyn StreamBackend>,
    output: Box<dyn AudioOutput>,
    runtime: Handle,
    loader_tx: Sender<LoaderMessage>,
    loader_rx: Receiver<LoaderMessage>,
    generation: u64,
    looping: bool,
    active: Option<ActiveStream>,
    transport: TransportState,
    network_retries: u32,
    decode_recoveries: u32,
    events: VecDeque<EngineEvent>,
}

impl StreamEngine {
    pub fn new(
        backend: Arc<dyn StreamBackend>,
        output: Box<dyn AudioOutput>,
        runtime: Handle,
        config: &PlayerConfig,
    ) -> Self {
        let (loader_tx, loader_rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            output,
            runtime,
            loader_tx,
            loader_rx,
            generation: 0,
            looping: false,
            active: None,
            transport: TransportState::new(config.default_volume),
            network_retries: config.network_retries,
            decode_recoveries: config.decode_recoveries,
            events: VecDeque::new(),
        }
    }

    /// Receiver of loader messages, to be fed back into [`Self::handle_loader_message`]
    pub fn loader_events(&self) -> Receiver<LoaderMessage> {
        self.loader_rx.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a stream is loading or loaded
    pub fn has_stream(&self) -> bool {
        self.active.is_some()
    }

    pub fn loaded_url(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.url.as_str())
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.transport.snapshot()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    fn push_transport(&mut self) {
        self.events
            .push_back(EngineEvent::TransportChanged(self.transport.snapshot()));
    }

    /// Tear down the current stream and start loading `url`. Returns immediately.
    pub fn load(&mut self, url: &str, options: LoadOptions) {
        self.release();
        self.looping = options.looping;
        self.transport.reset_for_load();
        self.begin(url.to_string(), options.autoplay, options.start_at, 0, 0);
        self.events.push_back(EngineEvent::LoadStateChanged(true));
        self.push_transport();
    }

    fn begin(
        &mut self,
        url: String,
        autoplay: bool,
        start_at: f32,
        network_faults: u32,
        media_faults: u32,
    ) {
        self.generation += 1;
        log::info!("Loading {} (generation {})", url, self.generation);
        let task = backend::spawn_load(
            &self.runtime,
            Arc::clone(&self.backend),
            url.clone(),
            self.generation,
            self.loader_tx.clone(),
        );
        self.active = Some(ActiveStream {
            url,
            generation: self.generation,
            task: Some(task),
            ready: None,
            autoplay,
            start_at,
            ended: false,
            network_faults,
            media_faults,
        });
    }

    /// Stop output and cancel the in-flight load, if any
    fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            log::debug!("Releasing stream generation {}", active.generation);
            active.abort();
            self.output.stop();
        }
    }

    /// Release the current stream and return to idle
    pub fn teardown(&mut self) {
        let was_loading = self.transport.is_loading;
        self.release();
        self.transport.reset_idle();
        if was_loading {
            self.events.push_back(EngineEvent::LoadStateChanged(false));
        }
        self.push_transport();
    }

    pub fn handle_loader_message(&mut self, message: LoaderMessage) {
        let current = self.active.as_ref().map(|a| a.generation);
        if current != Some(message.generation()) {
            log::debug!(
                "Discarding loader message for generation {} (current {:?})",
                message.generation(),
                current
            );
            return;
        }

        match message {
            LoaderMessage::Ready { stream, .. } => self.on_ready(stream),
            LoaderMessage::Buffered { generation } => {
                if let Some(active) = self.active.as_mut() {
                    active.task = None;
                    active.clear_faults();
                }
                log::debug!("Generation {} fully buffered", generation);
            }
            LoaderMessage::Failed { error, .. } => self.on_fault(error),
        }
    }

    fn on_ready(&mut self, stream: PreparedStream) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.ready.is_some() {
            log::warn!("Duplicate ready for generation {}", active.generation);
            return;
        }
        if stream.buffer.is_finished() {
            active.task = None;
            active.clear_faults();
        }

        let tracker = stream.tracker();
        let start_at = active.start_at.clamp(0.0, stream.duration_seconds.max(0.0));
        if start_at > 0.0 {
            tracker.seek_to_seconds(start_at);
        }
        let autoplay = active.autoplay;
        let source = stream.create_source(&tracker);

        if let Err(error) = self
            .output
            .start(source, self.transport.effective_volume(), autoplay)
        {
            self.on_fault(error);
            return;
        }

        self.transport.duration_seconds = stream.duration_seconds;
        self.transport.position_seconds = start_at;
        self.transport.is_loading = false;
        self.transport.is_playing = autoplay;
        active.ready = Some((stream, tracker));

        log::info!(
            "Stream ready ({:.1}s){}",
            self.transport.duration_seconds,
            if autoplay { ", playing" } else { "" }
        );
        self.events.push_back(EngineEvent::LoadStateChanged(false));
        self.push_transport();
    }

    fn on_fault(&mut self, error: StreamError) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.abort();
        self.output.stop();

        let (position, resume) = match &active.ready {
            Some((_, tracker)) => (tracker.position_seconds(), self.transport.is_playing),
            None => (active.start_at, active.autoplay),
        };
        let category = error.category();

        let retry = match category {
            _ if !error.is_recoverable() => None,
            ErrorCategory::Network if active.network_faults < self.network_retries => {
                Some((active.network_faults + 1, active.media_faults))
            }
            ErrorCategory::Media if active.media_faults < self.decode_recoveries => {
                Some((active.network_faults, active.media_faults + 1))
            }
            _ => None,
        };

        let was_loading = self.transport.is_loading;
        match retry {
            Some((network_faults, media_faults)) => {
                log::warn!("{} on {}, reopening at {:.1}s", error, active.url, position);
                self.transport.is_loading = true;
                self.transport.is_playing = false;
                self.transport.position_seconds = position;
                self.begin(active.url, resume, position, network_faults, media_faults);
                if !was_loading {
                    self.events.push_back(EngineEvent::LoadStateChanged(true));
                }
            }
            None => {
                let playback_error = PlaybackError::from(&error);
                log::error!("Fatal stream error on {}: {}", active.url, error);
                self.transport.is_loading = false;
                self.transport.is_playing = false;
                self.transport.last_error = Some(playback_error.clone());
                self.events.push_back(EngineEvent::Error(playback_error));
                if was_loading {
                    self.events.push_back(EngineEvent::LoadStateChanged(false));
                }
            }
        }
        self.push_transport();
    }

    /// Play if paused, pause if playing. While loading this flips the intent
    /// applied on ready; after the end it replays from the start.
    pub fn toggle_play_pause(&mut self) {
        let Some(active) = self.active.as_mut() else {
            log::debug!("Play/pause with no stream loaded");
            return;
        };
        let Some((stream, tracker)) = &active.ready else {
            active.autoplay = !active.autoplay;
            log::debug!("Play/pause while loading, autoplay now {}", active.autoplay);
            return;
        };

        if active.ended {
            tracker.reset();
            let source = stream.create_source(tracker);
            if let Err(error) = self
                .output
                .start(source, self.transport.effective_volume(), true)
            {
                self.on_fault(error);
                return;
            }
            active.ended = false;
            self.transport.position_seconds = 0.0;
            self.transport.is_playing = true;
        } else if self.transport.is_playing {
            self.output.pause();
            self.transport.is_playing = false;
        } else {
            self.output.play();
            self.transport.is_playing = true;
        }
        self.push_transport();
    }

    /// Reposition playback. Non-finite or negative input is ignored, values past
    /// the end clamp to the duration.
    pub fn seek(&mut self, seconds: f32) {
        if !seconds.is_finite() || seconds < 0.0 {
            log::debug!("Ignoring seek to {}", seconds);
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some((stream, tracker)) = &active.ready else {
            return;
        };

        let target = seconds.min(stream.duration_seconds);
        tracker.seek_to_seconds(target);
        if active.ended && target < stream.duration_seconds {
            // The sink dropped the exhausted source
            let source = stream.create_source(tracker);
            if let Err(error) = self
                .output
                .start(source, self.transport.effective_volume(), false)
            {
                self.on_fault(error);
                return;
            }
            active.ended = false;
        }
        self.transport.position_seconds = target;
        self.push_transport();
    }

    pub fn set_volume(&mut self, level: f32) {
        if self.transport.set_volume(level) {
            self.output.set_volume(self.transport.effective_volume());
            self.push_transport();
        }
    }

    pub fn toggle_mute(&mut self) {
        self.transport.toggle_mute();
        self.output.set_volume(self.transport.effective_volume());
        self.push_transport();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Replay the loaded stream from 0. Returns false when nothing is ready.
    pub fn restart(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let Some((stream, tracker)) = &active.ready else {
            return false;
        };
        tracker.reset();
        let source = stream.create_source(tracker);
        if let Err(error) = self
            .output
            .start(source, self.transport.effective_volume(), true)
        {
            self.on_fault(error);
            return false;
        }
        active.ended = false;
        self.transport.position_seconds = 0.0;
        self.transport.is_playing = true;
        self.push_transport();
        true
    }

    /// Periodic update: refresh the position and detect the end of the stream
    pub fn tick(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some((stream, tracker)) = &active.ready else {
            return;
        };
        if active.ended || !self.transport.is_playing {
            return;
        }

        if stream.is_exhausted(tracker) {
            if self.looping {
                log::debug!("Looping generation {}", active.generation);
                tracker.reset();
                let source = stream.create_source(tracker);
                if let Err(error) = self
                    .output
                    .start(source, self.transport.effective_volume(), true)
                {
                    self.on_fault(error);
                    return;
                }
                self.transport.position_seconds = 0.0;
            } else {
                log::info!("Track ended (generation {})", active.generation);
                active.ended = true;
                self.output.stop();
                self.transport.is_playing = false;
                self.transport.position_seconds = stream.duration_seconds;
                self.events.push_back(EngineEvent::TrackEnded);
            }
            self.push_transport();
            return;
        }

        let mut position = tracker.position_seconds();
        if stream.duration_seconds > 0.0 {
            position = position.min(stream.duration_seconds);
        }
        if position != self.transport.position_seconds {
            self.transport.position_seconds = position;
            self.push_transport();
        }
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{cell::RefCell, rc::Rc};

    use futures::future::BoxFuture;

    use super::*;
    use crate::source::{BufferedSource, StreamBuffer};

    /// Backend whose loads never complete; tests inject loader messages
    pub struct PendingBackend;

    impl StreamBackend for PendingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Progressive
        }

        fn open<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<OpenedStream, StreamError>> {
            Box::pin(futures::future::pending::<Result<OpenedStream, StreamError>>())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum OutputCall {
        Start { volume: f32, playing: bool },
        Play,
        Pause,
        Stop,
        Volume(f32),
    }

    #[derive(Clone, Default)]
    pub struct RecordingOutput {
        pub calls: Rc<RefCell<Vec<OutputCall>>>,
    }

    impl AudioOutput for RecordingOutput {
        fn start(
            &mut self,
            _: BufferedSource,
            volume: f32,
            playing: bool,
        ) -> Result<(), StreamError> {
            self.calls
                .borrow_mut()
                .push(OutputCall::Start { volume, playing });
            Ok(())
        }
        fn play(&mut self) {
            self.calls.borrow_mut().push(OutputCall::Play);
        }
        fn pause(&mut self) {
            self.calls.borrow_mut().push(OutputCall::Pause);
        }
        fn stop(&mut self) {
            self.calls.borrow_mut().push(OutputCall::Stop);
        }
        fn set_volume(&mut self, volume: f32) {
            self.calls.borrow_mut().push(OutputCall::Volume(volume));
        }
    }

    /// Output whose device is gone
    pub struct UnavailableOutput;

    impl AudioOutput for UnavailableOutput {
        fn start(&mut self, _: BufferedSource, _: f32, _: bool) -> Result<(), StreamError> {
            Err(StreamError::Output("no audio output device".into()))
        }
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn stop(&mut self) {}
        fn set_volume(&mut self, _: f32) {}
    }

    /// A mono stream at 1 kHz announced as `seconds` long, with only its first second buffered
    pub fn filling(seconds: f32) -> PreparedStream {
        let buffer = StreamBuffer::new(1000, 1);
        buffer.append(&vec![0.1; 1000]);
        PreparedStream::new(Arc::new(buffer), seconds)
    }

    /// A fully buffered mono stream of `seconds` at 1 kHz
    pub fn prepared(seconds: f32) -> PreparedStream {
        let samples = vec![0.1; (seconds * 1000.0) as usize];
        PreparedStream::new(Arc::new(StreamBuffer::complete(samples, 1000, 1)), seconds)
    }

    pub fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    pub fn engine(runtime: &tokio::runtime::Runtime) -> (StreamEngine, RecordingOutput) {
        let output = RecordingOutput::default();
        let engine = StreamEngine::new(
            Arc::new(PendingBackend),
            Box::new(output.clone()),
            runtime.handle().clone(),
            &PlayerConfig::default(),
        );
        (engine, output)
    }

    impl StreamEngine {
        /// Move the read position of the ready stream, as the audio callback would
        pub fn advance_playhead_to(&self, seconds: f32) {
            if let Some((_, tracker)) = self.active.as_ref().and_then(|a| a.ready.as_ref()) {
                tracker.seek_to_seconds(seconds);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    fn ready(engine: &mut StreamEngine, seconds: f32) {
        let generation = engine.generation();
        engine.handle_loader_message(LoaderMessage::Ready {
            generation,
            stream: prepared(seconds),
        });
    }

    fn autoplay() -> LoadOptions {
        LoadOptions {
            autoplay: true,
            ..Default::default()
        }
    }

    #[test]
    fn load_reports_loading_then_ready() {
        let rt = runtime();
        let (mut engine, output) = engine(&rt);

        engine.load("http://host/stream/1/192", autoplay());
        assert!(engine.snapshot().is_loading);
        assert_eq!(engine.generation(), 1);

        ready(&mut engine, 3.0);
        let snap = engine.snapshot();
        assert!(!snap.is_loading);
        assert!(snap.is_playing);
        assert_eq!(snap.duration_seconds, 3.0);
        assert!(output.calls.borrow().contains(&OutputCall::Start {
            volume: 1.0,
            playing: true
        }));

        let events = engine.drain_events();
        assert_eq!(events[0], EngineEvent::LoadStateChanged(true));
        assert!(events.contains(&EngineEvent::LoadStateChanged(false)));
    }

    #[test]
    fn stale_ready_from_superseded_load_is_discarded() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("http://host/stream/1/192", autoplay());
        let first = engine.generation();
        engine.load("http://host/stream/2/192", autoplay());
        assert_ne!(first, engine.generation());
        engine.drain_events();

        engine.handle_loader_message(LoaderMessage::Ready {
            generation: first,
            stream: prepared(100.0),
        });
        assert!(engine.snapshot().is_loading);
        assert_eq!(engine.snapshot().duration_seconds, 0.0);
        assert!(engine.drain_events().is_empty());

        ready(&mut engine, 4.0);
        assert_eq!(engine.loaded_url(), Some("http://host/stream/2/192"));
        assert_eq!(engine.snapshot().duration_seconds, 4.0);
    }

    #[test]
    fn stale_failure_does_not_touch_current_stream() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        let first = engine.generation();
        engine.load("b", autoplay());
        engine.handle_loader_message(LoaderMessage::Failed {
            generation: first,
            error: StreamError::Manifest("broken".into()),
        });
        assert_eq!(engine.snapshot().last_error, None);
        assert!(engine.has_stream());
    }

    #[test]
    fn messages_after_teardown_are_ignored() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        let generation = engine.generation();
        engine.teardown();
        engine.drain_events();

        engine.handle_loader_message(LoaderMessage::Ready {
            generation,
            stream: prepared(1.0),
        });
        assert!(!engine.has_stream());
        assert!(!engine.snapshot().is_playing);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn toggle_while_loading_flips_autoplay() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        engine.toggle_play_pause();
        ready(&mut engine, 2.0);
        assert!(!engine.snapshot().is_playing);

        engine.toggle_play_pause();
        assert!(engine.snapshot().is_playing);
        engine.toggle_play_pause();
        assert!(!engine.snapshot().is_playing);
    }

    #[test]
    fn toggle_without_stream_is_harmless() {
        let rt = runtime();
        let (mut engine, output) = engine(&rt);
        engine.toggle_play_pause();
        engine.seek(3.0);
        engine.tick();
        assert!(output.calls.borrow().is_empty());
        assert!(!engine.snapshot().is_playing);
    }

    #[test]
    fn seek_clamps_and_ignores_bad_input() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", LoadOptions::default());
        engine.seek(1.0);
        assert_eq!(engine.snapshot().position_seconds, 0.0);

        ready(&mut engine, 10.0);
        engine.seek(4.5);
        assert_eq!(engine.snapshot().position_seconds, 4.5);
        engine.seek(f32::NAN);
        engine.seek(f32::INFINITY);
        engine.seek(-2.0);
        assert_eq!(engine.snapshot().position_seconds, 4.5);
        engine.seek(99.0);
        assert_eq!(engine.snapshot().position_seconds, 10.0);
    }

    #[test]
    fn end_without_loop_emits_ended_once() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 2.0);
        engine.drain_events();

        engine.advance_playhead_to(1.0);
        engine.tick();
        assert_eq!(engine.snapshot().position_seconds, 1.0);

        engine.advance_playhead_to(2.0);
        engine.tick();
        engine.tick();
        engine.tick();

        let ended = engine
            .drain_events()
            .into_iter()
            .filter(|e| *e == EngineEvent::TrackEnded)
            .count();
        assert_eq!(ended, 1);
        assert!(!engine.snapshot().is_playing);
    }

    #[test]
    fn end_with_loop_restarts_without_event() {
        let rt = runtime();
        let (mut engine, output) = engine(&rt);

        engine.load(
            "a",
            LoadOptions {
                looping: true,
                autoplay: true,
                start_at: 0.0,
            },
        );
        ready(&mut engine, 2.0);
        engine.drain_events();

        engine.advance_playhead_to(2.0);
        engine.tick();

        assert!(!engine.drain_events().contains(&EngineEvent::TrackEnded));
        assert!(engine.snapshot().is_playing);
        assert_eq!(engine.snapshot().position_seconds, 0.0);
        let starts = output
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, OutputCall::Start { .. }))
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn play_after_end_replays_from_start() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 1.0);
        engine.advance_playhead_to(1.0);
        engine.tick();
        assert!(!engine.snapshot().is_playing);

        engine.toggle_play_pause();
        let snap = engine.snapshot();
        assert!(snap.is_playing);
        assert_eq!(snap.position_seconds, 0.0);
    }

    fn network_fault(engine: &mut StreamEngine) {
        engine.handle_loader_message(LoaderMessage::Failed {
            generation: engine.generation(),
            error: StreamError::Network("connection reset".into()),
        });
    }

    #[test]
    fn network_fault_reloads_at_the_same_position() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 10.0);
        engine.advance_playhead_to(3.0);
        engine.tick();
        let first = engine.generation();

        network_fault(&mut engine);
        assert_eq!(engine.generation(), first + 1);
        assert!(engine.snapshot().is_loading);
        assert_eq!(engine.snapshot().last_error, None);

        // Resumes where it was, still playing
        ready(&mut engine, 10.0);
        let snap = engine.snapshot();
        assert_eq!(snap.position_seconds, 3.0);
        assert!(snap.is_playing);
    }

    #[test]
    fn later_network_fault_after_recovery_reloads_again() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 600.0);
        engine.advance_playhead_to(60.0);
        engine.tick();

        network_fault(&mut engine);
        ready(&mut engine, 600.0);
        engine.advance_playhead_to(500.0);
        engine.tick();
        let recovered = engine.generation();

        network_fault(&mut engine);
        assert_eq!(engine.generation(), recovered + 1);
        assert!(engine.has_stream());
        assert_eq!(engine.snapshot().last_error, None);

        ready(&mut engine, 600.0);
        assert_eq!(engine.snapshot().position_seconds, 500.0);
        assert!(engine.snapshot().is_playing);
    }

    #[test]
    fn consecutive_network_faults_are_fatal() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 10.0);
        network_fault(&mut engine);
        assert!(engine.has_stream());

        engine.handle_loader_message(LoaderMessage::Failed {
            generation: engine.generation(),
            error: StreamError::Http {
                status: 503,
                url: "a".into(),
            },
        });
        let snap = engine.snapshot();
        assert!(!snap.is_loading);
        assert!(!snap.is_playing);
        assert!(!engine.has_stream());
        let error = snap.last_error.unwrap();
        assert_eq!(error.category, ErrorCategory::Network);
        assert_eq!(error.to_string(), "Player Error: networkError - httpStatus503");
    }

    #[test]
    fn partially_buffered_reload_keeps_its_budget_until_buffered() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        network_fault(&mut engine);
        engine.handle_loader_message(LoaderMessage::Ready {
            generation: engine.generation(),
            stream: filling(10.0),
        });
        engine.handle_loader_message(LoaderMessage::Buffered {
            generation: engine.generation(),
        });

        // Fully delivered, so the next fault is a fresh one
        network_fault(&mut engine);
        assert!(engine.has_stream());
        engine.handle_loader_message(LoaderMessage::Ready {
            generation: engine.generation(),
            stream: filling(10.0),
        });

        // Still filling: a repeat fault (e.g. the same missing segment) is fatal
        network_fault(&mut engine);
        assert!(!engine.has_stream());
        assert_eq!(
            engine.snapshot().last_error.map(|e| e.category),
            Some(ErrorCategory::Network)
        );
    }

    #[test]
    fn missing_output_device_is_a_terminal_error() {
        let rt = runtime();
        let mut engine = StreamEngine::new(
            Arc::new(PendingBackend),
            Box::new(UnavailableOutput),
            rt.handle().clone(),
            &PlayerConfig::default(),
        );

        engine.load("a", autoplay());
        let generation = engine.generation();
        ready(&mut engine, 5.0);

        assert_eq!(engine.generation(), generation);
        assert!(!engine.has_stream());
        let snap = engine.snapshot();
        assert!(!snap.is_playing);
        assert!(!snap.is_loading);
        let error = snap.last_error.unwrap();
        assert_eq!(error.category, ErrorCategory::Other);
        assert!(error.to_string().contains("no audio output device"));

        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::LoadStateChanged(false)));
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Error(_))));
    }

    #[test]
    fn decode_fault_recovers_once() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        engine.handle_loader_message(LoaderMessage::Failed {
            generation: engine.generation(),
            error: StreamError::Decode("bad frame".into()),
        });
        assert!(engine.has_stream());
        assert!(engine.snapshot().is_loading);

        engine.handle_loader_message(LoaderMessage::Failed {
            generation: engine.generation(),
            error: StreamError::Decode("bad frame".into()),
        });
        assert!(!engine.has_stream());
        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Error(PlaybackError {
                category: ErrorCategory::Media,
                ..
            })
        )));
    }

    #[test]
    fn manifest_fault_is_fatal_immediately() {
        let rt = runtime();
        let (mut engine, _output) = engine(&rt);

        engine.load("a", autoplay());
        let generation = engine.generation();
        engine.handle_loader_message(LoaderMessage::Failed {
            generation,
            error: StreamError::Manifest("no segments".into()),
        });
        assert_eq!(engine.generation(), generation);
        let snap = engine.snapshot();
        assert!(!snap.is_loading);
        assert_eq!(snap.last_error.unwrap().category, ErrorCategory::Other);
    }

    #[test]
    fn volume_and_mute_survive_reload() {
        let rt = runtime();
        let (mut engine, output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 1.0);
        engine.set_volume(0.4);
        engine.toggle_mute();
        assert!(output.calls.borrow().contains(&OutputCall::Volume(0.0)));

        engine.load("b", autoplay());
        ready(&mut engine, 1.0);
        let snap = engine.snapshot();
        assert_eq!(snap.volume, 0.4);
        assert!(snap.is_muted);
        assert_eq!(
            output.calls.borrow().last(),
            Some(&OutputCall::Start {
                volume: 0.0,
                playing: true
            })
        );
    }

    #[test]
    fn loading_releases_previous_output() {
        let rt = runtime();
        let (mut engine, output) = engine(&rt);

        engine.load("a", autoplay());
        ready(&mut engine, 1.0);
        output.calls.borrow_mut().clear();

        engine.load("b", autoplay());
        assert_eq!(output.calls.borrow().as_slice(), &[OutputCall::Stop]);
    }
}
