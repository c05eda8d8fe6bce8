//! The player thread.
//!
//! Owns the queue controller and the streaming engine; every state change
//! happens here, in response to a command, a loader message, a catalog result
//! or a tick. Network work runs on a tokio runtime and only ever reports back
//! through channels.

use std::thread::JoinHandle;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender, select};
use tokio::runtime::Handle;

use crate::{
    catalog::CatalogClient,
    commands::{AudioCommand, AudioResponse},
    config::PlayerConfig,
    engine::{self, EngineEvent, LoadOptions, LoaderMessage, StreamEngine},
    error::CatalogError,
    queue::{QueueAction, QueueController, QueueOutcome},
    track::{Track, TrackId},
};

type CatalogResult = (u64, Result<Vec<Track>, CatalogError>);

/// Front-end side of the player channels
pub struct PlayerHandle {
    pub cmd_tx: Sender<AudioCommand>,
    pub resp_rx: Receiver<AudioResponse>,
}

impl PlayerHandle {
    pub fn send(&self, command: AudioCommand) -> anyhow::Result<()> {
        self.cmd_tx
            .send(command)
            .context("player thread is not running")
    }
}

pub struct Player {
    config: PlayerConfig,
    cmd_rx: Receiver<AudioCommand>,
    resp_tx: Sender<AudioResponse>,
}

impl Player {
    pub fn new(config: PlayerConfig) -> (Self, PlayerHandle) {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded();
        (
            Self {
                config,
                cmd_rx,
                resp_tx,
            },
            PlayerHandle { cmd_tx, resp_rx },
        )
    }

    /// Start the player thread
    pub fn spawn(self) -> anyhow::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("player".to_string())
            .spawn(move || {
                let resp_tx = self.resp_tx.clone();
                if let Err(e) = self.run() {
                    log::error!("Player thread failed: {:#}", e);
                    let _ = resp_tx.send(AudioResponse::Shutdown);
                }
            })
            .context("cannot spawn player thread")
    }

    fn run(self) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("player-io")
            .enable_all()
            .build()
            .context("cannot build I/O runtime")?;

        let client = self
            .config
            .http_client()
            .context("cannot create HTTP client")?;
        let backend = engine::backend_for(&self.config, client.clone());
        log::info!("Using {} backend", backend.kind());

        let engine = StreamEngine::new(
            backend,
            engine::default_output(),
            runtime.handle().clone(),
            &self.config,
        );
        let catalog = CatalogClient::new(client, &self.config);

        let mut core = PlayerCore::new(
            self.config,
            engine,
            catalog,
            runtime.handle().clone(),
            self.resp_tx,
        );
        core.run(&self.cmd_rx);
        drop(core);
        runtime.shutdown_background();
        Ok(())
    }
}

/// Whether a queue change should start playback or keep the current play state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Play,
    Follow,
}

pub(crate) struct PlayerCore {
    config: PlayerConfig,
    queue: QueueController,
    engine: StreamEngine,
    catalog: CatalogClient,
    runtime: Handle,
    catalog_tx: Sender<CatalogResult>,
    catalog_rx: Receiver<CatalogResult>,
    catalog_request: u64,
    /// Track whose stream the engine holds
    loaded_track: Option<TrackId>,
    /// Last current track reported to the front end
    announced: Option<TrackId>,
    resp_tx: Sender<AudioResponse>,
}

impl PlayerCore {
    pub(crate) fn new(
        config: PlayerConfig,
        engine: StreamEngine,
        catalog: CatalogClient,
        runtime: Handle,
        resp_tx: Sender<AudioResponse>,
    ) -> Self {
        let (catalog_tx, catalog_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            queue: QueueController::new(),
            engine,
            catalog,
            runtime,
            catalog_tx,
            catalog_rx,
            catalog_request: 0,
            loaded_track: None,
            announced: None,
            resp_tx,
        }
    }

    fn run(&mut self, cmd_rx: &Receiver<AudioCommand>) {
        let loader_rx = self.engine.loader_events();
        let catalog_rx = self.catalog_rx.clone();
        let ticker = crossbeam_channel::tick(self.config.tick_interval());

        log::info!("Player thread started");
        loop {
            select! {
                recv(cmd_rx) -> command => match command {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => {
                        log::warn!("Command channel closed");
                        break;
                    }
                },
                recv(loader_rx) -> message => {
                    if let Ok(message) = message {
                        self.on_loader_message(message);
                    }
                }
                recv(catalog_rx) -> result => {
                    if let Ok((request, result)) = result {
                        self.on_catalog_result(request, result);
                    }
                }
                recv(ticker) -> _ => self.on_tick(),
            }
        }

        self.engine.teardown();
        self.respond(AudioResponse::Shutdown);
        log::info!("Player thread stopped");
    }

    fn respond(&self, response: AudioResponse) {
        if self.resp_tx.send(response).is_err() {
            log::debug!("Front end gone, response dropped");
        }
    }

    /// Returns false once the player should stop
    pub(crate) fn handle_command(&mut self, command: AudioCommand) -> bool {
        log::debug!("Command: {:?}", command);
        match command {
            AudioCommand::FetchCatalog => self.fetch_catalog(),
            AudioCommand::SelectTrack(id) => self.apply(QueueAction::Select(id), Intent::Play),
            AudioCommand::Next => self.apply(QueueAction::Advance, Intent::Play),
            AudioCommand::Previous => self.apply(QueueAction::Retreat, Intent::Play),
            AudioCommand::TogglePlayPause => {
                if self.engine.has_stream() {
                    self.engine.toggle_play_pause();
                } else {
                    self.sync_stream(Intent::Play);
                }
            }
            AudioCommand::Seek(seconds) => self.engine.seek(seconds),
            AudioCommand::SetVolume(level) => self.engine.set_volume(level),
            AudioCommand::ToggleMute => self.engine.toggle_mute(),
            AudioCommand::ToggleLoop => {
                self.queue.apply(QueueAction::ToggleLoop);
                self.engine.set_looping(self.queue.mode().looping);
                self.publish_queue();
            }
            AudioCommand::ToggleShuffle => self.apply(QueueAction::ToggleShuffle, Intent::Follow),
            AudioCommand::ActivateCustomQueue => {
                self.apply(QueueAction::ActivateCustom, Intent::Play)
            }
            AudioCommand::ActivatePrimaryQueue => {
                self.apply(QueueAction::ActivatePrimary, Intent::Follow)
            }
            AudioCommand::PlayFrom { source, id } => {
                self.apply(QueueAction::PlayFrom(source, id), Intent::Play)
            }
            AudioCommand::AddToCustomQueue(id) => {
                self.apply(QueueAction::AddToCustom(id), Intent::Follow)
            }
            AudioCommand::RemoveFromCustomQueue(id) => {
                self.apply(QueueAction::RemoveFromCustom(id), Intent::Follow)
            }
            AudioCommand::Quit => return false,
        }
        self.process_engine_events();
        true
    }

    pub(crate) fn on_loader_message(&mut self, message: LoaderMessage) {
        self.engine.handle_loader_message(message);
        self.process_engine_events();
    }

    pub(crate) fn on_tick(&mut self) {
        self.engine.tick();
        self.process_engine_events();
    }

    fn fetch_catalog(&mut self) {
        self.catalog_request += 1;
        let request = self.catalog_request;
        let client = self.catalog.clone();
        let tx = self.catalog_tx.clone();
        log::info!("Fetching catalog from {} (request {})", client.url(), request);
        self.runtime.spawn(async move {
            let result = client.fetch_tracks().await;
            let _ = tx.send((request, result));
        });
    }

    pub(crate) fn on_catalog_result(
        &mut self,
        request: u64,
        result: Result<Vec<Track>, CatalogError>,
    ) {
        if request != self.catalog_request {
            log::debug!("Discarding superseded catalog response {}", request);
            return;
        }
        match result {
            Ok(tracks) => {
                self.respond(AudioResponse::CatalogLoaded(tracks.clone()));
                self.queue.apply(QueueAction::LoadCatalog(tracks));
                if let Some(id) = self.loaded_track {
                    // The custom cursor is untouched by a reload; only the catalog side moves
                    self.queue.focus_primary(id);
                }
                self.publish_queue();
                self.sync_stream(Intent::Follow);
            }
            Err(e) => {
                log::warn!("Catalog fetch failed: {}", e);
                self.respond(AudioResponse::CatalogError(e.to_string()));
            }
        }
        self.process_engine_events();
    }

    fn apply(&mut self, action: QueueAction, intent: Intent) {
        match self.queue.apply(action) {
            QueueOutcome::NoOp => return,
            QueueOutcome::Replay => {
                if !self.engine.restart() {
                    self.sync_stream(Intent::Play);
                }
            }
            QueueOutcome::Updated => self.sync_stream(intent),
        }
        self.publish_queue();
    }

    fn publish_queue(&self) {
        self.respond(AudioResponse::QueueUpdated(self.queue.snapshot()));
    }

    /// Bring the engine in line with the queue's current track
    fn sync_stream(&mut self, intent: Intent) {
        let current = self.queue.current().cloned();
        let current_id = current.as_ref().map(|t| t.id);
        if current_id != self.announced {
            self.announced = current_id;
            self.respond(AudioResponse::TrackChanged(current.clone()));
        }

        let Some(track) = current else {
            if self.engine.has_stream() {
                self.engine.teardown();
            }
            self.loaded_track = None;
            return;
        };

        let alive = self.engine.has_stream();
        let same = alive && self.loaded_track == Some(track.id);
        let transport = self.engine.snapshot();
        match intent {
            Intent::Play if same => {
                if !transport.is_playing && !transport.is_loading {
                    self.engine.toggle_play_pause();
                }
            }
            Intent::Play => self.load_track(&track, true),
            Intent::Follow if alive && !same => {
                self.load_track(&track, transport.is_playing || transport.is_loading)
            }
            Intent::Follow => {}
        }
    }

    fn load_track(&mut self, track: &Track, autoplay: bool) {
        log::info!("Now loading {} (#{})", track, track.id);
        let url = track.stream_url(&self.config.stream_base_url, self.config.bitrate);
        self.engine.load(
            &url,
            LoadOptions {
                looping: self.queue.mode().looping,
                autoplay,
                start_at: 0.0,
            },
        );
        self.loaded_track = Some(track.id);
    }

    fn process_engine_events(&mut self) {
        loop {
            let events = self.engine.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    EngineEvent::TrackEnded => {
                        self.respond(AudioResponse::TrackEnded);
                        self.apply(QueueAction::Advance, Intent::Play);
                    }
                    EngineEvent::Error(error) => self.respond(AudioResponse::Error(error)),
                    EngineEvent::LoadStateChanged(loading) => {
                        self.respond(AudioResponse::LoadStateChanged(loading))
                    }
                    EngineEvent::TransportChanged(snapshot) => {
                        self.respond(AudioResponse::TransportChanged(snapshot))
                    }
                }
            }
        }
    }
}
