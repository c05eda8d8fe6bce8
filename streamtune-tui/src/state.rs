use ratatui::widgets::ListState;
use streamtune_core::{
    commands::AudioResponse,
    queue::{QueueSnapshot, QueueSource},
    track::{Track, TrackId},
    transport::TransportSnapshot,
};

/// Everything the front end knows, rebuilt from player responses
#[derive(Debug, Clone)]
pub struct AppState {
    pub queue: QueueSnapshot,
    pub transport: TransportSnapshot,
    pub current_track: Option<Track>,
    pub catalog_loading: bool,
    pub catalog_list: ListState,
    pub liked_list: ListState,
    /// Status message to display
    pub status_message: String,
    /// Error message if any
    pub error_message: Option<String>,
    pub shutdown: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            queue: QueueSnapshot::default(),
            transport: TransportSnapshot {
                is_playing: false,
                position_seconds: 0.0,
                duration_seconds: 0.0,
                volume: 1.0,
                is_muted: false,
                is_loading: false,
                last_error: None,
            },
            current_track: None,
            catalog_loading: true,
            catalog_list: ListState::default(),
            liked_list: ListState::default(),
            status_message: "Fetching catalog...".to_string(),
            error_message: None,
            shutdown: false,
        }
    }

    pub fn handle_response(&mut self, response: AudioResponse) {
        match response {
            AudioResponse::CatalogLoaded(tracks) => {
                self.catalog_loading = false;
                self.error_message = None;
                self.status_message = format!("Loaded {} tracks", tracks.len());
            }
            AudioResponse::CatalogError(message) => {
                self.catalog_loading = false;
                self.error_message = Some(format!("Catalog unavailable: {} (r to retry)", message));
                self.status_message = "Catalog fetch failed".to_string();
            }
            AudioResponse::QueueUpdated(snapshot) => {
                self.queue = snapshot;
                clamp_selection(&mut self.catalog_list, self.queue.catalog.len());
                clamp_selection(&mut self.liked_list, self.queue.custom.len());
            }
            AudioResponse::TrackChanged(track) => {
                self.status_message = match &track {
                    Some(track) => format!("Selected: {}", track),
                    None => "Nothing queued".to_string(),
                };
                self.current_track = track;
            }
            AudioResponse::TransportChanged(snapshot) => {
                if let Some(error) = &snapshot.last_error {
                    self.error_message = Some(error.to_string());
                } else if self.transport.last_error.is_some() {
                    self.error_message = None;
                }
                self.transport = snapshot;
            }
            AudioResponse::LoadStateChanged(loading) => {
                if loading {
                    self.status_message = "Buffering...".to_string();
                } else if let Some(track) = &self.current_track {
                    self.status_message = format!("Now playing: {}", track);
                }
            }
            AudioResponse::TrackEnded => {
                log::debug!("Track ended");
            }
            AudioResponse::Error(error) => {
                self.error_message = Some(error.to_string());
            }
            AudioResponse::Shutdown => {
                self.shutdown = true;
            }
        }
    }

    pub fn is_liked(&self, id: TrackId) -> bool {
        self.queue.is_liked(id)
    }

    pub fn source(&self) -> QueueSource {
        self.queue.mode.source
    }

    pub fn catalog_next(&mut self) {
        select_next(&mut self.catalog_list, self.queue.catalog.len());
    }

    pub fn catalog_prev(&mut self) {
        select_prev(&mut self.catalog_list, self.queue.catalog.len());
    }

    pub fn catalog_selected(&self) -> Option<&Track> {
        self.catalog_list
            .selected()
            .and_then(|i| self.queue.catalog.get(i))
    }

    pub fn liked_next(&mut self) {
        select_next(&mut self.liked_list, self.queue.custom.len());
    }

    pub fn liked_prev(&mut self) {
        select_prev(&mut self.liked_list, self.queue.custom.len());
    }

    pub fn liked_selected(&self) -> Option<&Track> {
        self.liked_list
            .selected()
            .and_then(|i| self.queue.custom.get(i))
    }
}

fn select_next(list: &mut ListState, len: usize) {
    if len == 0 {
        list.select(None);
        return;
    }
    let i = match list.selected() {
        Some(i) if i + 1 < len => i + 1,
        Some(_) => 0,
        None => 0,
    };
    list.select(Some(i));
}

fn select_prev(list: &mut ListState, len: usize) {
    if len == 0 {
        list.select(None);
        return;
    }
    let i = match list.selected() {
        Some(0) | None => len - 1,
        Some(i) => i - 1,
    };
    list.select(Some(i));
}

fn clamp_selection(list: &mut ListState, len: usize) {
    match list.selected() {
        _ if len == 0 => list.select(None),
        Some(i) if i >= len => list.select(Some(len - 1)),
        None => list.select(Some(0)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use streamtune_core::{
        error::{ErrorCategory, PlaybackError},
        queue::QueueController,
    };

    use super::*;

    fn snapshot_with_catalog() -> QueueSnapshot {
        let mut queue = QueueController::new();
        queue.load_catalog(vec![
            Track::new(1, "A", "X"),
            Track::new(2, "B", "Y"),
            Track::new(3, "C", "Z"),
        ]);
        queue.add_to_custom_queue(2);
        queue.snapshot()
    }

    #[test]
    fn queue_update_initialises_selection() {
        let mut state = AppState::new();
        state.handle_response(AudioResponse::QueueUpdated(snapshot_with_catalog()));
        assert_eq!(state.catalog_selected().map(|t| t.id), Some(1));
        assert_eq!(state.liked_selected().map(|t| t.id), Some(2));
        assert!(state.is_liked(2));
        assert!(!state.is_liked(1));
    }

    #[test]
    fn list_navigation_wraps() {
        let mut state = AppState::new();
        state.handle_response(AudioResponse::QueueUpdated(snapshot_with_catalog()));
        state.catalog_prev();
        assert_eq!(state.catalog_selected().map(|t| t.id), Some(3));
        state.catalog_next();
        assert_eq!(state.catalog_selected().map(|t| t.id), Some(1));

        state.liked_next();
        assert_eq!(state.liked_selected().map(|t| t.id), Some(2));
    }

    #[test]
    fn errors_are_shown_and_cleared() {
        let mut state = AppState::new();
        let error = PlaybackError::new(ErrorCategory::Network, Some("httpStatus404".into()));
        let mut transport = state.transport.clone();
        transport.last_error = Some(error);
        state.handle_response(AudioResponse::TransportChanged(transport.clone()));
        assert_eq!(
            state.error_message.as_deref(),
            Some("Player Error: networkError - httpStatus404")
        );

        transport.last_error = None;
        state.handle_response(AudioResponse::TransportChanged(transport));
        assert_eq!(state.error_message, None);
    }

    #[test]
    fn catalog_error_mentions_retry() {
        let mut state = AppState::new();
        state.handle_response(AudioResponse::CatalogError("HTTP 500".into()));
        assert!(!state.catalog_loading);
        assert!(state.error_message.unwrap().contains("retry"));
    }
}
