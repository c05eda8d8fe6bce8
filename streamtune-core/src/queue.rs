use rand::{Rng, seq::SliceRandom};

use crate::track::{Track, TrackId};

/// Which queue governs advance/retreat/select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum QueueSource {
    #[default]
    #[strum(serialize = "Catalog")]
    Primary,
    #[strum(serialize = "♥ Liked")]
    Custom,
}

/// Flags layered on top of whichever queue is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackMode {
    /// Replay the current track instead of advancing
    pub looping: bool,
    pub shuffle: bool,
    pub source: QueueSource,
}

/// Result of a queue transition, used by the player to decide what to do with the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Nothing changed
    NoOp,
    /// Queue contents, index or mode changed; the current track may differ
    Updated,
    /// Looping: the same track must be played again from the start
    Replay,
}

/// Every mutation the controller accepts
#[derive(Debug, Clone, PartialEq)]
pub enum QueueAction {
    LoadCatalog(Vec<Track>),
    Select(TrackId),
    Advance,
    Retreat,
    ToggleLoop,
    ToggleShuffle,
    ActivateCustom,
    ActivatePrimary,
    /// Switch queues and select in one step
    PlayFrom(QueueSource, TrackId),
    AddToCustom(TrackId),
    RemoveFromCustom(TrackId),
}

/// An ordered list of tracks with a cursor.
///
/// `index` is only meaningful while `tracks` is non-empty, and is kept in
/// `0..tracks.len()` whenever it is.
#[derive(Debug, Clone, Default)]
struct TrackList {
    tracks: Vec<Track>,
    index: usize,
}

impl TrackList {
    fn new(tracks: Vec<Track>) -> Self {
        Self { tracks, index: 0 }
    }

    fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    fn position(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    fn contains(&self, id: TrackId) -> bool {
        self.position(id).is_some()
    }

    /// Move the cursor onto `id`, or to the first track when it is absent
    fn reposition(&mut self, id: Option<TrackId>) {
        self.index = id.and_then(|id| self.position(id)).unwrap_or(0);
    }
}

/// Snapshot of the queue state for front ends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Catalog in its original order
    pub catalog: Vec<Track>,
    /// Tracks of the active queue in playback order
    pub active: Vec<Track>,
    /// Liked tracks in the order they were added
    pub custom: Vec<Track>,
    /// Cursor into `active`, `None` when it is empty
    pub index: Option<usize>,
    pub mode: PlaybackMode,
}

impl QueueSnapshot {
    pub fn is_liked(&self, id: TrackId) -> bool {
        self.custom.iter().any(|t| t.id == id)
    }
}

/// Owns the primary (catalog) queue, the liked-songs queue and the playback mode.
///
/// All state changes go through the operations below (or [`QueueController::apply`]),
/// each of which leaves the index valid for the queue it belongs to.
#[derive(Debug, Clone, Default)]
pub struct QueueController {
    /// Catalog in the order it was fetched
    catalog: Vec<Track>,
    /// Catalog in playback order (shuffled or not)
    primary: TrackList,
    custom: TrackList,
    mode: PlaybackMode,
}

impl QueueController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reducer entry point
    pub fn apply(&mut self, action: QueueAction) -> QueueOutcome {
        match action {
            QueueAction::LoadCatalog(tracks) => self.load_catalog(tracks),
            QueueAction::Select(id) => self.select_track(id),
            QueueAction::Advance => self.advance(),
            QueueAction::Retreat => self.retreat(),
            QueueAction::ToggleLoop => self.toggle_loop(),
            QueueAction::ToggleShuffle => self.toggle_shuffle(),
            QueueAction::ActivateCustom => self.activate_custom_queue(),
            QueueAction::ActivatePrimary => self.activate_primary_queue(),
            QueueAction::PlayFrom(source, id) => self.play_from(source, id),
            QueueAction::AddToCustom(id) => self.add_to_custom_queue(id),
            QueueAction::RemoveFromCustom(id) => self.remove_from_custom_queue(id),
        }
    }

    // ==============================================
    // Accessors
    // ==============================================

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn catalog(&self) -> &[Track] {
        &self.catalog
    }

    /// Tracks of the active queue in playback order
    pub fn active_tracks(&self) -> &[Track] {
        &self.active().tracks
    }

    pub fn custom_tracks(&self) -> &[Track] {
        &self.custom.tracks
    }

    /// Index into the active queue, `None` when it is empty
    pub fn current_index(&self) -> Option<usize> {
        let active = self.active();
        (!active.tracks.is_empty()).then_some(active.index)
    }

    pub fn current(&self) -> Option<&Track> {
        self.active().current()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            catalog: self.catalog.clone(),
            active: self.active_tracks().to_vec(),
            custom: self.custom.tracks.clone(),
            index: self.current_index(),
            mode: self.mode,
        }
    }

    fn active(&self) -> &TrackList {
        match self.mode.source {
            QueueSource::Primary => &self.primary,
            QueueSource::Custom => &self.custom,
        }
    }

    fn active_mut(&mut self) -> &mut TrackList {
        match self.mode.source {
            QueueSource::Primary => &mut self.primary,
            QueueSource::Custom => &mut self.custom,
        }
    }

    // ==============================================
    // Operations
    // ==============================================

    /// Replace the catalog; the primary queue follows its order from index 0
    pub fn load_catalog(&mut self, tracks: Vec<Track>) -> QueueOutcome {
        log::info!("Catalog loaded with {} tracks", tracks.len());
        self.catalog = tracks.clone();
        self.primary = TrackList::new(tracks);
        self.mode.shuffle = false;
        QueueOutcome::Updated
    }

    /// Point the active queue at `id`; absent ids are ignored
    pub fn select_track(&mut self, id: TrackId) -> QueueOutcome {
        let active = self.active_mut();
        match active.position(id) {
            Some(pos) => {
                active.index = pos;
                QueueOutcome::Updated
            }
            None => {
                log::debug!("Track {} is not in the active queue, selection ignored", id);
                QueueOutcome::NoOp
            }
        }
    }

    pub fn advance(&mut self) -> QueueOutcome {
        let looping = self.mode.looping;
        let active = self.active_mut();
        if active.tracks.is_empty() {
            return QueueOutcome::NoOp;
        }
        if looping {
            return QueueOutcome::Replay;
        }
        if active.tracks.len() == 1 {
            return QueueOutcome::NoOp;
        }
        active.index = (active.index + 1) % active.tracks.len();
        QueueOutcome::Updated
    }

    pub fn retreat(&mut self) -> QueueOutcome {
        let looping = self.mode.looping;
        let active = self.active_mut();
        if active.tracks.len() < 2 || looping {
            return QueueOutcome::NoOp;
        }
        active.index = if active.index > 0 {
            active.index - 1
        } else {
            active.tracks.len() - 1
        };
        QueueOutcome::Updated
    }

    pub fn toggle_loop(&mut self) -> QueueOutcome {
        self.mode.looping = !self.mode.looping;
        log::debug!("Loop {}", if self.mode.looping { "on" } else { "off" });
        QueueOutcome::Updated
    }

    pub fn toggle_shuffle(&mut self) -> QueueOutcome {
        let mut rng = rand::rng();
        self.toggle_shuffle_with(&mut rng)
    }

    /// [`QueueController::toggle_shuffle`] with a caller-supplied random source
    pub fn toggle_shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> QueueOutcome {
        let current = self.current().map(|t| t.id);

        if self.mode.shuffle {
            self.mode.shuffle = false;
            let primary_current = self.primary.current().map(|t| t.id);
            self.primary = TrackList::new(self.catalog.clone());
            match self.mode.source {
                QueueSource::Primary => self.primary.reposition(current),
                QueueSource::Custom => self.primary.reposition(primary_current),
            }
            log::debug!("Shuffle off, catalog order restored");
        } else {
            self.mode.shuffle = true;
            self.mode.source = QueueSource::Primary;

            let mut rest: Vec<Track> = self
                .catalog
                .iter()
                .filter(|t| Some(t.id) != current)
                .cloned()
                .collect();
            rest.shuffle(rng);

            let mut order = Vec::with_capacity(self.catalog.len());
            if let Some(pinned) = current.and_then(|id| self.catalog.iter().find(|t| t.id == id)) {
                order.push(pinned.clone());
            }
            order.extend(rest);

            self.primary = TrackList::new(order);
            log::debug!("Shuffle on, {} tracks permuted", self.primary.tracks.len());
        }
        QueueOutcome::Updated
    }

    /// Switch to the liked queue from its first track; ignored when it is empty
    pub fn activate_custom_queue(&mut self) -> QueueOutcome {
        if self.custom.tracks.is_empty() {
            return QueueOutcome::NoOp;
        }
        self.mode.source = QueueSource::Custom;
        self.custom.index = 0;
        QueueOutcome::Updated
    }

    /// Switch back to the catalog queue, keeping its cursor
    pub fn activate_primary_queue(&mut self) -> QueueOutcome {
        if self.mode.source == QueueSource::Primary {
            return QueueOutcome::NoOp;
        }
        self.mode.source = QueueSource::Primary;
        QueueOutcome::Updated
    }

    /// Make `source` active with its cursor on `id`; ignored when `id` is not in that queue
    pub fn play_from(&mut self, source: QueueSource, id: TrackId) -> QueueOutcome {
        let list = match source {
            QueueSource::Primary => &mut self.primary,
            QueueSource::Custom => &mut self.custom,
        };
        let Some(pos) = list.position(id) else {
            log::debug!("Track {} is not in the {} queue, ignored", id, source);
            return QueueOutcome::NoOp;
        };
        list.index = pos;
        self.mode.source = source;
        QueueOutcome::Updated
    }

    /// Put the primary cursor on `id` without switching queues
    pub fn focus_primary(&mut self, id: TrackId) -> QueueOutcome {
        match self.primary.position(id) {
            Some(pos) => {
                self.primary.index = pos;
                QueueOutcome::Updated
            }
            None => QueueOutcome::NoOp,
        }
    }

    pub fn add_to_custom_queue(&mut self, id: TrackId) -> QueueOutcome {
        if self.custom.contains(id) {
            return QueueOutcome::NoOp;
        }
        let Some(track) = self.catalog.iter().find(|t| t.id == id) else {
            log::warn!("Cannot like track {}: not in the catalog", id);
            return QueueOutcome::NoOp;
        };
        self.custom.tracks.push(track.clone());
        QueueOutcome::Updated
    }

    pub fn remove_from_custom_queue(&mut self, id: TrackId) -> QueueOutcome {
        let Some(pos) = self.custom.position(id) else {
            return QueueOutcome::NoOp;
        };
        self.custom.tracks.remove(pos);

        let idx = self.custom.index;
        if pos < idx {
            self.custom.index = idx - 1;
        } else if idx >= self.custom.tracks.len() {
            self.custom.index = self.custom.tracks.len().saturating_sub(1);
        }

        if self.custom.tracks.is_empty() && self.mode.source == QueueSource::Custom {
            // Nothing left to play from; hand over to the catalog queue on the same track
            self.mode.source = QueueSource::Primary;
            if let Some(pos) = self.primary.position(id) {
                self.primary.index = pos;
            }
            log::debug!("Liked queue emptied, falling back to catalog queue");
        }
        QueueOutcome::Updated
    }
}
