use crate::{
    error::PlaybackError,
    queue::{QueueSnapshot, QueueSource},
    track::{Track, TrackId},
    transport::TransportSnapshot,
};

/// Commands sent from the TUI to the player thread
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    /// (Re)fetch the catalog; replaces the primary queue on success
    FetchCatalog,
    /// Make the track current in the active queue and play it
    SelectTrack(TrackId),
    /// Skip to next track in the active queue
    Next,
    /// Skip to previous track in the active queue
    Previous,
    TogglePlayPause,
    /// Seek to position in seconds
    Seek(f32),
    /// Set volume (0.0 to 1.0)
    SetVolume(f32),
    ToggleMute,
    ToggleLoop,
    ToggleShuffle,
    /// Play from the liked-songs queue
    ActivateCustomQueue,
    /// Go back to the catalog-ordered queue
    ActivatePrimaryQueue,
    /// Make `source` the active queue and play `id` from it
    PlayFrom { source: QueueSource, id: TrackId },
    AddToCustomQueue(TrackId),
    RemoveFromCustomQueue(TrackId),
    /// Shutdown the player thread
    Quit,
}

/// Responses sent from the player thread to the TUI
#[derive(Debug, Clone, PartialEq)]
pub enum AudioResponse {
    CatalogLoaded(Vec<Track>),
    /// Catalog fetch failed; retry with [`AudioCommand::FetchCatalog`]
    CatalogError(String),
    QueueUpdated(QueueSnapshot),
    /// The derived current track changed
    TrackChanged(Option<Track>),
    TransportChanged(TransportSnapshot),
    LoadStateChanged(bool),
    TrackEnded,
    Error(PlaybackError),
    /// Player is shutting down
    Shutdown,
}
