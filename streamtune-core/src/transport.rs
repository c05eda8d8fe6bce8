use crate::error::PlaybackError;

/// Observable playback snapshot of the currently loaded stream
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    /// Current playback position in seconds
    pub position_seconds: f32,
    /// Total duration in seconds, 0 until the stream is ready
    pub duration_seconds: f32,
    /// Volume (0.0 to 1.0), independent of mute
    pub volume: f32,
    pub is_muted: bool,
    pub is_loading: bool,
    pub last_error: Option<PlaybackError>,
}

impl TransportSnapshot {
    /// Get the progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f32 {
        if self.duration_seconds > 0.0 {
            (self.position_seconds / self.duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Format time as MM:SS
    pub fn format_time(seconds: f32) -> String {
        if !seconds.is_finite() {
            return "00:00".to_string();
        }
        let mins = (seconds / 60.0).floor() as u32;
        let secs = (seconds % 60.0).floor() as u32;
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Mutable transport state owned by the engine.
///
/// Volume and mute survive [`TransportState::reset_for_load`]; everything else
/// belongs to a single stream.
#[derive(Debug, Clone)]
pub struct TransportState {
    pub is_playing: bool,
    pub position_seconds: f32,
    pub duration_seconds: f32,
    pub is_loading: bool,
    pub last_error: Option<PlaybackError>,
    volume: f32,
    is_muted: bool,
    /// Last non-zero volume, restored on unmute
    audible_volume: f32,
}

impl TransportState {
    pub fn new(volume: f32) -> Self {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
        Self {
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            is_loading: false,
            last_error: None,
            volume,
            is_muted: volume == 0.0,
            audible_volume: if volume > 0.0 { volume } else { 1.0 },
        }
    }

    pub fn reset_for_load(&mut self) {
        self.is_playing = false;
        self.position_seconds = 0.0;
        self.duration_seconds = 0.0;
        self.is_loading = true;
        self.last_error = None;
    }

    pub fn reset_idle(&mut self) {
        self.reset_for_load();
        self.is_loading = false;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    /// Gain actually applied to the output
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted { 0.0 } else { self.volume }
    }

    /// Set the volume, clamped to 0.0..=1.0. Zero mutes, anything else unmutes.
    /// Non-finite input is ignored.
    pub fn set_volume(&mut self, level: f32) -> bool {
        if !level.is_finite() {
            return false;
        }
        let level = level.clamp(0.0, 1.0);
        self.volume = level;
        if level == 0.0 {
            self.is_muted = true;
        } else {
            self.audible_volume = level;
            self.is_muted = false;
        }
        true
    }

    pub fn toggle_mute(&mut self) {
        if self.is_muted {
            self.is_muted = false;
            if self.volume == 0.0 {
                self.volume = self.audible_volume;
            }
        } else {
            self.is_muted = true;
        }
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            is_playing: self.is_playing,
            position_seconds: self.position_seconds,
            duration_seconds: self.duration_seconds,
            volume: self.volume,
            is_muted: self.is_muted,
            is_loading: self.is_loading,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::new(1.0)
    }
}
