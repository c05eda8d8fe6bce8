use std::fmt::Display;

use thiserror::Error;

/// Failure while fetching the track catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog request returned HTTP {status}")]
    Http { status: u16 },

    #[error("catalog request failed: {0}")]
    Network(String),

    #[error("catalog payload is not a track list: {0}")]
    Payload(String),
}

/// Failure while loading or playing a stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("malformed manifest: {0}")]
    Manifest(String),

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error("audio output failure: {0}")]
    Output(String),
}

impl StreamError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Http { .. } | StreamError::Network(_) => ErrorCategory::Network,
            StreamError::Decode(_) => ErrorCategory::Media,
            StreamError::Manifest(_) | StreamError::Unsupported(_) | StreamError::Output(_) => {
                ErrorCategory::Other
            }
        }
    }

    /// Whether the engine may attempt an automatic reload/recovery
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Other)
    }

    /// Short machine-readable detail that accompanies the category
    pub fn detail(&self) -> String {
        match self {
            StreamError::Http { status, .. } => format!("httpStatus{}", status),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StreamError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => StreamError::Network(err.to_string()),
        }
    }
}

/// Failure while reading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Coarse classification surfaced to the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorCategory {
    #[strum(serialize = "networkError")]
    Network,
    #[strum(serialize = "mediaError")]
    Media,
    #[strum(serialize = "otherError")]
    Other,
}

/// A terminal playback error as reported through the transport state
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackError {
    pub category: ErrorCategory,
    pub detail: Option<String>,
}

impl PlaybackError {
    pub fn new(category: ErrorCategory, detail: Option<String>) -> Self {
        Self { category, detail }
    }
}

impl From<&StreamError> for PlaybackError {
    fn from(err: &StreamError) -> Self {
        Self::new(err.category(), Some(err.detail()))
    }
}

impl Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player Error: {}", self.category)?;
        if let Some(detail) = &self.detail {
            write!(f, " - {}", detail)?;
        }
        Ok(())
    }
}
