use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{error::ConfigError, track::DEFAULT_BITRATE};

/// Which streaming backend the engine is built with
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// Single progressive audio resource per track
    Progressive,
    /// Segmented adaptive-bitrate manifest (M3U8)
    #[default]
    Hls,
}

/// Runtime configuration of the player
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Full URL of the catalog listing
    pub catalog_url: String,
    /// Base URL under which `<id>/<bitrate>` stream resources live
    pub stream_base_url: String,
    pub bitrate: u32,
    pub backend: BackendKind,
    /// Initial volume (0.0 to 1.0)
    pub default_volume: f32,
    /// Interval of position ticks while playing
    pub tick_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Automatic reloads allowed after a network failure
    pub network_retries: u32,
    /// Decoder recoveries allowed after a media failure
    pub decode_recoveries: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            catalog_url: "http://127.0.0.1:3000/songs".to_string(),
            stream_base_url: "http://127.0.0.1:3000/stream".to_string(),
            bitrate: DEFAULT_BITRATE,
            backend: BackendKind::default(),
            default_volume: 1.0,
            tick_interval_ms: 250,
            request_timeout_secs: 30,
            network_retries: 1,
            decode_recoveries: 1,
        }
    }
}

impl PlayerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        log::info!("Loading player configuration from {:?}", path);
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("catalog_url", &self.catalog_url),
            ("stream_base_url", &self.stream_base_url),
        ] {
            let url = reqwest::Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} '{value}': {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be http(s), got '{}'",
                    url.scheme()
                )));
            }
        }
        if self.bitrate == 0 {
            return Err(ConfigError::Invalid("bitrate must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(ConfigError::Invalid(format!(
                "default_volume {} outside 0.0..=1.0",
                self.default_volume
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Shared HTTP client honouring the request timeout
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlayerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.backend, BackendKind::Hls);
        assert_eq!(config.bitrate, 192);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = PlayerConfig::from_toml_str(
            r#"
            catalog_url = "http://10.0.0.5:3000/songs"
            backend = "progressive"
            default_volume = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog_url, "http://10.0.0.5:3000/songs");
        assert_eq!(config.backend, BackendKind::Progressive);
        assert_eq!(config.default_volume, 0.5);
        assert_eq!(config.stream_base_url, "http://127.0.0.1:3000/stream");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            PlayerConfig::from_toml_str("bitrate = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PlayerConfig::from_toml_str(r#"catalog_url = "ftp://host/songs""#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PlayerConfig::from_toml_str("default_volume = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PlayerConfig::from_toml_str("bitrate = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn backend_kind_parses_from_cli_text() {
        assert_eq!("HLS".parse::<BackendKind>().unwrap(), BackendKind::Hls);
        assert_eq!("progressive".parse::<BackendKind>().unwrap(), BackendKind::Progressive);
        assert!("dash".parse::<BackendKind>().is_err());
    }
}
