use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use streamtune_core::config::{BackendKind, PlayerConfig};

/// Terminal player for a streaming music catalog
#[derive(Parser, Debug)]
#[command(name = "streamtune", version, about)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "STREAMTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog endpoint returning the track list
    #[arg(long, env = "STREAMTUNE_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// Base URL of the stream endpoint (`<base>/<id>/<bitrate>`)
    #[arg(long, env = "STREAMTUNE_STREAM_URL")]
    pub stream_url: Option<String>,

    /// Streaming backend: `hls` or `progressive`
    #[arg(long, env = "STREAMTUNE_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Requested bitrate in kbps
    #[arg(long, env = "STREAMTUNE_BITRATE")]
    pub bitrate: Option<u32>,
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied
    pub fn into_config(self) -> anyhow::Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PlayerConfig::default(),
        };

        if let Some(url) = self.catalog_url {
            config.catalog_url = url;
        }
        if let Some(url) = self.stream_url {
            config.stream_base_url = url;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(bitrate) = self.bitrate {
            config.bitrate = bitrate;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
