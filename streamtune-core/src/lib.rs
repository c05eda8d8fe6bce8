pub mod catalog;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod player;
pub mod queue;
pub mod source;
pub mod track;
pub mod transport;

pub use commands::{AudioCommand, AudioResponse};
pub use config::{BackendKind, PlayerConfig};
pub use player::{Player, PlayerHandle};

/// Install `env_logger` for headless use; honours `RUST_LOG`
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
