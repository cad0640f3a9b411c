//! Review pipeline error types

use thiserror::Error;

use chess_core::GameLoadError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to spawn engine at {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine handshake failed: {0}")]
    Handshake(String),

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine session closed")]
    Closed,

    #[error("Search superseded by a newer request")]
    Superseded,

    #[error("Search cancelled by stop")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache encode error: {0}")]
    Encode(#[from] bincode::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Engine error: {0}")]
    Session(#[from] SessionError),

    #[error("Game load error: {0}")]
    GameLoad(#[from] GameLoadError),

    #[error("No game loaded")]
    NoGameLoaded,

    #[error("Position error at ply {ply}: {reason}")]
    Position { ply: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
