//! Error types for planet terrain generation

use thiserror::Error;

/// Main error type of the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not a valid index for a child of a quad tree node")]
    InvalidChildIndex(u8),

    #[error("chunk depth {depth} exceeds the maximum depth {max}")]
    DepthOutOfRange { depth: usize, max: usize },

    #[error("chunk depth {depth} does not match its path length {path_len}")]
    DepthMismatch { depth: usize, path_len: usize },

    #[error("no more meshes available")]
    MeshesExhausted,

    #[error("chunk build failed: {0}")]
    BuildFailed(String),

    #[error("worker pool error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
