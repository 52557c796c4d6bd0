use std::path::PathBuf;

use drift_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a store must be started from inside a tokio runtime")]
    NoRuntime,
    #[error("invalid sync config: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("seed source unavailable: {0}")]
    Unavailable(String),
}
