use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::SourceError;

/// Supplies the dataset of a store's first snapshot.
pub trait SeedSource<D>: Send + Sync {
    fn load(&self) -> Result<D, SourceError>;
}

/// Reads the seed dataset from a JSON file.
pub struct JsonFileSource<D> {
    path: PathBuf,
    _data: PhantomData<fn() -> D>,
}

impl<D> JsonFileSource<D> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _data: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D: DeserializeOwned> SeedSource<D> for JsonFileSource<D> {
    fn load(&self) -> Result<D, SourceError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}
