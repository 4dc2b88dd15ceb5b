//! Registry datasets
//!
//! A dataset is a JSON array of `{ "id", "name", "code" }` objects in the
//! layout of the published GATT assigned-number lists. Bundled copies of the
//! service and characteristic lists are compiled into the crate.

use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::registry::{ConflictLog, Registry, RegistryEntry, RegistryKind};

const BUNDLED_SERVICES: &str = include_str!("../data/gatt-services-list.json");
const BUNDLED_CHARACTERISTICS: &str = include_str!("../data/gatt-characteristics-list.json");

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse dataset: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Parse dataset entries from a JSON string
pub fn entries_from_json(content: &str) -> Result<Vec<RegistryEntry>, DatasetError> {
    let entries: Vec<RegistryEntry> = serde_json::from_str(content)?;
    Ok(entries)
}

/// Load dataset entries from a JSON file
pub fn entries_from_file(path: &Path) -> Result<Vec<RegistryEntry>, DatasetError> {
    let content = std::fs::read_to_string(path)?;
    let entries = entries_from_json(&content)?;
    debug!(path = %path.display(), entries = entries.len(), "Loaded registry dataset");
    Ok(entries)
}

/// Entries of the dataset bundled for `kind`
pub fn bundled_entries(kind: RegistryKind) -> Result<Vec<RegistryEntry>, DatasetError> {
    let content = match kind {
        RegistryKind::Service => BUNDLED_SERVICES,
        RegistryKind::Characteristic => BUNDLED_CHARACTERISTICS,
    };
    entries_from_json(content)
}

/// Where a registry's entries come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Bundled,
    File(std::path::PathBuf),
}

impl DatasetSource {
    /// Use `path` when given, otherwise the bundled dataset
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::File(path.to_path_buf()),
            None => Self::Bundled,
        }
    }

    pub fn entries(&self, kind: RegistryKind) -> Result<Vec<RegistryEntry>, DatasetError> {
        match self {
            Self::Bundled => bundled_entries(kind),
            Self::File(path) => entries_from_file(path),
        }
    }

    /// Load the entries and build a registry from them
    pub fn build(&self, kind: RegistryKind) -> Result<(Registry, ConflictLog), DatasetError> {
        let entries = self.entries(kind)?;
        Ok(Registry::build(kind, &entries))
    }
}
