//! Station directory.
//!
//! The parser resolves ticket station references (ids or names) through a
//! [`StationDirectory`]. [`StationCatalog`] is an in-memory snapshot loaded
//! from YAML:
//!
//! ```yaml
//! stations:
//!   - id: CAI
//!     name: Cais do Sodre
//!     coordinates: { lat: 38.7060, lon: -9.1447 }
//!     aliases: [Cais Sodre]
//! ```

use crate::sanitizer::normalize_key;
use ecofare_core::{Coordinates, StationId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// A resolvable station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: StationId::new(id),
            name: name.into(),
            coordinates: Coordinates::new(lat, lon),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Resolves station ids or names. Implementations must be a consistent
/// snapshot for the duration of a parse.
pub trait StationDirectory: Send + Sync {
    fn resolve(&self, name_or_id: &str) -> Option<Station>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("STATIONS/IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("STATIONS/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("STATIONS/DUPLICATE: '{0}' refers to more than one station")]
    Duplicate(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    stations: Vec<Station>,
}

/// In-memory station directory
#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: Vec<Station>,
    index: HashMap<String, usize>,
}

impl StationCatalog {
    /// Build a catalog; every id, name and alias must identify one station
    pub fn new(stations: Vec<Station>) -> Result<Self, CatalogError> {
        let mut index = HashMap::new();

        for (pos, station) in stations.iter().enumerate() {
            let keys = std::iter::once(station.id.as_str())
                .chain(std::iter::once(station.name.as_str()))
                .chain(station.aliases.iter().map(String::as_str))
                .map(normalize_key);

            for key in keys {
                match index.insert(key.clone(), pos) {
                    Some(prev) if prev != pos => return Err(CatalogError::Duplicate(key)),
                    _ => {}
                }
            }
        }

        Ok(Self { stations, index })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.stations)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl StationDirectory for StationCatalog {
    fn resolve(&self, name_or_id: &str) -> Option<Station> {
        self.index
            .get(&normalize_key(name_or_id))
            .and_then(|pos| self.stations.get(*pos))
            .cloned()
    }
}
