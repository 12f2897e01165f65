use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::ConfigurationError;
use crate::persist::FieldPath;

/// Knobs of a session that are not part of the game data.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Absolute tolerance for float comparisons in invariant checks.
    pub tolerance: f64,
    /// Write every change of a persisted field back to storage.
    pub write_through: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            write_through: true,
        }
    }
}

/// Everything needed before an island can be built: the static catalog and
/// the flat persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub catalog: Catalog,
    /// `<guid>.<dotted.path>` or `settings.<name>` to the stored string.
    #[serde(default)]
    pub persisted: BTreeMap<String, String>,
}

impl Bundle {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let bundle: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed(e.to_string()))?;
        for key in bundle.unknown_keys() {
            tracing::warn!(key = %key, "persisted key does not address any field");
        }
        Ok(bundle)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Malformed(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Persisted keys that do not parse as a field path.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.persisted
            .keys()
            .filter(|key| key.parse::<FieldPath>().is_err())
            .map(String::as_str)
            .collect()
    }
}
