use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the dataset directory.
pub const DATA_DIR_ENV_VAR: &str = "PANTRY_DATA_DIR";
/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "pantry_list=info";

/// Unit names the aggregator treats specially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Generic discrete units for which a size qualifier is estimated.
    pub discrete_units: Vec<String>,
    /// Units for which the literal volume and weight needed are reported.
    pub container_units: Vec<String>,
    /// Volume unit the container volume is accumulated in.
    pub volume_unit: String,
    /// Weight unit the container weight is accumulated in.
    pub weight_unit: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            discrete_units: vec!["whole".to_string(), "piece".to_string()],
            container_units: ["package", "can", "bottle", "jar", "container"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            volume_unit: "cup".to_string(),
            weight_unit: "gram".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config at {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse engine config at {:?}", path))
    }

    pub fn is_discrete_unit(&self, unit_name: &str) -> bool {
        self.discrete_units.iter().any(|u| u.eq_ignore_ascii_case(unit_name))
    }

    pub fn is_container_unit(&self, unit_name: &str) -> bool {
        self.container_units.iter().any(|u| u.eq_ignore_ascii_case(unit_name))
    }
}
