//! The on-disk scenario envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::schema::ids::ScenarioId;
use crate::schema::scenario::Scenario;

pub const SCHEMA_URL: &str = "https://tabletop-engine.dev/schema/scenario-v1.json";
pub const VERSION: &str = "1.0.0";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported format version {0}, expected {FORMAT_VERSION}")]
    UnsupportedFormat(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: ScenarioId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A scenario wrapped with its schema tag and a metadata summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFile {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub format_version: u32,
    pub metadata: FileMetadata,
    pub scenario: Scenario,
}

impl ScenarioFile {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            schema: SCHEMA_URL.to_string(),
            version: VERSION.to_string(),
            format_version: FORMAT_VERSION,
            metadata: FileMetadata {
                id: scenario.id.clone(),
                title: scenario.title.clone(),
                created_at: scenario.created_at,
                updated_at: scenario.updated_at,
            },
            scenario: scenario.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<ScenarioFile, PersistError> {
        let file: ScenarioFile = serde_json::from_str(input)?;
        if file.format_version != FORMAT_VERSION {
            return Err(PersistError::UnsupportedFormat(file.format_version));
        }
        Ok(file)
    }

    pub fn into_scenario(self) -> Scenario {
        self.scenario
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), PersistError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        info!(path = %path.display(), scenario_id = %self.metadata.id, "saved scenario file");
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<ScenarioFile, PersistError> {
        let contents = std::fs::read_to_string(path)?;
        let file = Self::from_json(&contents)?;
        info!(path = %path.display(), scenario_id = %file.metadata.id, "loaded scenario file");
        Ok(file)
    }
}
