//! Persistence of the AIS target registry between runs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use seawatch_core::ais::{AisTarget, TargetSnapshot};

use crate::ServerError;

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Load the saved targets. A store that was never written yields no targets.
    async fn load(&self) -> Result<Vec<AisTarget>, ServerError>;

    async fn save(&self, targets: &TargetSnapshot, saved_at: u64) -> Result<(), ServerError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedTargets {
    saved_at: u64,
    targets: Vec<AisTarget>,
}

/// Targets saved as a single JSON document
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TargetStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<AisTarget>, ServerError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let saved: SavedTargets = serde_json::from_str(&json)?;
        Ok(saved.targets)
    }

    async fn save(&self, targets: &TargetSnapshot, saved_at: u64) -> Result<(), ServerError> {
        let saved = SavedTargets {
            saved_at,
            targets: targets.values().cloned().collect(),
        };
        let json = serde_json::to_string(&saved)?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Readers only ever see a complete file
        let partial = self.path.with_extension("json.partial");
        tokio::fs::write(&partial, json).await?;
        tokio::fs::rename(&partial, &self.path).await?;
        Ok(())
    }
}
