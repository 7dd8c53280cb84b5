//! Configuration file and default locations

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use seawatch_core::Config;

use crate::ServerError;

const TARGETS_FILE: &str = "targets.json";

/// Load the configuration, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<Config, ServerError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let json = std::fs::read_to_string(path)?;
    Ok(Config::from_json(&json)?)
}

/// Where the AIS target registry is saved between runs, in the platform's data
/// directory
pub fn default_targets_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "seawatch", "seawatch").map(|dirs| dirs.data_dir().join(TARGETS_FILE))
}
