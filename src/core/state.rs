//! CJ-011: Fingerprint state — load, save (atomic), path derivation.

use super::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// State file name under the root unit's build directory.
pub const STATE_FILE: &str = "conjurer-state.yaml";

/// Recorded outcome of one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Input fingerprint the outputs were produced from
    pub fingerprint: String,

    /// Fingerprint of the outputs after the run
    pub outputs: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// Persisted fingerprints for every executed work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    pub schema: String,
    pub generator: String,
    pub root: String,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskRecord>,
}

impl BuildState {
    pub fn new(root: &str) -> Self {
        Self {
            schema: "1.0".to_string(),
            generator: format!("conjurer {}", env!("CARGO_PKG_VERSION")),
            root: root.to_string(),
            tasks: IndexMap::new(),
        }
    }

    pub fn record(&self, task: &str) -> Option<&TaskRecord> {
        self.tasks.get(task)
    }
}

/// Derive the state file path from the root unit's build directory.
pub fn state_file_path(build_dir: &Path) -> PathBuf {
    build_dir.join(STATE_FILE)
}

/// Load the state file. Returns None if it doesn't exist.
pub fn load_state(build_dir: &Path) -> Result<Option<BuildState>> {
    let path = state_file_path(build_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| Error::io("cannot read", &path, e))?;
    let state: BuildState = serde_yaml_ng::from_str(&content)
        .map_err(|e| Error::Manifest(format!("invalid state file {}: {}", path.display(), e)))?;
    Ok(Some(state))
}

/// Save the state file atomically (write to temp, then rename).
pub fn save_state(build_dir: &Path, state: &BuildState) -> Result<()> {
    std::fs::create_dir_all(build_dir).map_err(|e| Error::io("cannot create dir", build_dir, e))?;
    let path = state_file_path(build_dir);

    let yaml = serde_yaml_ng::to_string(state)
        .map_err(|e| Error::Manifest(format!("cannot encode state: {}", e)))?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml).map_err(|e| Error::io("cannot write", &tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| Error::io("cannot rename", &tmp_path, e))?;
    Ok(())
}
