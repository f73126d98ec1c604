//! Session state persisted between CLI runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::agent::ChatHistory;
use crate::scene::MemoryScene;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub scene: MemoryScene,

    #[serde(default)]
    pub history: ChatHistory,

    /// Last generated batch, unvalidated
    #[serde(default)]
    pub last_commands: Vec<Value>,

    #[serde(default)]
    pub last_explanation: String,

    #[serde(default)]
    pub last_result: String,

    /// Model request times (Unix ms) still inside the rate window
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_requests: Vec<i64>,
}

impl SessionState {
    /// Read the state file; a missing file yields a fresh session.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No session file at {}, starting fresh", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Corrupt session file {}", path.display()))
    }

    /// Write via a temp file and rename so a crash never leaves half a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;

        debug!("Saved session to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatTurn, TurnRole};
    use crate::scene::{PrimitiveKind, Scene, ScenePrimitive};
    use serde_json::json;

    #[test]
    fn missing_file_is_fresh_state() {
        let tmp = tempfile::tempdir().unwrap();
        let state = SessionState::load(&tmp.path().join("session.json")).unwrap();
        assert!(state.history.is_empty());
        assert!(state.scene.is_empty());
        // A fresh scene still has its camera and light
        assert_eq!(state.scene.cameras().len(), 1);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("session.json");

        let mut state = SessionState::default();
        state
            .scene
            .insert(ScenePrimitive::new("A", PrimitiveKind::Cube, [1.0, 0.0, 0.0]))
            .unwrap();
        state.history.push(ChatTurn::new(TurnRole::User, "add a cube"));
        state.last_commands = vec![json!({"command": "create_object", "type": "CUBE"})];
        state.last_result = "Executed 1 command(s) successfully.".into();
        state.save(&path).unwrap();

        let loaded = SessionState::load(&path).unwrap();
        assert!(loaded.scene.contains("A"));
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.last_commands, state.last_commands);
        assert_eq!(loaded.last_result, state.last_result);
        assert!(loaded.recent_requests.is_empty());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(SessionState::load(&path).is_err());
    }
}
