//! API key file: a single JSON object `{ "openai_api_key": "..." }`.
//!
//! A missing file is not an error; the session simply runs without a key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub openai_api_key: String,
}

impl Credentials {
    pub fn new(key: &str) -> Self {
        Self {
            openai_api_key: key.trim().to_string(),
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut creds: Credentials = serde_json::from_str(&content)
            .with_context(|| format!("Invalid credentials file {}", path.display()))?;
        creds.openai_api_key = creds.openai_api_key.trim().to_string();

        Ok(Some(creds))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        info!("Saved API key to {}", path.display());
        Ok(())
    }
}

/// Interpret the argument of the configure-key action.
///
/// A path to an existing `.json` file yields its `openai_api_key` field,
/// any other existing file yields its trimmed contents, and anything else
/// is taken as the key itself.
pub fn read_key_source(source: &str) -> Result<String> {
    let expanded = shellexpand::tilde(source.trim()).to_string();
    let path = Path::new(&expanded);

    let key = if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if path.extension().is_some_and(|ext| ext == "json") {
            let creds: Credentials = serde_json::from_str(&content)
                .with_context(|| format!("Invalid key file {}", path.display()))?;
            creds.openai_api_key
        } else {
            content
        }
    } else {
        source.to_string()
    };

    let key: String = key
        .trim()
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect();

    if key.is_empty() {
        anyhow::bail!("Invalid API key: empty");
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = Credentials::load(&tmp.path().join("credentials.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("credentials.json");

        Credentials::new("  sk-test-123\n").save(&path).unwrap();
        let loaded = Credentials::load(&path).unwrap().unwrap();
        assert_eq!(loaded.openai_api_key, "sk-test-123");
    }

    #[test]
    fn key_source_json_text_and_literal() {
        let tmp = tempfile::tempdir().unwrap();

        let json_path = tmp.path().join("key.json");
        fs::write(&json_path, r#"{"openai_api_key": "sk-json"}"#).unwrap();
        assert_eq!(read_key_source(json_path.to_str().unwrap()).unwrap(), "sk-json");

        let txt_path = tmp.path().join("key.txt");
        fs::write(&txt_path, "sk-text\n").unwrap();
        assert_eq!(read_key_source(txt_path.to_str().unwrap()).unwrap(), "sk-text");

        assert_eq!(read_key_source("sk-literal").unwrap(), "sk-literal");
    }

    #[test]
    fn empty_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let txt_path = tmp.path().join("blank.txt");
        fs::write(&txt_path, "   \n").unwrap();
        assert!(read_key_source(txt_path.to_str().unwrap()).is_err());
        assert!(read_key_source("   ").is_err());
    }
}
