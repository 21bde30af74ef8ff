//! TOML settings, loaded from `$XDG_CONFIG_HOME/artsync/settings.toml`.
//! A missing file is created with defaults so users have something to edit.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::paths::config_root;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediuxSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Creators in preference order, most preferred first.
    pub priority_usernames: Vec<String>,
    /// When true, sets from creators outside the priority list are skipped.
    pub only_priority_usernames: bool,
    /// Creators filtered out provider-side before ranking ever sees them.
    pub exclude_usernames: Vec<String>,
}

impl Default for MediuxSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.mediux.pro".to_string(),
            api_key: None,
            priority_usernames: Vec::new(),
            only_priority_usernames: false,
            exclude_usernames: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JellyfinSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub skip_libraries: Vec<String>,
    /// Clear the Kometa "Overlay" label after replacing a base image.
    pub kometa_integration: bool,
}

impl Default for JellyfinSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8096".to_string(),
            token: None,
            skip_libraries: Vec::new(),
            kometa_integration: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub skip_libraries: Vec<String>,
    pub kometa_integration: bool,
}

impl Default for PlexSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:32400".to_string(),
            token: None,
            skip_libraries: Vec::new(),
            kometa_integration: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mediux: MediuxSettings,
    pub jellyfin: JellyfinSettings,
    pub plex: PlexSettings,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        config_root().join("settings.toml")
    }

    /// Load settings, writing a default file first if none exists.
    pub fn load_or_create(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| ServiceError::Validation(format!("settings: {err}")))
    }

    pub fn save(&self, path: &Path) -> Result<(), ServiceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|err| ServiceError::Validation(format!("settings: {err}")))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let settings = Settings::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.mediux.base_url, "https://api.mediux.pro");
        assert!(settings.mediux.api_key.is_none());
        assert!(!settings.mediux.only_priority_usernames);

        // Loading again parses the file it just wrote.
        let reloaded = Settings::load_or_create(&path).unwrap();
        assert_eq!(reloaded.jellyfin.base_url, settings.jellyfin.base_url);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            r#"
[mediux]
api_key = "secret"
priority_usernames = ["alice", "bob"]

[plex]
token = "t0k3n"
kometa_integration = true
"#,
        )
        .unwrap();

        let settings = Settings::load_or_create(&path).unwrap();
        assert_eq!(settings.mediux.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.mediux.priority_usernames, vec!["alice", "bob"]);
        assert_eq!(settings.mediux.base_url, "https://api.mediux.pro");
        assert!(settings.plex.kometa_integration);
        assert!(settings.jellyfin.token.is_none());
    }

    #[test]
    fn test_malformed_file_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "not valid toml [").unwrap();
        assert!(matches!(
            Settings::load_or_create(&path),
            Err(ServiceError::Validation(_))
        ));
    }
}
