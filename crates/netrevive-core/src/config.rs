//! NetRevive.json settings file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// File name of the settings file, placed next to the executable.
pub const CONFIG_FILE_NAME: &str = "NetRevive.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the network adapter that gets reset (e.g. "Ethernet", "eth0").
    pub ethernet_adapter_name: String,
    /// Gateway address probed every cycle.
    pub router_ip_address: String,
    /// Persist warnings and errors to the incident log file.
    pub log_incidents: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ethernet_adapter_name: "Ethernet".to_string(),
            router_ip_address: "192.168.178.1".to_string(),
            log_incidents: true,
        }
    }
}

/// Where the settings returned by [`Settings::load_or_create`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// The file was missing and has been written with defaults.
    Created,
    /// The file existed and was parsed.
    Loaded,
}

impl Settings {
    /// `NetRevive.json` in the directory of the running executable.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let exe = std::env::current_exe().map_err(|source| ConfigError::Io {
            path: PathBuf::from("<current executable>"),
            source,
        })?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the settings file, or create it with defaults when absent.
    pub fn load_or_create(path: &Path) -> Result<(Self, ConfigOrigin), ConfigError> {
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            return Ok((settings, ConfigOrigin::Created));
        }

        let settings = Self::from_file(path)?;
        settings.validate()?;
        Ok((settings, ConfigOrigin::Loaded))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, data).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject settings the watchdog cannot act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ethernet_adapter_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ethernet_adapter_name must not be empty".to_string(),
            ));
        }
        if self.router_ip_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "router_ip_address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_factory_settings() {
        let settings = Settings::default();
        assert_eq!(settings.ethernet_adapter_name, "Ethernet");
        assert_eq!(settings.router_ip_address, "192.168.178.1");
        assert!(settings.log_incidents);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let (settings, origin) = Settings::load_or_create(&path).unwrap();
        assert_eq!(origin, ConfigOrigin::Created);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"ethernet_adapter_name\": \"Ethernet\""));
        assert!(written.contains("\"log_incidents\": true"));
    }

    #[test]
    fn existing_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{
    "ethernet_adapter_name": "eth0",
    "router_ip_address": "10.0.0.1",
    "log_incidents": false
}"#,
        )
        .unwrap();

        let (settings, origin) = Settings::load_or_create(&path).unwrap();
        assert_eq!(origin, ConfigOrigin::Loaded);
        assert_eq!(settings.ethernet_adapter_name, "eth0");
        assert_eq!(settings.router_ip_address, "10.0.0.1");
        assert!(!settings.log_incidents);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"router_ip_address": "192.168.1.1"}"#).unwrap();

        let (settings, _) = Settings::load_or_create(&path).unwrap();
        assert_eq!(settings.router_ip_address, "192.168.1.1");
        assert_eq!(settings.ethernet_adapter_name, "Ethernet");
        assert!(settings.log_incidents);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_or_create(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_adapter_name_is_rejected() {
        let settings = Settings {
            ethernet_adapter_name: "  ".to_string(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }
}
