//! winffi Configuration
//!
//! Handles parsing and management of winffi.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file name searched for by [`WinffiConfig::find_and_load`].
pub const CONFIG_FILE: &str = "winffi.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching winffi.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WinffiConfig {
    /// Native library location
    #[serde(default)]
    pub library: LibraryConfig,

    /// Constant catalog overrides
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WinffiConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: WinffiConfig = toml::from_str(&content)?;

        // Relative header paths are relative to the config file.
        if let (Some(header), Some(dir)) = (&config.catalog.header, path.parent()) {
            if header.is_relative() {
                config.catalog.header = Some(dir.join(header));
            }
        }
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Native library location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    /// Library name or path
    #[serde(default = "default_library_name")]
    pub name: String,

    /// Extra directories searched before the system loader's defaults
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
}

fn default_library_name() -> String {
    "kernel32.dll".to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: default_library_name(),
            search_paths: Vec::new(),
        }
    }
}

/// Constant catalog overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Header whose `#define`s override the bundled constants
    #[serde(default)]
    pub header: Option<PathBuf>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Colored output
    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WinffiConfig::default();
        assert_eq!(config.library.name, "kernel32.dll");
        assert!(config.library.search_paths.is_empty());
        assert!(config.catalog.header.is_none());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[library]
name = "C:\\Windows\\System32\\kernel32.dll"

[catalog]
header = "extra.h"

[logging]
level = "winffi=trace"
ansi = false
"#;
        let config: WinffiConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.library.name, "C:\\Windows\\System32\\kernel32.dll");
        assert_eq!(config.catalog.header, Some(PathBuf::from("extra.h")));
        assert_eq!(config.logging.level, "winffi=trace");
        assert!(!config.logging.ansi);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: WinffiConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.library, LibraryConfig::default());
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_missing_file() {
        let err = WinffiConfig::load(Path::new("/nonexistent/winffi.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_save_and_find() {
        let dir = std::env::temp_dir().join(format!("winffi_config_{}", std::process::id()));
        let nested = dir.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let mut config = WinffiConfig::default();
        config.catalog.header = Some(PathBuf::from("consts.h"));
        config.save(&dir.join(CONFIG_FILE)).unwrap();

        let found = WinffiConfig::find_and_load(&nested).unwrap();
        assert_eq!(found.catalog.header, Some(dir.join("consts.h")));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
