//! Settings file loader and serialization.

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file
pub const SETTINGS_ENV_VAR: &str = "CLOUDMANAGER_BUILD_SETTINGS";

/// Get the global settings path: ~/.config/cloudmanager-esp8266/settings.json
pub fn get_global_settings_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::ValidationFailed("Cannot determine home directory".to_string())
    })?;

    Ok(home.join(".config/cloudmanager-esp8266/settings.json"))
}

/// Load config from JSON file.
pub fn load_config_from_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Configuration file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let config: PipelineConfig = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;
    config.validate()?;

    Ok(config)
}

/// Save config to JSON file.
pub fn save_config_to_file(config: &PipelineConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(ConfigError::IoError)?;
        }
    }

    let json_content = serde_json::to_string_pretty(config).map_err(ConfigError::InvalidJson)?;
    fs::write(path, json_content).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Validate config path (.json extension required).
pub fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => {}
        Some(ext) => {
            return Err(ConfigError::ValidationFailed(format!(
                "Configuration file must have .json extension, got .{}",
                ext.to_string_lossy()
            )))
        }
        None => {
            return Err(ConfigError::ValidationFailed(
                "Configuration file must have .json extension".to_string(),
            ))
        }
    }

    Ok(())
}

/// Where the settings of a run come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// File named explicitly (normally by `CLOUDMANAGER_BUILD_SETTINGS`); must exist
    Explicit(PathBuf),
    /// Global settings file, present on disk
    Global(PathBuf),
    /// Built-in defaults
    Defaults,
}

impl SettingsSource {
    /// Pick the settings source: the explicit path if given, otherwise the
    /// global settings file when present, otherwise the defaults
    pub fn locate(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return SettingsSource::Explicit(path.to_path_buf());
        }
        match get_global_settings_path() {
            Ok(path) if path.exists() => SettingsSource::Global(path),
            _ => SettingsSource::Defaults,
        }
    }

    /// Load the settings, anchoring relative paths at `base`.
    ///
    /// Nothing is logged here: the log destination is itself a setting, so
    /// callers report the source once their logger is installed.
    pub fn load(&self, base: &Path) -> Result<PipelineConfig, ConfigError> {
        let config = match self {
            SettingsSource::Explicit(path) | SettingsSource::Global(path) => {
                load_config_from_file(path)?
            }
            SettingsSource::Defaults => PipelineConfig::default(),
        };
        Ok(config.resolve_paths(base))
    }
}

impl std::fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsSource::Explicit(path) => write!(f, "settings file {}", path.display()),
            SettingsSource::Global(path) => write!(f, "global settings file {}", path.display()),
            SettingsSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Resolve and load the settings for a run.
///
/// An explicit path must exist. Otherwise the global settings file is used
/// when present, and the built-in defaults when not. Relative paths in the
/// result are anchored at `base`.
pub fn load_pipeline_config(
    explicit: Option<&Path>,
    base: &Path,
) -> Result<PipelineConfig, ConfigError> {
    SettingsSource::locate(explicit).load(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.json");

        let mut original = PipelineConfig::default();
        original.install_prerequisites = false;
        original.make_program = "gmake".to_string();
        original.layout.port_dir = "ports/esp8266".to_string();

        save_config_to_file(&original, &config_path).expect("Failed to save config");
        assert!(config_path.exists());

        let loaded = load_config_from_file(&config_path).expect("Failed to load config");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.json");
        fs::write(&config_path, r#"{"make_program": "gmake", "toolchain": {"sentinel": "bin/xtensa-lx106-elf-gcc"}}"#)
            .unwrap();

        let loaded = load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.make_program, "gmake");
        assert_eq!(loaded.toolchain.sentinel, "bin/xtensa-lx106-elf-gcc");
        assert_eq!(loaded.toolchain.output_dir, "xtensa-lx106-elf");
        assert_eq!(loaded.git_program, "git");
    }

    #[test]
    fn test_validate_config_path_invalid_extension() {
        assert!(validate_config_path(Path::new("settings.toml")).is_err());
        assert!(validate_config_path(Path::new("settings")).is_err());
        assert!(validate_config_path(Path::new("")).is_err());
        assert!(validate_config_path(Path::new("/tmp/settings.json")).is_ok());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config_from_file(Path::new("/nonexistent/path/settings.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.json");

        let mut file = fs::File::create(&config_path).unwrap();
        file.write_all(b"{ invalid json }").unwrap();

        let result = load_config_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::InvalidJson(_))));
    }

    #[test]
    fn test_load_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.json");
        fs::write(&config_path, r#"{"git_program": ""}"#).unwrap();

        let result = load_config_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_load_pipeline_config_explicit_resolves_paths() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.json");
        let config = PipelineConfig {
            destination: PathBuf::from("out"),
            ..PipelineConfig::default()
        };
        save_config_to_file(&config, &config_path).unwrap();

        let loaded = load_pipeline_config(Some(&config_path), Path::new("/work")).unwrap();
        assert_eq!(loaded.destination, PathBuf::from("/work/out"));
        assert_eq!(loaded.logs_dir, PathBuf::from("/work/logs"));
    }

    #[test]
    fn test_load_pipeline_config_missing_explicit_file() {
        let result = load_pipeline_config(Some(Path::new("/nonexistent/settings.json")), Path::new("/"));
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_source_explicit_wins() {
        let source = SettingsSource::locate(Some(Path::new("/etc/esp-build/settings.json")));
        assert_eq!(
            source,
            SettingsSource::Explicit(PathBuf::from("/etc/esp-build/settings.json"))
        );
        assert_eq!(
            source.to_string(),
            "settings file /etc/esp-build/settings.json"
        );
    }

    #[test]
    fn test_settings_source_without_explicit_path() {
        let source = SettingsSource::locate(None);
        match get_global_settings_path() {
            Ok(path) if path.exists() => assert_eq!(source, SettingsSource::Global(path)),
            _ => {
                assert_eq!(source, SettingsSource::Defaults);
                assert_eq!(source.to_string(), "built-in defaults");
                let loaded = source.load(Path::new("/work")).unwrap();
                assert_eq!(loaded.logs_dir, PathBuf::from("/work/logs"));
            }
        }
    }

    #[test]
    fn test_settings_source_load_explicit() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.json");
        fs::write(&config_path, r#"{"logs_dir": "build-logs"}"#).unwrap();

        let source = SettingsSource::locate(Some(&config_path));
        let loaded = source.load(temp_dir.path()).unwrap();
        assert_eq!(loaded.logs_dir, temp_dir.path().join("build-logs"));
    }
}
