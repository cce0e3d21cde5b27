// Keycape Settings Module
// Loads the optional TOML settings file and merges command-line overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::parser::{ConfigError, DEFAULT_MAPPING};
use crate::engine::DEFAULT_TIMEOUT;

/// Effective daemon settings.
///
/// Loaded from a TOML file (default: ~/.config/keycape/config.toml):
///
/// ```toml
/// mapping = "Control_L=Escape;Shift_L=Shift_L|9"
/// timeout_ms = 500
/// group_tracking = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    mapping: String,
    timeout: Duration,
    group_tracking: bool,
    source_path: Option<PathBuf>,
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    #[serde(default)]
    mapping: Option<String>,

    #[serde(default)]
    timeout_ms: Option<u64>,

    #[serde(default)]
    group_tracking: Option<bool>,
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub mapping: Option<String>,
    pub timeout_ms: Option<u64>,
    pub no_group_tracking: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            mapping: DEFAULT_MAPPING.to_string(),
            timeout: DEFAULT_TIMEOUT,
            group_tracking: true,
            source_path: None,
        }
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let parsed: SettingsToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();
        if let Some(mapping) = parsed.mapping {
            settings.mapping = mapping;
        }
        if let Some(ms) = parsed.timeout_ms {
            settings.timeout = timeout_from_ms(ms)?;
        }
        if let Some(enabled) = parsed.group_tracking {
            settings.group_tracking = enabled;
        }
        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keycape").join("config.toml"))
    }

    /// Load from the default location, or defaults if there is no file
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                log::debug!("Loading settings from {}", path.display());
                return Self::from_file(path);
            }
        }
        Ok(Self::new())
    }

    /// Load `path` if given, otherwise the default location
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load_default(),
        }
    }

    /// Apply command-line values on top of the file's
    pub fn merge_cli(mut self, cli: &CliOverrides) -> Result<Self, ConfigError> {
        if let Some(mapping) = &cli.mapping {
            self.mapping = mapping.clone();
        }
        if let Some(ms) = cli.timeout_ms {
            self.timeout = timeout_from_ms(ms)?;
        }
        if cli.no_group_tracking {
            self.group_tracking = false;
        }
        Ok(self)
    }

    pub fn mapping(&self) -> &str {
        &self.mapping
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn group_tracking(&self) -> bool {
        self.group_tracking
    }

    /// File the settings were read from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

fn timeout_from_ms(ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidTimeout(ms));
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_settings_default() {
        let settings = Settings::new();
        assert_eq!(settings.mapping(), "Control_L=Escape");
        assert_eq!(settings.timeout(), Duration::from_millis(500));
        assert!(settings.group_tracking());
        assert!(settings.source_path().is_none());
    }

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
mapping = "Shift_L=Shift_L|9;Shift_R=Shift_R|0"
timeout_ms = 250
group_tracking = false
"#;

        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.mapping(), "Shift_L=Shift_L|9;Shift_R=Shift_R|0");
        assert_eq!(settings.timeout(), Duration::from_millis(250));
        assert!(!settings.group_tracking());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml("timeout_ms = 300").unwrap();
        assert_eq!(settings.mapping(), DEFAULT_MAPPING);
        assert!(settings.group_tracking());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Settings::from_toml("mappings = \"Control_L=Escape\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Settings::from_toml("timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(0)));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = Settings::from_toml("mapping = \"Super_L=Control_L|Escape\"\ntimeout_ms = 250")
            .unwrap();
        let cli = CliOverrides {
            mapping: Some("Caps_Lock=Escape".to_string()),
            timeout_ms: Some(800),
            no_group_tracking: true,
        };

        let merged = file.merge_cli(&cli).unwrap();
        assert_eq!(merged.mapping(), "Caps_Lock=Escape");
        assert_eq!(merged.timeout(), Duration::from_millis(800));
        assert!(!merged.group_tracking());
    }

    #[test]
    fn test_empty_cli_keeps_file() {
        let file = Settings::from_toml("timeout_ms = 250").unwrap();
        let merged = file.clone().merge_cli(&CliOverrides::default()).unwrap();
        assert_eq!(merged, file);
    }

    #[test]
    fn test_from_file_records_path() {
        let path = std::env::temp_dir().join(format!("keycape-settings-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "group_tracking = false").unwrap();
        drop(file);

        let settings = Settings::from_file(&path).unwrap();
        assert!(!settings.group_tracking());
        assert_eq!(settings.source_path(), Some(path.as_path()));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Settings::from_file("/nonexistent/keycape/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
