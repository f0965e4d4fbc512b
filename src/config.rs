//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/headright/headright.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `HEADRIGHT_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Unified configuration for headright.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Ledger used when no `--file` is given
    pub ledger_file: PathBuf,
    /// Decimal places for percentages
    pub precision: usize,
    /// List claimants whose share is zero in reports
    pub show_zero_claimants: bool,
    /// Persist the undo stack inside the ledger file
    pub keep_history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_file: default_ledger_file(),
            precision: 4,
            show_zero_claimants: false,
            keep_history: true,
        }
    }
}

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub ledger_file: Option<PathBuf>,
    pub precision: Option<usize>,
    pub show_zero_claimants: Option<bool>,
    pub keep_history: Option<bool>,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "headright")
}

/// Default ledger location (`<data_dir>/ledger.json`).
fn default_ledger_file() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("ledger.json"))
        .unwrap_or_else(|| PathBuf::from("ledger.json"))
}

/// Get the XDG config directory for headright.
pub fn global_config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("headright.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand environment variables and `~` in a path string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.ledger_file.to_string_lossy().as_ref());
        self.ledger_file = PathBuf::from(expanded);
    }

    /// Overlay wins wherever it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            ledger_file: overlay
                .ledger_file
                .clone()
                .unwrap_or_else(|| self.ledger_file.clone()),
            precision: overlay.precision.unwrap_or(self.precision),
            show_zero_claimants: overlay
                .show_zero_claimants
                .unwrap_or(self.show_zero_claimants),
            keep_history: overlay.keep_history.unwrap_or(self.keep_history),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file given on the command line; it must exist
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path().filter(|p| p.exists());
        Self::load_from(global.as_deref(), explicit)
    }

    /// Layered load with the global file location supplied by the caller.
    pub fn load_from(global: Option<&Path>, explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global {
            if global_path.exists() {
                current = current.merge_with(&load_raw_settings(global_path)?);
            }
        }

        // 3. Explicit config file
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            current = current.merge_with(&load_raw_settings(path)?);
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current)?;

        current.expand_paths();
        Ok(current)
    }

    /// Apply HEADRIGHT_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("HEADRIGHT").try_parsing(true))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("ledger_file") {
            settings.ledger_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_int("precision") {
            settings.precision = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("HEADRIGHT_PRECISION must not be negative: {val}"),
            })?;
        }
        if let Ok(val) = config.get_bool("show_zero_claimants") {
            settings.show_zero_claimants = val;
        }
        if let Ok(val) = config.get_bool("keep_history") {
            settings.keep_history = val;
        }

        Ok(settings)
    }

    /// Render as TOML (for `config show`).
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {e}"),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

/// Commented template written by `config init`.
pub fn config_template() -> String {
    let defaults = Settings::default();
    format!(
        r#"# headright configuration
#
# Values set here override compiled defaults; HEADRIGHT_* environment
# variables override this file.

# Ledger used when --file is not given (~ and $VARS are expanded)
# ledger_file = "{}"

# Decimal places for percentages
# precision = {}

# List claimants holding a zero share in reports
# show_zero_claimants = {}

# Keep the undo history inside the ledger file
# keep_history = {}
"#,
        defaults.ledger_file.display(),
        defaults.precision,
        defaults.show_zero_claimants,
        defaults.keep_history,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overrides_specified_fields() {
        let base = Settings::default();
        let overlay = RawSettings {
            precision: Some(2),
            ..Default::default()
        };
        let merged = base.merge_with(&overlay);
        assert_eq!(merged.precision, 2);
        assert_eq!(merged.ledger_file, base.ledger_file);
        assert!(merged.keep_history);
    }

    #[test]
    fn template_parses_as_empty_overlay() {
        let raw: RawSettings = toml::from_str(&config_template()).unwrap();
        assert!(raw.precision.is_none());
        assert!(raw.ledger_file.is_none());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back, settings);
    }
}
