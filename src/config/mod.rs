use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "fetchy";

/// Persisted settings document. The download core never reads this
/// directly; resolved values travel in each `DownloadRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub cookies: Option<PathBuf>,
    pub proxy: Option<String>,
    /// Presentation-layer flags, persisted for front-ends that use them.
    pub dark_mode: bool,
    pub startup: bool,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            cookies: None,
            proxy: None,
            dark_mode: false,
            startup: false,
            logging: LoggingSettings::default(),
        }
    }
}

pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Resolves the config file location: explicit flag, then `CONFIG_FILE`,
/// then `$XDG_CONFIG_HOME`, then `~/.config`. Returns None when no document
/// exists anywhere.
pub fn config_path(cli_override: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = cli_override {
        return Some(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = Path::new(&xdg_config_home)
            .join(APP_NAME)
            .join("config.toml");
        if config_path.exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = home.join(".config").join(APP_NAME).join("config.toml");
        if config_path.exists() {
            return Some(config_path);
        }
    }

    None
}

/// Where a fresh config document should be written when none exists yet.
pub fn default_config_location() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Some(
            Path::new(&xdg_config_home)
                .join(APP_NAME)
                .join("config.toml"),
        );
    }
    dirs::home_dir().map(|home| home.join(".config").join(APP_NAME).join("config.toml"))
}
