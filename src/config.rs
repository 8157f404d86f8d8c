use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Main application configuration, persisted as TOML under the quickgpt
/// home directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the quickGPT server
    pub server_url: String,

    /// UI theme preference ("dark" or "light")
    pub theme: String,

    /// UI preferences
    pub ui: UiConfig,

    /// quickgpt home directory (not persisted; resolved on load)
    #[serde(skip)]
    pub home: PathBuf,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Seconds between background conversation-list refreshes
    pub refresh_interval_secs: u64,
    /// How long a notice stays on screen, in milliseconds
    pub notice_duration_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            refresh_interval_secs: 30,
            notice_duration_ms: 4000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
            theme: "dark".to_string(),
            ui: UiConfig::default(),
            home: default_home(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".quickgpt")
}

impl Config {
    /// Load configuration from the default home directory, creating it with
    /// defaults when missing.
    pub fn load() -> Result<Self> {
        Self::load_from(default_home())
    }

    /// Load configuration rooted at an explicit home directory.
    pub fn load_from(home: PathBuf) -> Result<Self> {
        fs::create_dir_all(&home).context("Failed to create quickgpt home directory")?;

        let config_path = home.join("config.toml");
        let mut config = if config_path.exists() {
            let content =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home = home;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home).context("Failed to create quickgpt home directory")?;
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn dark_theme(&self) -> bool {
        self.theme != "light"
    }

    pub fn toggle_theme(&mut self) {
        self.theme = if self.dark_theme() { "light" } else { "dark" }.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_creates_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".quickgpt");

        let mut config = Config::load_from(home.clone()).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.theme, "dark");

        config.server_url = "https://quickgpt.example".to_string();
        config.toggle_theme();
        config.save().unwrap();

        let reloaded = Config::load_from(home).unwrap();
        assert_eq!(reloaded.server_url, "https://quickgpt.example");
        assert_eq!(reloaded.theme, "light");
        assert!(!reloaded.dark_theme());
    }

    #[test]
    fn theme_toggle_flips_both_ways() {
        let mut config = Config::default();
        assert!(config.dark_theme());
        config.toggle_theme();
        assert!(!config.dark_theme());
        config.toggle_theme();
        assert!(config.dark_theme());
    }
}
