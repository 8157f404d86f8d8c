use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// File name the auth token is stored under. Absence of this file means
/// unauthenticated state and suppresses all data fetches.
const TOKEN_FILE: &str = "token";

/// Handles durable client-side state: the auth token and the log directory.
pub struct StorageManager {
    home: PathBuf,
    token_path: PathBuf,
}

impl StorageManager {
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self::at(home_dir.join(".quickgpt")))
    }

    /// Build a storage manager rooted at an explicit directory.
    pub fn at(home: PathBuf) -> Self {
        let token_path = home.join(TOKEN_FILE);
        StorageManager { home, token_path }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.home).context("Failed to create quickgpt directory")?;
        fs::create_dir_all(self.logs_dir()).context("Failed to create logs directory")?;
        Ok(())
    }

    /// Read the stored auth token, if any. An empty file counts as no token.
    pub fn load_token(&self) -> Result<Option<String>> {
        if !self.token_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.token_path).context("Failed to read token file")?;
        let token = raw.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        self.ensure_directories()?;
        fs::write(&self.token_path, token.trim()).context("Failed to write token file")?;
        Ok(())
    }

    pub fn clear_token(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path).context("Failed to remove token file")?;
        }
        Ok(())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.logs_dir().join("quickgpt.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::at(dir.path().join(".quickgpt"));

        assert!(storage.load_token().unwrap().is_none());

        storage.save_token("  opaque-token-123  ").unwrap();
        assert_eq!(storage.load_token().unwrap().as_deref(), Some("opaque-token-123"));

        storage.clear_token().unwrap();
        assert!(storage.load_token().unwrap().is_none());
        // clearing twice is fine
        storage.clear_token().unwrap();
    }

    #[test]
    fn blank_token_file_reads_as_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::at(dir.path().join(".quickgpt"));
        storage.save_token("   ").unwrap();
        assert!(storage.load_token().unwrap().is_none());
    }
}
