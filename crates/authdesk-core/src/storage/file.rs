use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TokenStorage;

/// Token file name in cache directory
const TOKENS_FILE: &str = "tokens.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Token storage backed by a JSON file in the cache directory.
///
/// Every call reads or rewrites the whole file, so the on-disk state is
/// always current even if the process is killed.
pub struct FileStorage {
    cache_dir: PathBuf,
}

impl FileStorage {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(TOKENS_FILE)
    }

    fn read(&self) -> Result<TokenFile> {
        let path = self.path();
        if !path.exists() {
            return Ok(TokenFile::default());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        serde_json::from_str(&contents).context("Failed to parse token file")
    }

    fn write(&self, mut file: TokenFile) -> Result<()> {
        let path = self.path();
        if file.entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove token file")?;
                debug!(?path, "Token file removed");
            }
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        file.updated_at = Some(Utc::now());
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&path, contents).context("Failed to write token file")?;
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking new tokens
        let mut file = self.read().unwrap_or_default();
        file.entries.insert(key.to_string(), value.to_string());
        self.write(file)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut file = self.read().unwrap_or_default();
        file.entries.remove(key);
        self.write(file)
    }
}
