use std::collections::{hash_map, HashMap};

use anyhow::{Context, Result};
use keyring::Entry;

use super::TokenStorage;

const SERVICE_NAME: &str = "authdesk";

/// Token storage in the OS keychain, one entry per key.
///
/// Entries written or removed through this store are kept and reused, so
/// later reads go through the same credential handle.
pub struct KeyringStorage {
    service: String,
    entries: HashMap<String, Entry>,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: HashMap::new(),
        }
    }

    fn new_entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn cached_entry(&mut self, key: &str) -> Result<&Entry> {
        match self.entries.entry(key.to_string()) {
            hash_map::Entry::Occupied(slot) => Ok(&*slot.into_mut()),
            hash_map::Entry::Vacant(slot) => {
                let entry =
                    Entry::new(&self.service, key).context("Failed to create keyring entry")?;
                Ok(&*slot.insert(entry))
            }
        }
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let fresh;
        let entry = match self.entries.get(key) {
            Some(entry) => entry,
            None => {
                fresh = self.new_entry(key)?;
                &fresh
            }
        };

        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.cached_entry(key)?
            .set_password(value)
            .context("Failed to store token in keychain")
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match self.cached_entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
