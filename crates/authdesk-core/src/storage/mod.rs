//! Durable token storage.
//!
//! Tokens are persisted as plain key/value entries under the keys
//! `accessToken` and `refreshToken`. The `TokenStorage` trait lets the
//! front end pick a backend from configuration and lets tests substitute
//! an in-memory store:
//!
//! - `FileStorage`: JSON file in the cache directory
//! - `KeyringStorage`: OS keychain via keyring
//! - `MemoryStorage`: process-local map

pub mod file;
pub mod keychain;
pub mod memory;

use anyhow::Result;

pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Synchronous key/value persistence for session tokens.
pub trait TokenStorage: Send {
    /// Read a value. A missing entry is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing entry succeeds.
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
