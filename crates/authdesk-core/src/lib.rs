//! Core library for authdesk.
//!
//! Everything that does not depend on the terminal lives here:
//!
//! - `auth`: the client-side `Session` and `TokenPair`
//! - `storage`: durable key/value token storage (file, keychain, memory)
//! - `api`: the AuthBackend client that exchanges a Google credential for tokens
//! - `oauth`: Google device authorization flow used to obtain that credential
//! - `login`: the `LoginScreen` controller tying the pieces together
//! - `config`: user configuration and directories

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod login;
pub mod oauth;
pub mod storage;
pub mod utils;

pub use error::LoginError;
