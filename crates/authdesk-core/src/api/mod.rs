//! AuthBackend client module.
//!
//! This module provides the `AuthClient` that exchanges a Google ID token
//! for the backend's access/refresh token pair via `POST /auth/google`.

pub mod client;
pub mod error;

pub use client::AuthClient;
pub use error::ApiError;
