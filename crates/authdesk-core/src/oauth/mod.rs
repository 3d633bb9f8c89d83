//! Obtaining a Google credential.
//!
//! A terminal cannot host Google's sign-in button, so the credential is
//! obtained through the OAuth 2.0 device authorization grant: the user opens
//! a verification URL on any device, enters a short code, and the ID token
//! is collected by polling.

pub mod device_flow;

pub use device_flow::{DeviceAuthorization, DeviceFlow, DeviceFlowError};
