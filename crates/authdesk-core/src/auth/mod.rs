//! Client-side authentication state.
//!
//! `Session` records whether the user is signed in and holds the
//! backend-issued `TokenPair` when they are.

pub mod session;

pub use session::{Session, TokenPair};
