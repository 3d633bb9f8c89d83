use thiserror::Error;

/// User-facing failures of the login screen.
///
/// Every variant is shown to the user as a blocking alert; the `Display`
/// text is the alert message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The OAuth provider could not authenticate the user
    #[error("Google sign-in failed: {0}")]
    ExternalAuthFailure(String),

    /// The backend refused the credential or answered with an unusable payload
    #[error("Google sign-in failed: {0}")]
    BackendRejection(String),

    /// The backend could not be reached
    #[error("Unable to reach the sign-in server: {0}")]
    TransportFailure(String),

    #[error("Failed to copy token: {0}")]
    ClipboardFailure(String),
}
