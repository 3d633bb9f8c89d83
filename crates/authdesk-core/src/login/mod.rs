//! The login screen controller.
//!
//! `LoginScreen` owns the `Session`, the token storage and the copy
//! feedback flags, and implements every user action of the screen:
//! restoring a stored session, exchanging a Google credential, copying a
//! token, and signing out. It knows nothing about rendering; the terminal
//! front end drives it from its event loop.
//!
//! The credential exchange is split into `begin_exchange` and
//! `complete_exchange` so the network request can run in the background.
//! Each exchange carries an `ExchangeTicket` stamped with the session epoch;
//! `logout` bumps the epoch, so a response that arrives after sign-out is
//! dropped instead of signing the user back in.

pub mod feedback;

use std::time::Instant;

use anyhow::Result;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthClient};
use crate::auth::{Session, TokenPair};
use crate::error::LoginError;
use crate::storage::{TokenStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::utils::format_token;

pub use feedback::{CopyFeedback, TokenKind, COPY_FEEDBACK_DURATION};

/// Prefix of tokens invented in demo mode
pub const PLACEHOLDER_PREFIX: &str = "temp_";

/// Random base36 characters after the placeholder prefix
const PLACEHOLDER_RANDOM_CHARS: usize = 11;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Destination for copied tokens.
pub trait ClipboardWriter {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

impl<T: ClipboardWriter + ?Sized> ClipboardWriter for Box<T> {
    fn write_text(&mut self, text: &str) -> Result<()> {
        (**self).write_text(text)
    }
}

/// Identifies one credential exchange and the session epoch it started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTicket {
    epoch: u64,
}

/// How a completed exchange changed the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Backend issued tokens, user is signed in
    SignedIn,
    /// Backend unreachable in demo mode, placeholder tokens adopted
    PlaceholderSession,
    /// The user signed out while the request was in flight
    Discarded,
}

pub struct LoginScreen<S: TokenStorage> {
    storage: S,
    session: Session,
    feedback: CopyFeedback,
    epoch: u64,
    demo_mode: bool,
}

impl<S: TokenStorage> LoginScreen<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            session: Session::new(),
            feedback: CopyFeedback::default(),
            epoch: 0,
            demo_mode: false,
        }
    }

    /// Adopt placeholder tokens when the backend cannot be reached
    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Restore the session from storage. Missing or unreadable entries
    /// leave the user signed out.
    pub fn initialize(&mut self) {
        let access = self.read_key(ACCESS_TOKEN_KEY);
        let refresh = self.read_key(REFRESH_TOKEN_KEY);

        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => {
                self.session.update(TokenPair {
                    access_token,
                    refresh_token,
                });
                info!("Restored stored session");
            }
            _ => {
                self.session.clear();
                debug!("No stored session");
            }
        }
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, key, "Failed to read stored token");
                None
            }
        }
    }

    // =========================================================================
    // Credential exchange
    // =========================================================================

    /// Exchange a Google credential with the backend and apply the result.
    pub async fn handle_credential(
        &mut self,
        client: &AuthClient,
        credential: &str,
    ) -> Result<ExchangeOutcome, LoginError> {
        let ticket = self.begin_exchange();
        let result = client.exchange_credential(credential).await;
        self.complete_exchange(ticket, result)
    }

    /// Stamp a new exchange with the current session epoch
    pub fn begin_exchange(&self) -> ExchangeTicket {
        ExchangeTicket { epoch: self.epoch }
    }

    /// Apply the backend's answer to an exchange started with `begin_exchange`.
    pub fn complete_exchange(
        &mut self,
        ticket: ExchangeTicket,
        result: Result<TokenPair, ApiError>,
    ) -> Result<ExchangeOutcome, LoginError> {
        if ticket.epoch != self.epoch {
            info!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "Discarding exchange result from before sign-out"
            );
            return Ok(ExchangeOutcome::Discarded);
        }

        match result {
            Ok(tokens) => {
                self.adopt(tokens);
                info!("Signed in");
                Ok(ExchangeOutcome::SignedIn)
            }
            Err(e) if e.is_transport() && self.demo_mode => {
                warn!(error = %e, "Backend unreachable, adopting placeholder session (demo mode)");
                self.adopt(placeholder_tokens());
                Ok(ExchangeOutcome::PlaceholderSession)
            }
            Err(e) => {
                warn!(error = %e, "Credential exchange failed");
                Err(e.into())
            }
        }
    }

    /// The OAuth provider reported that it could not authenticate the user.
    pub fn handle_credential_error(&self, reason: impl Into<String>) -> LoginError {
        let reason = reason.into();
        warn!(reason = %reason, "Google sign-in failed");
        LoginError::ExternalAuthFailure(reason)
    }

    fn adopt(&mut self, tokens: TokenPair) {
        if let Err(e) = self.persist(&tokens) {
            warn!(error = %e, "Failed to persist tokens, session will not survive a restart");
            // Never leave half a pair behind
            self.forget_stored();
        }
        self.session.update(tokens);
    }

    fn persist(&mut self, tokens: &TokenPair) -> Result<()> {
        self.storage.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        Ok(())
    }

    fn forget_stored(&mut self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "Failed to remove stored token");
            }
        }
    }

    // =========================================================================
    // Token display and copy
    // =========================================================================

    pub fn token(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Access => self.session.access_token(),
            TokenKind::Refresh => self.session.refresh_token(),
        }
    }

    pub fn display_token(&self, kind: TokenKind) -> String {
        format_token(self.token(kind))
    }

    /// Copy a token to the clipboard.
    ///
    /// Returns `Ok(false)` without touching the clipboard when the token is
    /// absent.
    pub fn copy_token(
        &mut self,
        kind: TokenKind,
        clipboard: &mut impl ClipboardWriter,
        now: Instant,
    ) -> Result<bool, LoginError> {
        let Some(token) = self.token(kind) else {
            return Ok(false);
        };

        match clipboard.write_text(token) {
            Ok(()) => {
                self.feedback.mark(kind, now);
                debug!(token = kind.label(), "Token copied");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, token = kind.label(), "Clipboard write failed");
                Err(LoginError::ClipboardFailure(e.to_string()))
            }
        }
    }

    pub fn is_copied(&self, kind: TokenKind) -> bool {
        self.feedback.is_copied(kind)
    }

    /// Expire copy confirmations whose time is up
    pub fn tick(&mut self, now: Instant) {
        self.feedback.expire(now);
    }

    // =========================================================================
    // Sign-out
    // =========================================================================

    /// Forget the session and its stored tokens. Always succeeds.
    pub fn logout(&mut self) {
        self.forget_stored();
        self.session.clear();
        self.feedback.reset();
        self.epoch = self.epoch.wrapping_add(1);
        info!("Signed out");
    }
}

fn placeholder_token(rng: &mut impl Rng) -> String {
    let suffix: String = (0..PLACEHOLDER_RANDOM_CHARS)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", PLACEHOLDER_PREFIX, suffix)
}

/// Two distinct placeholder tokens
fn placeholder_tokens() -> TokenPair {
    let mut rng = rand::thread_rng();
    let access_token = placeholder_token(&mut rng);
    let mut refresh_token = placeholder_token(&mut rng);
    while refresh_token == access_token {
        refresh_token = placeholder_token(&mut rng);
    }
    TokenPair {
        access_token,
        refresh_token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::storage::MemoryStorage;
    use crate::utils::TOKEN_PLACEHOLDER;

    #[derive(Default)]
    struct RecordingClipboard {
        writes: Vec<String>,
        fail: bool,
    }

    impl ClipboardWriter for RecordingClipboard {
        fn write_text(&mut self, text: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("clipboard unavailable");
            }
            self.writes.push(text.to_string());
            Ok(())
        }
    }

    /// Memory storage that refuses to write one key
    struct FailingStorage {
        inner: MemoryStorage,
        failing_key: &'static str,
    }

    impl TokenStorage for FailingStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if key == self.failing_key {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn stored(access: &str, refresh: &str) -> MemoryStorage {
        MemoryStorage::with_entries([(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)])
    }

    fn signed_in_screen() -> LoginScreen<MemoryStorage> {
        let mut screen = LoginScreen::new(stored("access-token-0123456789", "refresh-token-9876543210"));
        screen.initialize();
        screen
    }

    fn client_for(uri: &str) -> AuthClient {
        AuthClient::new(uri, Duration::from_secs(2)).unwrap()
    }

    fn unreachable_uri() -> String {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        format!("http://127.0.0.1:{}", port)
    }

    // -------------------------------------------------------------------------
    // Initialize
    // -------------------------------------------------------------------------

    #[test]
    fn test_initialize_restores_stored_tokens() {
        let mut screen = LoginScreen::new(stored("A", "R"));
        screen.initialize();
        assert!(screen.is_authenticated());
        assert_eq!(screen.session().access_token(), Some("A"));
        assert_eq!(screen.session().refresh_token(), Some("R"));
    }

    #[test]
    fn test_initialize_requires_both_tokens() {
        let mut screen = LoginScreen::new(MemoryStorage::with_entries([(ACCESS_TOKEN_KEY, "A")]));
        screen.initialize();
        assert!(!screen.is_authenticated());

        let mut screen = LoginScreen::new(stored("A", ""));
        screen.initialize();
        assert!(!screen.is_authenticated());

        let mut screen = LoginScreen::new(MemoryStorage::new());
        screen.initialize();
        assert!(!screen.is_authenticated());
    }

    // -------------------------------------------------------------------------
    // Credential exchange
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_successful_exchange_signs_in_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "abc123xyz0",
                "refreshToken": "def456uvw0"
            })))
            .mount(&server)
            .await;

        let mut screen = LoginScreen::new(MemoryStorage::new());
        screen.initialize();
        let outcome = screen
            .handle_credential(&client_for(&server.uri()), "credential")
            .await
            .unwrap();

        assert_eq!(outcome, ExchangeOutcome::SignedIn);
        assert!(screen.is_authenticated());
        assert_eq!(screen.session().access_token(), Some("abc123xyz0"));
        assert_eq!(screen.session().refresh_token(), Some("def456uvw0"));
        assert_eq!(screen.storage().get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("abc123xyz0"));
        assert_eq!(screen.storage().get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("def456uvw0"));
    }

    #[tokio::test]
    async fn test_rejected_exchange_reports_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "invalid token"})),
            )
            .mount(&server)
            .await;

        let mut screen = LoginScreen::new(MemoryStorage::new());
        let err = screen
            .handle_credential(&client_for(&server.uri()), "credential")
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::BackendRejection(_)));
        assert!(err.to_string().contains("invalid token"));
        assert!(!screen.is_authenticated());
        assert!(screen.storage().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_success_payload_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "only"})))
            .mount(&server)
            .await;

        let mut screen = LoginScreen::new(MemoryStorage::new());
        let err = screen
            .handle_credential(&client_for(&server.uri()), "credential")
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::BackendRejection(_)));
        assert!(!screen.is_authenticated());
        assert!(screen.storage().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_closed() {
        let mut screen = LoginScreen::new(MemoryStorage::new());
        let err = screen
            .handle_credential(&client_for(&unreachable_uri()), "credential")
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::TransportFailure(_)));
        assert!(!screen.is_authenticated());
        assert!(screen.storage().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_in_demo_mode_adopts_placeholders() {
        let mut screen = LoginScreen::new(MemoryStorage::new()).with_demo_mode(true);
        let outcome = screen
            .handle_credential(&client_for(&unreachable_uri()), "credential")
            .await
            .unwrap();

        assert_eq!(outcome, ExchangeOutcome::PlaceholderSession);
        assert!(screen.is_authenticated());
        let access = screen.session().access_token().unwrap().to_string();
        let refresh = screen.session().refresh_token().unwrap().to_string();
        assert!(access.starts_with(PLACEHOLDER_PREFIX));
        assert!(refresh.starts_with(PLACEHOLDER_PREFIX));
        assert_ne!(access, refresh);
        assert_eq!(screen.storage().get(ACCESS_TOKEN_KEY).unwrap(), Some(access));
    }

    #[tokio::test]
    async fn test_demo_mode_does_not_mask_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "forbidden"})))
            .mount(&server)
            .await;

        let mut screen = LoginScreen::new(MemoryStorage::new()).with_demo_mode(true);
        let err = screen
            .handle_credential(&client_for(&server.uri()), "credential")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("forbidden"));
        assert!(!screen.is_authenticated());
    }

    #[test]
    fn test_result_after_logout_is_discarded() {
        let mut screen = LoginScreen::new(MemoryStorage::new());
        let ticket = screen.begin_exchange();

        screen.logout();

        let outcome = screen
            .complete_exchange(ticket, Ok(TokenPair::new("late-access", "late-refresh")))
            .unwrap();
        assert_eq!(outcome, ExchangeOutcome::Discarded);
        assert!(!screen.is_authenticated());
        assert!(screen.storage().is_empty());

        // A fresh exchange after logout still works
        let ticket = screen.begin_exchange();
        let outcome = screen
            .complete_exchange(ticket, Ok(TokenPair::new("access", "refresh")))
            .unwrap();
        assert_eq!(outcome, ExchangeOutcome::SignedIn);
    }

    #[test]
    fn test_partial_persist_leaves_no_orphan_token() {
        let mut screen = LoginScreen::new(FailingStorage {
            inner: MemoryStorage::new(),
            failing_key: REFRESH_TOKEN_KEY,
        });
        let ticket = screen.begin_exchange();
        let outcome = screen
            .complete_exchange(ticket, Ok(TokenPair::new("access", "refresh")))
            .unwrap();

        assert_eq!(outcome, ExchangeOutcome::SignedIn);
        assert!(screen.is_authenticated());
        assert_eq!(screen.storage().get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(screen.storage().get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_handle_credential_error_leaves_session() {
        let screen = LoginScreen::new(MemoryStorage::new());
        let err = screen.handle_credential_error("popup closed");
        assert_eq!(err, LoginError::ExternalAuthFailure("popup closed".to_string()));
        assert!(!screen.is_authenticated());
    }

    // -------------------------------------------------------------------------
    // Copy
    // -------------------------------------------------------------------------

    #[test]
    fn test_copy_absent_token_is_noop() {
        let mut screen = LoginScreen::new(MemoryStorage::new());
        let mut clipboard = RecordingClipboard::default();

        let copied = screen
            .copy_token(TokenKind::Access, &mut clipboard, Instant::now())
            .unwrap();
        assert!(!copied);
        assert!(clipboard.writes.is_empty());
        assert!(!screen.is_copied(TokenKind::Access));
    }

    #[test]
    fn test_copy_sets_feedback_until_tick_expires_it() {
        let mut screen = signed_in_screen();
        let mut clipboard = RecordingClipboard::default();
        let now = Instant::now();

        assert!(screen.copy_token(TokenKind::Refresh, &mut clipboard, now).unwrap());
        assert_eq!(clipboard.writes, vec!["refresh-token-9876543210".to_string()]);
        assert!(screen.is_copied(TokenKind::Refresh));
        assert!(!screen.is_copied(TokenKind::Access));

        screen.tick(now + Duration::from_secs(1));
        assert!(screen.is_copied(TokenKind::Refresh));
        screen.tick(now + COPY_FEEDBACK_DURATION);
        assert!(!screen.is_copied(TokenKind::Refresh));
    }

    #[test]
    fn test_copy_failure_reports_and_leaves_feedback() {
        let mut screen = signed_in_screen();
        let mut clipboard = RecordingClipboard {
            fail: true,
            ..Default::default()
        };

        let err = screen
            .copy_token(TokenKind::Access, &mut clipboard, Instant::now())
            .unwrap_err();
        assert!(matches!(err, LoginError::ClipboardFailure(_)));
        assert!(!screen.is_copied(TokenKind::Access));
    }

    // -------------------------------------------------------------------------
    // Logout and display
    // -------------------------------------------------------------------------

    #[test]
    fn test_logout_clears_storage_and_session() {
        let mut screen = signed_in_screen();
        let mut clipboard = RecordingClipboard::default();
        screen
            .copy_token(TokenKind::Access, &mut clipboard, Instant::now())
            .unwrap();

        screen.logout();
        assert!(!screen.is_authenticated());
        assert!(!screen.is_copied(TokenKind::Access));
        assert_eq!(screen.storage().get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(screen.storage().get(REFRESH_TOKEN_KEY).unwrap(), None);

        // Idempotent
        screen.logout();
        assert!(!screen.is_authenticated());
    }

    #[test]
    fn test_display_token() {
        let screen = signed_in_screen();
        assert_eq!(screen.display_token(TokenKind::Access), "access-tok...56789");

        let screen = LoginScreen::new(MemoryStorage::new());
        assert_eq!(screen.display_token(TokenKind::Refresh), TOKEN_PLACEHOLDER);
    }

    #[test]
    fn test_placeholder_token_shape() {
        let token = placeholder_token(&mut rand::thread_rng());
        assert!(token.starts_with(PLACEHOLDER_PREFIX));
        assert_eq!(token.len(), PLACEHOLDER_PREFIX.len() + PLACEHOLDER_RANDOM_CHARS);
        assert!(token[PLACEHOLDER_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
