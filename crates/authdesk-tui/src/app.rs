//! Application state management for authdesk.
//!
//! This module contains the `App` struct that owns the login screen
//! controller, the UI state, and the coordination of background sign-in
//! tasks (Google device flow and backend credential exchange).

use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use authdesk_core::api::{ApiError, AuthClient};
use authdesk_core::auth::TokenPair;
use authdesk_core::config::{Config, StorageBackend};
use authdesk_core::login::{
    ClipboardWriter, ExchangeOutcome, ExchangeTicket, LoginScreen, TokenKind,
};
use authdesk_core::oauth::{DeviceAuthorization, DeviceFlow};
use authdesk_core::storage::{FileStorage, KeyringStorage, TokenStorage};
use authdesk_core::LoginError;

use crate::clipboard::TerminalClipboard;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// A sign-in produces at most three messages.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for a pasted ID token.
/// Google ID tokens are around 1-2 KB; 8 KB leaves plenty of headroom.
const MAX_CREDENTIAL_LENGTH: usize = 8192;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    PastingCredential,
    ShowingAlert,
    ConfirmingQuit,
    Quitting,
}

/// Which sign-in button is focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Google,
    Paste,
}

impl LoginFocus {
    pub fn toggle(&self) -> Self {
        match self {
            LoginFocus::Google => LoginFocus::Paste,
            LoginFocus::Paste => LoginFocus::Google,
        }
    }
}

/// Where a sign-in attempt currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInProgress {
    Idle,
    RequestingCode,
    AwaitingUser(DeviceAuthorization),
    Exchanging,
}

impl SignInProgress {
    pub fn is_busy(&self) -> bool {
        !matches!(self, SignInProgress::Idle)
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Messages sent from background tasks back to the event loop.
enum BackgroundResult {
    /// Device code issued, show the URL and code to the user
    DeviceAuthorization(DeviceAuthorization),
    /// Google returned an ID token
    Credential(String),
    /// Google sign-in failed
    CredentialError(String),
    /// Backend answered the credential exchange
    Exchange(ExchangeTicket, Result<TokenPair, ApiError>),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub screen: LoginScreen<Box<dyn TokenStorage>>,
    auth_client: AuthClient,
    device_flow: DeviceFlow,
    clipboard: Box<dyn ClipboardWriter>,

    // UI State
    pub state: AppState,
    pub login_focus: LoginFocus,
    pub progress: SignInProgress,
    pub paste_input: String,
    pub alert: Option<String>,
    pub status_message: Option<String>,

    // Background task channel
    task_rx: mpsc::Receiver<BackgroundResult>,
    task_tx: mpsc::Sender<BackgroundResult>,
    device_task: Option<JoinHandle<()>>,
}

/// Open the token storage selected in the configuration
pub fn open_storage(config: &Config) -> Result<Box<dyn TokenStorage>> {
    Ok(match config.storage {
        StorageBackend::File => Box::new(FileStorage::new(Config::cache_dir()?)),
        StorageBackend::Keyring => Box::new(KeyringStorage::new()),
    })
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Result<Self> {
        let storage = open_storage(&config)?;
        Self::with_parts(config, storage, Box::new(TerminalClipboard::detect()))
    }

    /// Create an application with explicit storage and clipboard
    pub fn with_parts(
        config: Config,
        storage: Box<dyn TokenStorage>,
        clipboard: Box<dyn ClipboardWriter>,
    ) -> Result<Self> {
        let auth_client =
            AuthClient::from_config(&config).context("Failed to create HTTP client")?;
        // The device flow shares the backend client's connection pool and timeout
        let device_flow = DeviceFlow::new(auth_client.http_client().clone(), &config);

        let mut screen = LoginScreen::new(storage).with_demo_mode(config.demo_mode);
        screen.initialize();
        debug!(authenticated = screen.is_authenticated(), "Login screen initialized");

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Ok(Self {
            config,
            screen,
            auth_client,
            device_flow,
            clipboard,

            state: AppState::Normal,
            login_focus: LoginFocus::Google,
            progress: SignInProgress::Idle,
            paste_input: String::new(),
            alert: None,
            status_message: None,

            task_rx: rx,
            task_tx: tx,
            device_task: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.screen.is_authenticated()
    }

    fn awaiting_google(&self) -> bool {
        matches!(
            self.progress,
            SignInProgress::RequestingCode | SignInProgress::AwaitingUser(_)
        )
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Start the Google device flow in the background
    pub fn start_google_sign_in(&mut self) {
        if self.is_authenticated() || self.progress.is_busy() {
            return;
        }

        self.progress = SignInProgress::RequestingCode;
        self.status_message = None;

        let flow = self.device_flow.clone();
        let tx = self.task_tx.clone();
        self.device_task = Some(tokio::spawn(async move {
            let authorization = match flow.start().await {
                Ok(a) => a,
                Err(e) => {
                    Self::send_result(&tx, BackgroundResult::CredentialError(e.to_string())).await;
                    return;
                }
            };
            Self::send_result(&tx, BackgroundResult::DeviceAuthorization(authorization.clone()))
                .await;

            let result = match flow.poll(&authorization).await {
                Ok(id_token) => BackgroundResult::Credential(id_token),
                Err(e) => BackgroundResult::CredentialError(e.to_string()),
            };
            Self::send_result(&tx, result).await;
        }));
    }

    /// Abandon a running device flow
    pub fn cancel_sign_in(&mut self) {
        if let Some(task) = self.device_task.take() {
            task.abort();
            info!("Google sign-in cancelled");
        }
        if self.awaiting_google() {
            self.progress = SignInProgress::Idle;
        }
    }

    /// Open the paste dialog
    pub fn start_paste(&mut self) {
        if self.is_authenticated() || self.progress.is_busy() {
            return;
        }
        self.paste_input.clear();
        self.state = AppState::PastingCredential;
    }

    pub fn cancel_paste(&mut self) {
        self.paste_input.clear();
        self.state = AppState::Normal;
    }

    /// Append pasted text to the credential field, dropping whitespace
    pub fn paste_text(&mut self, text: &str) {
        for c in text.chars() {
            if can_add_credential_char(self.paste_input.len(), c) {
                self.paste_input.push(c);
            }
        }
    }

    /// Exchange the credential typed or pasted into the dialog
    pub fn submit_pasted_credential(&mut self) {
        let credential = self.paste_input.trim().to_string();
        if credential.is_empty() {
            self.status_message = Some("Paste a Google ID token first".to_string());
            return;
        }
        self.paste_input.clear();
        self.state = AppState::Normal;
        self.handle_credential(credential);
    }

    /// Send a Google credential to the backend in the background
    pub fn handle_credential(&mut self, credential: String) {
        if self.is_authenticated() {
            debug!("Ignoring credential, already signed in");
            return;
        }

        let ticket = self.screen.begin_exchange();
        self.progress = SignInProgress::Exchanging;

        let client = self.auth_client.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = client.exchange_credential(&credential).await;
            Self::send_result(&tx, BackgroundResult::Exchange(ticket, result)).await;
        });
    }

    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if tx.send(result).await.is_err() {
            warn!("Event loop gone, dropping background result");
        }
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Drain and apply everything background tasks have reported
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_background_result(result);
        }
    }

    fn process_background_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::DeviceAuthorization(authorization) => {
                if matches!(self.progress, SignInProgress::RequestingCode) {
                    self.progress = SignInProgress::AwaitingUser(authorization);
                }
            }
            // Messages from a device flow the user already cancelled
            BackgroundResult::Credential(_) | BackgroundResult::CredentialError(_)
                if !self.awaiting_google() =>
            {
                debug!("Dropping result of cancelled Google sign-in");
            }
            BackgroundResult::Credential(id_token) => {
                self.device_task = None;
                self.progress = SignInProgress::Idle;
                self.handle_credential(id_token);
            }
            BackgroundResult::CredentialError(reason) => {
                self.device_task = None;
                self.progress = SignInProgress::Idle;
                let err = self.screen.handle_credential_error(reason);
                self.show_alert(&err);
            }
            BackgroundResult::Exchange(ticket, result) => {
                match self.screen.complete_exchange(ticket, result) {
                    Ok(ExchangeOutcome::SignedIn) => {
                        self.progress = SignInProgress::Idle;
                        self.status_message = Some("Signed in".to_string());
                    }
                    Ok(ExchangeOutcome::PlaceholderSession) => {
                        self.progress = SignInProgress::Idle;
                        self.status_message =
                            Some("Backend unreachable - using placeholder tokens".to_string());
                    }
                    Ok(ExchangeOutcome::Discarded) => {}
                    Err(e) => {
                        self.progress = SignInProgress::Idle;
                        self.show_alert(&e);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Signed-in actions
    // =========================================================================

    pub fn copy_token(&mut self, kind: TokenKind) {
        match self
            .screen
            .copy_token(kind, &mut self.clipboard, Instant::now())
        {
            Ok(true) => {
                self.status_message = Some(format!("{} copied", kind.label()));
            }
            Ok(false) => {}
            Err(e) => self.show_alert(&e),
        }
    }

    pub fn logout(&mut self) {
        self.cancel_sign_in();
        self.screen.logout();
        self.progress = SignInProgress::Idle;
        self.login_focus = LoginFocus::Google;
        self.status_message = Some("Signed out".to_string());
    }

    /// Periodic housekeeping, called once per event loop iteration
    pub fn tick(&mut self) {
        self.screen.tick(Instant::now());
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    pub fn show_alert(&mut self, err: &LoginError) {
        self.alert = Some(err.to_string());
        self.state = AppState::ShowingAlert;
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
        self.state = AppState::Normal;
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Check if a character can be added to the credential field.
/// ID tokens are base64url segments joined by dots, so whitespace and
/// control characters are never part of one.
pub fn can_add_credential_char(current_len: usize, c: char) -> bool {
    current_len < MAX_CREDENTIAL_LENGTH && !c.is_control() && !c.is_whitespace()
}
