//! authdesk - a terminal sign-in screen.
//!
//! Signs in with Google, exchanges the credential with the backend for an
//! access/refresh token pair, keeps the pair in local storage and shows it
//! with copy shortcuts.

mod app;
mod clipboard;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authdesk_core::api::AuthClient;
use authdesk_core::config::Config;
use authdesk_core::login::{ExchangeOutcome, LoginScreen, TokenKind};

use app::{open_storage, App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "authdesk.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a file in the cache directory so they never draw over the UI.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

fn load_config() -> Config {
    let mut config = config_or_default(Config::load());
    config.apply_env();
    config
}

/// An unreadable config file is not fatal
fn config_or_default(loaded: Result<Config>) -> Config {
    loaded.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Logging first so problems with the config file are recorded
    let _log_guard = init_tracing(&Config::cache_dir()?)?;
    let config = load_config();
    info!(backend = %config.backend_url, storage = ?config.storage, "authdesk starting");

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--status") => return print_status(&config),
        Some("--logout") => return logout(&config),
        Some("--paste") => return paste_credential(&config).await,
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            eprintln!("Usage: authdesk [--status | --logout | --paste]");
            std::process::exit(2);
        }
        None => {}
    }

    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("authdesk shutting down");
    Ok(())
}

/// Print the stored session without starting the UI
fn print_status(config: &Config) -> Result<()> {
    let mut screen = LoginScreen::new(open_storage(config)?);
    screen.initialize();

    if screen.is_authenticated() {
        println!("Signed in");
        println!("  Access Token:  {}", screen.display_token(TokenKind::Access));
        println!("  Refresh Token: {}", screen.display_token(TokenKind::Refresh));
    } else {
        println!("Signed out");
    }
    Ok(())
}

/// Clear stored tokens without starting the UI
fn logout(config: &Config) -> Result<()> {
    let mut screen = LoginScreen::new(open_storage(config)?);
    screen.initialize();
    screen.logout();
    println!("Signed out");
    Ok(())
}

/// Exchange a Google ID token read from the terminal (hidden input)
async fn paste_credential(config: &Config) -> Result<()> {
    let mut screen = LoginScreen::new(open_storage(config)?).with_demo_mode(config.demo_mode);
    screen.initialize();
    if screen.is_authenticated() {
        println!("Already signed in. Run with --logout first to switch accounts.");
        return Ok(());
    }

    let credential = rpassword::prompt_password("Google ID token: ")?;
    let credential = credential.trim();
    if credential.is_empty() {
        anyhow::bail!("No ID token entered");
    }

    let client = AuthClient::from_config(config).context("Failed to create HTTP client")?;
    match screen.handle_credential(&client, credential).await {
        Ok(ExchangeOutcome::PlaceholderSession) => {
            println!("Backend unreachable - signed in with placeholder tokens (demo mode)");
        }
        Ok(_) => println!("Signed in"),
        Err(e) => anyhow::bail!(e),
    }
    println!("  Access Token:  {}", screen.display_token(TokenKind::Access));
    println!("  Refresh Token: {}", screen.display_token(TokenKind::Refresh));
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        return Ok(());
                    }

                    if handle_input(app, key)? {
                        return Ok(());
                    }
                }
                Event::Paste(text) if app.state == AppState::PastingCredential => {
                    app.paste_text(&text);
                }
                _ => {}
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();
        app.tick();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
