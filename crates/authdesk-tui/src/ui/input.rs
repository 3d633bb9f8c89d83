//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use authdesk_core::login::TokenKind;

use crate::app::{can_add_credential_char, App, AppState, LoginFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Alerts block everything else until dismissed
    if matches!(app.state, AppState::ShowingAlert) {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dismiss_alert();
        }
        return Ok(false);
    }

    if matches!(app.state, AppState::PastingCredential) {
        return Ok(handle_paste_input(app, key));
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    if let KeyCode::Char('q') = key.code {
        app.state = AppState::ConfirmingQuit;
        return Ok(false);
    }

    if app.is_authenticated() {
        handle_signed_in_input(app, key);
    } else {
        handle_sign_in_input(app, key);
    }
    Ok(false)
}

fn handle_signed_in_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('a') => app.copy_token(TokenKind::Access),
        KeyCode::Char('r') => app.copy_token(TokenKind::Refresh),
        KeyCode::Char('l') => app.logout(),
        _ => {}
    }
}

fn handle_sign_in_input(app: &mut App, key: KeyEvent) {
    if app.progress.is_busy() {
        // Only a pending Google sign-in can be cancelled; an exchange runs to completion
        if key.code == KeyCode::Esc {
            app.cancel_sign_in();
        }
        return;
    }

    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.login_focus = app.login_focus.toggle();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Google => app.start_google_sign_in(),
            LoginFocus::Paste => app.start_paste(),
        },
        KeyCode::Char('g') => {
            app.login_focus = LoginFocus::Google;
            app.start_google_sign_in();
        }
        KeyCode::Char('p') => {
            app.login_focus = LoginFocus::Paste;
            app.start_paste();
        }
        _ => {}
    }
}

fn handle_paste_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => app.cancel_paste(),
        KeyCode::Enter => app.submit_pasted_credential(),
        KeyCode::Backspace => {
            app.paste_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_credential_char(app.paste_input.len(), c) {
                app.paste_input.push(c);
            }
        }
        _ => {}
    }
    false
}
