use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use authdesk_core::config::StorageBackend;
use authdesk_core::login::TokenKind;

use crate::app::{App, AppState, LoginFocus, SignInProgress};

use super::styles;

/// Width of the sign-in / token card
const CARD_WIDTH: u16 = 60;

/// Characters of a pasted credential shown in the paste dialog
const PASTE_PREVIEW_CHARS: usize = 44;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, chunks[0]);
    if app.is_authenticated() {
        render_tokens(frame, app, chunks[1]);
    } else {
        render_sign_in(frame, app, chunks[1]);
    }
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match app.state {
        AppState::PastingCredential => render_paste_overlay(frame, app),
        AppState::ShowingAlert => render_alert_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, area: Rect) {
    let title = "  authdesk";
    let help_hint = "[q] Quit";

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + help_hint.len() as u16 + 4)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn button_line(label: &str, focused: bool) -> Line<'static> {
    let (text, style) = if focused {
        (format!(" ▶ {:<22}◀ ", label), styles::button_style(true))
    } else {
        (format!("   {:<22}  ", label), styles::button_style(false))
    };
    Line::from(vec![
        Span::raw("      ["),
        Span::styled(text, style),
        Span::raw("]"),
    ])
}

fn render_sign_in(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(" Sign in", styles::title_style())),
        Line::from(""),
    ];

    let idle = !app.progress.is_busy();
    lines.push(button_line(
        "Sign in with Google",
        idle && app.login_focus == LoginFocus::Google,
    ));
    lines.push(button_line(
        "Paste ID token",
        idle && app.login_focus == LoginFocus::Paste,
    ));
    lines.push(Line::from(""));

    match &app.progress {
        SignInProgress::Idle => {
            lines.push(Line::from(vec![
                Span::styled(" [g]", styles::help_key_style()),
                Span::styled(" Google  ", styles::muted_style()),
                Span::styled("[p]", styles::help_key_style()),
                Span::styled(" paste  ", styles::muted_style()),
                Span::styled("[Tab]", styles::help_key_style()),
                Span::styled(" switch  ", styles::muted_style()),
                Span::styled("[Enter]", styles::help_key_style()),
                Span::styled(" select", styles::muted_style()),
            ]));
        }
        SignInProgress::RequestingCode => {
            lines.push(Line::from(Span::styled(
                " Contacting Google...",
                styles::highlight_style(),
            )));
        }
        SignInProgress::AwaitingUser(authorization) => {
            lines.push(Line::from(vec![
                Span::styled(" Visit  ", styles::muted_style()),
                Span::styled(authorization.verification_url.clone(), styles::highlight_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" Enter  ", styles::muted_style()),
                Span::styled(authorization.user_code.clone(), styles::user_code_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" [Esc]", styles::help_key_style()),
                Span::styled(" cancel", styles::muted_style()),
            ]));
        }
        SignInProgress::Exchanging => {
            lines.push(Line::from(Span::styled(
                " Signing in...",
                styles::highlight_style(),
            )));
        }
    }

    let height = lines.len() as u16 + 2;
    let card = centered_rect_fixed(CARD_WIDTH, height, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), card);
}

fn token_line(app: &App, kind: TokenKind, key: char) -> Line<'static> {
    let copy_indicator = if app.screen.is_copied(kind) {
        Span::styled("✓ copied", styles::copied_style())
    } else {
        Span::styled("copy", styles::muted_style())
    };

    Line::from(vec![
        Span::styled(format!(" {:<15}", format!("{}:", kind.label())), styles::muted_style()),
        Span::styled(format!("{:<20}", app.screen.display_token(kind)), styles::token_style()),
        Span::styled(format!("[{}] ", key), styles::help_key_style()),
        copy_indicator,
    ])
}

fn render_tokens(frame: &mut Frame, app: &App, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(" Signed in!", styles::success_style())),
        Line::from(""),
        token_line(app, TokenKind::Access, 'a'),
        token_line(app, TokenKind::Refresh, 'r'),
        Line::from(""),
        Line::from(vec![
            Span::styled(" [l]", styles::help_key_style()),
            Span::styled(" Sign out", styles::muted_style()),
        ]),
    ];

    let height = lines.len() as u16 + 2;
    let card = centered_rect_fixed(CARD_WIDTH, height, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), card);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None if app.is_authenticated() => " Signed in ".to_string(),
        None => " Signed out ".to_string(),
    };

    let storage = match app.config.storage {
        StorageBackend::File => "file",
        StorageBackend::Keyring => "keychain",
    };
    let right_text = if app.screen.demo_mode() {
        format!(" demo mode | storage: {} ", storage)
    } else {
        format!(" storage: {} ", storage)
    };

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

/// Keep the end of a long credential visible while typing
fn paste_preview(input: &str) -> String {
    let len = input.chars().count();
    if len <= PASTE_PREVIEW_CHARS {
        input.to_string()
    } else {
        let tail: String = input.chars().skip(len - (PASTE_PREVIEW_CHARS - 1)).collect();
        format!("…{}", tail)
    }
}

fn render_paste_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(CARD_WIDTH, 8, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(" Paste your Google ID token", styles::title_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" [", styles::muted_style()),
            Span::styled(
                format!("{:<width$}▌", paste_preview(&app.paste_input), width = PASTE_PREVIEW_CHARS),
                styles::input_field_style(),
            ),
            Span::styled("]", styles::muted_style()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(" [Enter]", styles::help_key_style()),
            Span::styled(" sign in  ", styles::muted_style()),
            Span::styled("[Esc]", styles::help_key_style()),
            Span::styled(" cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_alert_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(CARD_WIDTH, 9, frame.area());
    frame.render_widget(Clear, area);

    let message = app.alert.clone().unwrap_or_default();
    let lines = vec![
        Line::from(Span::styled(format!(" {}", message), styles::error_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Press ", styles::muted_style()),
            Span::styled("[Enter]", styles::help_key_style()),
            Span::styled(" to continue", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(Span::styled(" Error ", styles::error_style()))
        .borders(Borders::ALL)
        .border_style(styles::error_style())
        .style(Style::default());

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 6, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
