//! Clipboard access for the TUI.
//!
//! Tries two transports in order:
//! 1. System clipboard via `arboard`
//! 2. OSC 52 - terminal clipboard escape sequence (works over SSH), only
//!    when stdout is a terminal that can receive it
//!
//! A copy is reported as failed when no transport could deliver the text.

use std::io::{IsTerminal, Write};

use authdesk_core::login::ClipboardWriter;
use base64::Engine;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("OSC 52 clipboard failed: {0}")]
    Osc52(String),

    #[error("System clipboard failed: {0}")]
    System(String),

    #[error("No clipboard available")]
    Unavailable,
}

/// One way of getting text onto the user's clipboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    System,
    Osc52,
}

/// System clipboard with a terminal escape sequence fallback.
pub struct TerminalClipboard {
    transports: Vec<Transport>,
    /// Kept alive so clipboard ownership is not dropped right after a copy
    system: Option<arboard::Clipboard>,
}

impl TerminalClipboard {
    /// Use every transport the current process can reach
    pub fn detect() -> Self {
        let mut transports = vec![Transport::System];
        if std::io::stdout().is_terminal() {
            transports.push(Transport::Osc52);
        }
        Self::with_transports(transports)
    }

    pub fn with_transports(transports: Vec<Transport>) -> Self {
        Self {
            transports,
            system: None,
        }
    }

    pub fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut last_error = ClipboardError::Unavailable;
        for transport in self.transports.clone() {
            let result = match transport {
                Transport::System => self.copy_system(text),
                Transport::Osc52 => Self::copy_osc52(text),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(?transport, error = %e, "Clipboard transport failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn copy_system(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.system.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| ClipboardError::System(e.to_string()))?;
            self.system = Some(clipboard);
        }
        match self.system.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text)
                .map_err(|e| ClipboardError::System(e.to_string())),
            None => Err(ClipboardError::Unavailable),
        }
    }

    /// Write the OSC 52 sequence to stdout; the terminal intercepts it.
    fn copy_osc52(text: &str) -> Result<(), ClipboardError> {
        let mut stdout = std::io::stdout();
        if !stdout.is_terminal() {
            return Err(ClipboardError::Osc52("stdout is not a terminal".to_string()));
        }
        stdout
            .write_all(osc52_sequence(text).as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| ClipboardError::Osc52(e.to_string()))
    }
}

impl Default for TerminalClipboard {
    fn default() -> Self {
        Self::detect()
    }
}

impl ClipboardWriter for TerminalClipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.copy(text)?;
        Ok(())
    }
}

/// ESC ] 52 ; c ; <base64> ESC \  ('c' = system clipboard selection)
fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    format!("\x1b]52;c;{}\x1b\\", encoded)
}
