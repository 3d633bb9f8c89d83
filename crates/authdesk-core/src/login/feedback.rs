use std::time::{Duration, Instant};

/// How long a copy control shows its confirmation
pub const COPY_FEEDBACK_DURATION: Duration = Duration::from_secs(2);

/// Which of the two session tokens an action refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Access => "Access Token",
            TokenKind::Refresh => "Refresh Token",
        }
    }
}

/// Per-token "copied" flags that switch themselves off after a delay.
///
/// Each flag is held as the instant it expires; marking a flag again moves
/// the deadline, so repeated copies extend the confirmation instead of
/// stacking timers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyFeedback {
    access_until: Option<Instant>,
    refresh_until: Option<Instant>,
}

impl CopyFeedback {
    pub fn mark(&mut self, kind: TokenKind, now: Instant) {
        *self.slot_mut(kind) = Some(now + COPY_FEEDBACK_DURATION);
    }

    pub fn is_copied(&self, kind: TokenKind) -> bool {
        match kind {
            TokenKind::Access => self.access_until.is_some(),
            TokenKind::Refresh => self.refresh_until.is_some(),
        }
    }

    /// Clear every flag whose deadline has passed
    pub fn expire(&mut self, now: Instant) {
        for slot in [&mut self.access_until, &mut self.refresh_until] {
            if slot.is_some_and(|until| now >= until) {
                *slot = None;
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn slot_mut(&mut self, kind: TokenKind) -> &mut Option<Instant> {
        match kind {
            TokenKind::Access => &mut self.access_until,
            TokenKind::Refresh => &mut self.refresh_until,
        }
    }
}
