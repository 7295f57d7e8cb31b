//! Hot-lead alert diffing for the real-time subscription.
//!
//! Snapshots arrive as immutable `BotRecord`s. Whether a snapshot raises,
//! clears, or leaves the alert alone is decided purely by comparing its
//! pending action against the alert currently held.

use serde::Serialize;

use crate::models::bot::{BotRecord, PendingAction};

/// OS notification title for a hot lead.
pub const HOT_LEAD_TITLE: &str = "🔥 عميل جاهز للشراء!";

/// What the client must do in response to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum AlertSignal {
    /// Start the looping ring, show the OS notification, display the alert.
    Raise {
        alert: PendingAction,
        title: &'static str,
    },
    /// Stop the ring and hide the alert.
    Clear,
}

/// Decides the transition from `held` given a fresh snapshot.
///
/// - hot lead with a new identity (or nothing held): raise
/// - hot lead with the held identity: nothing, repeated deliveries are no-ops
/// - no pending action: clear, if something is held
/// - any other pending action kind: nothing
pub fn next_signal(held: Option<&PendingAction>, snapshot: &BotRecord) -> Option<AlertSignal> {
    match &snapshot.pending_action {
        Some(action) if action.is_hot_lead() => {
            let is_new = held.map_or(true, |current| current.id != action.id);
            is_new.then(|| AlertSignal::Raise {
                alert: action.clone(),
                title: HOT_LEAD_TITLE,
            })
        }
        Some(_) => None,
        None => held.map(|_| AlertSignal::Clear),
    }
}

/// Holds the displayed alert between snapshots of one subscription.
#[derive(Debug, Default)]
pub struct AlertWatcher {
    held: Option<PendingAction>,
}

impl AlertWatcher {
    pub fn observe(&mut self, snapshot: &BotRecord) -> Option<AlertSignal> {
        let signal = next_signal(self.held.as_ref(), snapshot)?;
        self.held = match &signal {
            AlertSignal::Raise { alert, .. } => Some(alert.clone()),
            AlertSignal::Clear => None,
        };
        Some(signal)
    }

    /// Drops the held alert, yielding `Clear` if one was showing.
    pub fn dismiss(&mut self) -> Option<AlertSignal> {
        self.held.take().map(|_| AlertSignal::Clear)
    }
}
