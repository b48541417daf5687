//! Notification feed shown in the side panel.

use crate::error::TransferError;
use std::collections::VecDeque;

const MAX_NOTIFICATIONS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn marker(&self) -> &'static str {
        match self {
            Level::Info => "[..]",
            Level::Success => "[OK]",
            Level::Warning => "[!!]",
            Level::Error => "[XX]",
        }
    }
}

#[derive(Clone)]
pub struct NotificationEntry {
    pub level: Level,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

impl NotificationEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: chrono::Local::now(),
        }
    }

    pub fn time_ago(&self) -> String {
        let duration = chrono::Local::now().signed_duration_since(self.timestamp);
        if duration.num_seconds() < 60 {
            "just now".to_string()
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h ago", duration.num_hours())
        } else {
            self.timestamp.format("%m/%d %H:%M").to_string()
        }
    }
}

/// Most recent entries last; older ones drop off past the cap.
#[derive(Default)]
pub struct Notifications {
    entries: VecDeque<NotificationEntry>,
}

impl Notifications {
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.entries.push_back(NotificationEntry::new(level, message));
        while self.entries.len() > MAX_NOTIFICATIONS {
            self.entries.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Level::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest first
    pub fn recent(&self) -> impl Iterator<Item = &NotificationEntry> {
        self.entries.iter().rev()
    }
}

/// User-facing text for a failed job, with a hint for the common cases.
pub fn describe_error(err: &anyhow::Error) -> String {
    let message = format!("{:#}", err);
    match err.downcast_ref::<TransferError>() {
        Some(TransferError::WalletNotReady) => {
            format!("{}\n\nCheck PRIVATE_KEY in .env and reconnect.", message)
        }
        Some(TransferError::AlreadyPending(_)) => {
            format!("{}\n\nWait for the current submission to finish.", message)
        }
        Some(TransferError::TransactionFailed { .. })
            if message.contains("balance is not sufficient") || message.contains("BANDWITH") =>
        {
            format!("{}\n\nThe account needs TRX for energy and bandwidth. Use the Nile faucet.", message)
        }
        _ => message,
    }
}
