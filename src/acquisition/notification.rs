// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Notifications towards the live display
//!
//! Delivery is ordered and best-effort: when the consumer falls behind and the
//! bounded channel is full, new notifications are dropped. The display only
//! needs the latest state.

use chrono::{DateTime, Utc};
use log::trace;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Message delivered to the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notification {
    /// Latest reading for the live value and trend
    Value {
        timestamp: DateTime<Utc>,
        value: Option<i32>,
    },
    /// Run or connection state change
    Status { text: String },
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::Sender<Notification>,
}

/// Create a notification channel holding at most `capacity` pending messages.
pub fn notification_channel(capacity: usize) -> (Notifier, mpsc::Receiver<Notification>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Notifier { sender }, receiver)
}

impl Notifier {
    /// Queue a notification. Returns `false` when it was dropped.
    pub fn notify(&self, notification: Notification) -> bool {
        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                trace!("Notification channel full, dropping {:?}", dropped);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn value(&self, timestamp: DateTime<Utc>, value: Option<i32>) -> bool {
        self.notify(Notification::Value { timestamp, value })
    }

    pub fn status(&self, text: impl Into<String>) -> bool {
        self.notify(Notification::Status { text: text.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notifications_keep_order() {
        let (notifier, mut receiver) = notification_channel(8);
        let now = Utc::now();
        assert!(notifier.status("Connected"));
        assert!(notifier.value(now, Some(12)));

        assert_eq!(
            receiver.recv().await,
            Some(Notification::Status {
                text: "Connected".to_string()
            })
        );
        assert_eq!(
            receiver.recv().await,
            Some(Notification::Value {
                timestamp: now,
                value: Some(12)
            })
        );
    }

    #[tokio::test]
    async fn test_full_channel_drops() {
        let (notifier, mut receiver) = notification_channel(1);
        assert!(notifier.status("first"));
        assert!(!notifier.status("second"));
        assert_eq!(
            receiver.recv().await,
            Some(Notification::Status {
                text: "first".to_string()
            })
        );
        drop(receiver);
        assert!(!notifier.status("closed"));
    }
}
