//! Notifications raised towards the display shell.

use crate::traits::NotificationBus;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Notifications this crate triggers. Both carry an empty payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Raised right before a connection request is handed to the handler.
    Connecting,
    /// Raised when the user navigates back to the device settings.
    DeviceSettings,
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Connecting => "networkConnect.connecting",
            Notification::DeviceSettings => "mycroft.device.settings",
        }
    }

    pub fn payload(&self) -> Value {
        Value::Object(Map::new())
    }
}

/// Fans notifications out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(16)
    }
}

impl NotificationBus for BroadcastBus {
    fn emit(&self, notification: Notification) {
        // 没有订阅者时 send 会返回错误，这里忽略即可
        if self.tx.send(notification).is_err() {
            tracing::debug!(name = notification.name(), "No subscribers for notification");
        }
    }
}

/// A bus that only writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogBus;

impl NotificationBus for LogBus {
    fn emit(&self, notification: Notification) {
        tracing::info!(
            name = notification.name(),
            payload = %notification.payload(),
            "📣 Notification"
        );
    }
}
