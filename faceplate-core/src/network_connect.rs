//! The network password page: validation, submission and back navigation.
//! 网络密码页：校验输入、提交连接请求、返回设置页。

use crate::credentials::{self, SecurityScheme};
use crate::notifications::Notification;
use crate::traits::{ConnectionHandler, NotificationBus};
use serde::Deserialize;
use std::sync::Arc;

/// Display inputs the shell hands to the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub connection_name: String,
    pub device_path: String,
    pub specific_path: String,
    #[serde(default)]
    pub is_start_up: bool,
    pub security_type: SecurityScheme,
}

/// Result of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The secret passed validation and the connect request was dispatched.
    Accepted,
    /// The secret failed validation; nothing was emitted or dispatched.
    Rejected,
}

pub struct ConnectPage {
    request: ConnectRequest,
    bus: Arc<dyn NotificationBus>,
    handler: Arc<dyn ConnectionHandler>,
}

impl ConnectPage {
    pub fn new(
        request: ConnectRequest,
        bus: Arc<dyn NotificationBus>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        Self { request, bus, handler }
    }

    pub fn heading(&self) -> String {
        format!("Enter password for {}", self.request.connection_name)
    }

    /// Back navigation is hidden while the device is in its start-up flow.
    pub fn can_go_back(&self) -> bool {
        !self.request.is_start_up
    }

    pub fn security(&self) -> SecurityScheme {
        self.request.security_type
    }

    /// Validates `secret` and, when accepted, raises the connecting
    /// notification and hands the request to the handler in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, secret: &str) -> SubmitOutcome {
        if !credentials::validate(self.request.security_type, secret) {
            tracing::debug!(
                connection = %self.request.connection_name,
                "Rejected secret for connection"
            );
            return SubmitOutcome::Rejected;
        }

        self.bus.emit(Notification::Connecting);

        let handler = self.handler.clone();
        let device_path = self.request.device_path.clone();
        let specific_path = self.request.specific_path.clone();
        let secret = secret.to_string();
        let name = self.request.connection_name.clone();

        // Fire and forget: the outcome is owned by the handler.
        tokio::spawn(async move {
            tracing::info!(connection = %name, "🔌 Activating connection");
            if let Err(e) = handler
                .add_and_activate_connection(&device_path, &specific_path, &secret)
                .await
            {
                tracing::error!(connection = %name, "Connection request failed: {}", e);
            }
        });

        SubmitOutcome::Accepted
    }

    /// Returns to the device settings. A no-op during start-up.
    pub fn back(&self) -> bool {
        navigate_back(self.bus.as_ref(), self.request.is_start_up)
    }
}

/// Raises the device-settings notification unless the device is still in
/// its start-up flow. Returns whether navigation happened.
pub fn navigate_back(bus: &dyn NotificationBus, is_start_up: bool) -> bool {
    if is_start_up {
        return false;
    }
    bus.emit(Notification::DeviceSettings);
    true
}
