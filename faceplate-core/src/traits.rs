use crate::notifications::Notification;
use crate::signal::ConnectivityReading;
use async_trait::async_trait;
use std::borrow::Cow;

// 在这里定义所有处理器、通知总线和前端共享的 trait。

/// 前端资源提供者接口。
#[async_trait]
pub trait UiAssetProvider: Send + Sync {
    /// Retrieves a single UI asset.
    ///
    /// # Arguments
    /// * `path` - The path to the asset (e.g., "index.html", "style.css").
    ///
    /// # Returns
    /// The asset's content and its MIME type, or an `Error` if not found.
    async fn get_asset(&self, path: &str) -> crate::Result<(Cow<'static, [u8]>, String)>;
}

/// The platform component that performs the actual network association.
///
/// Callers treat this as fire-and-forget: the result is only logged.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Adds a connection profile for the access point at `specific_path`
    /// on the device at `device_path`, using `secret`, and activates it.
    async fn add_and_activate_connection(
        &self,
        device_path: &str,
        specific_path: &str,
        secret: &str,
    ) -> crate::Result<()>;
}

/// 连接状态查询：只关心当前信号读数
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    async fn reading(&self) -> crate::Result<ConnectivityReading>;
}

/// Outbound notification sink for the display shell.
///
/// `emit` must not block; delivery is fire-and-forget.
pub trait NotificationBus: Send + Sync {
    fn emit(&self, notification: Notification);
}
