use crate::signal::ConnectivityReading;
use crate::traits::{ConnectionHandler, ConnectivitySource};
use crate::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

/// A connect request as seen by [`MockHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRequest {
    pub device_path: String,
    pub specific_path: String,
    pub secret: String,
}

/// A mock handler for testing purposes.
/// It records connect requests and simulates activation without touching any network stack.
#[derive(Debug)]
pub struct MockHandler {
    delay: Duration,
    failing_device: Option<String>,
    requests: Mutex<Vec<HandlerRequest>>,
    reading: Mutex<ConnectivityReading>,
}

impl Default for MockHandler {
    fn default() -> Self {
        Self::with_delay(Duration::from_secs(3))
    }
}

impl MockHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            failing_device: None,
            requests: Mutex::new(Vec::new()),
            reading: Mutex::new(ConnectivityReading::Connected { level: 3 }),
        }
    }

    /// Simulate a failure for requests on `device_path`.
    pub fn failing_on(mut self, device_path: impl Into<String>) -> Self {
        self.failing_device = Some(device_path.into());
        self
    }

    pub fn set_reading(&self, reading: ConnectivityReading) {
        if let Ok(mut r) = self.reading.lock() {
            *r = reading;
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HandlerRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ConnectionHandler for MockHandler {
    async fn add_and_activate_connection(
        &self,
        device_path: &str,
        specific_path: &str,
        secret: &str,
    ) -> Result<()> {
        tracing::info!(
            "🤖 [MockHandler] Activating {} on {} with secret: '{}'",
            specific_path,
            device_path,
            if secret.is_empty() { "(empty)" } else { "********" }
        );
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(HandlerRequest {
                device_path: device_path.to_string(),
                specific_path: specific_path.to_string(),
                secret: secret.to_string(),
            });
        }

        // Simulate a connection delay
        sleep(self.delay).await;

        if self.failing_device.as_deref() == Some(device_path) {
            tracing::warn!("🤖 [MockHandler] Activation failed on '{}'", device_path);
            return Err(crate::Error::ActivationFailed(format!(
                "simulated failure on {}",
                device_path
            )));
        }
        tracing::info!("🤖 [MockHandler] Activation successful on '{}'", device_path);
        Ok(())
    }
}

#[async_trait]
impl ConnectivitySource for MockHandler {
    async fn reading(&self) -> Result<ConnectivityReading> {
        self.reading
            .lock()
            .map(|r| *r)
            .map_err(|_| crate::Error::CommandFailed("mock reading poisoned".to_string()))
    }
}
