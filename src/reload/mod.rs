//! Reload notification for the running gateway.
//!
//! After a snapshot is persisted the gateway is told to pick it up. The
//! call is best-effort: failures are logged by the caller and never undo a
//! completed persist.

use std::time::Duration;

use url::Url;

/// Error type for reload notification.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("reload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway answered reload with status {0}")]
    Status(reqwest::StatusCode),

    #[error("reload notification is disabled")]
    Disabled,
}

/// Best-effort "pick up the new configuration" signal.
pub trait ReloadNotifier: Send + Sync {
    fn notify_reload(&self) -> Result<(), ReloadError>;
}

/// Notifier that issues an HTTP GET against the gateway's reload endpoint.
pub struct HttpNotifier {
    client: reqwest::blocking::Client,
    url: Url,
}

impl HttpNotifier {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ReloadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }
}

impl ReloadNotifier for HttpNotifier {
    fn notify_reload(&self) -> Result<(), ReloadError> {
        let response = self.client.get(self.url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReloadError::Status(status));
        }
        tracing::debug!(url = %self.url, "Gateway reload requested");
        Ok(())
    }
}

/// Notifier that does nothing, for tests and `reload.enabled = false`.
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn notify_reload(&self) -> Result<(), ReloadError> {
        Ok(())
    }
}
