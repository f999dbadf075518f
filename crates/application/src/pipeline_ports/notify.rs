use async_trait::async_trait;
use helmspan_core::AppResult;

/// Port over best-effort admin notification delivery.
///
/// Callers swallow and log failures; a broken notifier must never fail a
/// pipeline or a billing tick.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends one message to every recipient address.
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> AppResult<()>;
}
