//! Console notification service for development. Logs messages to tracing
//! output instead of delivering them.

use async_trait::async_trait;
use helmspan_application::NotificationService;
use helmspan_core::AppResult;
use tracing::info;

/// Development notification service that logs to the console.
#[derive(Clone, Default)]
pub struct ConsoleNotificationService;

impl ConsoleNotificationService {
    /// Creates a new console notification service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationService for ConsoleNotificationService {
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> AppResult<()> {
        info!(
            recipients = recipients.join(", "),
            subject = subject,
            "--- NOTIFICATION (console) ---\n{body}\n--- END NOTIFICATION ---"
        );

        Ok(())
    }
}
