//! SMTP notification delivery using the `lettre` crate.

use async_trait::async_trait;
use helmspan_application::NotificationService;
use helmspan_core::{AppError, AppResult};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP notification configuration.
#[derive(Clone)]
pub struct SmtpNotificationConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// Sender email address.
    pub from_address: String,
}

/// Production notification service delivering over SMTP.
#[derive(Clone)]
pub struct SmtpNotificationService {
    config: SmtpNotificationConfig,
}

impl SmtpNotificationService {
    /// Creates a new SMTP notification service.
    #[must_use]
    pub fn new(config: SmtpNotificationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NotificationService for SmtpNotificationService {
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> AppResult<()> {
        let from: lettre::message::Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|error| AppError::Internal(format!("invalid from address: {error}")))?;

        let credentials =
            Credentials::new(self.config.username.clone(), self.config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
            .map_err(|error| {
                AppError::Internal(format!("failed to create SMTP transport: {error}"))
            })?
            .port(self.config.port)
            .credentials(credentials)
            .build();

        for recipient in recipients {
            let to_mailbox = recipient.parse().map_err(|error| {
                AppError::Internal(format!("invalid recipient address: {error}"))
            })?;

            let message = Message::builder()
                .from(from.clone())
                .to(to_mailbox)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_owned())
                .map_err(|error| {
                    AppError::Internal(format!("failed to build notification: {error}"))
                })?;

            mailer.send(message).await.map_err(|error| {
                AppError::Internal(format!("failed to send notification: {error}"))
            })?;
        }

        Ok(())
    }
}
