//! Outbound report delivery over SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

const SEND_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 200;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email delivery is not configured (SMTP_PASSWORD unset)")]
    NotConfigured,

    #[error("invalid email address '{0}'")]
    Address(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// Delivers a rendered report. Failures are returned, never panicked.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str)
        -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    /// `None` when no relay password is configured.
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = format!("CropWatch <{}>", config.sender)
            .parse()
            .map_err(|_| NotifyError::Address(config.sender.clone()))?;

        let transport = match &config.password {
            Some(password) => Some(
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| NotifyError::Transport(e.to_string()))?
                    .port(config.port)
                    .credentials(Credentials::new(config.username.clone(), password.clone()))
                    .build(),
            ),
            None => {
                tracing::warn!("SMTP_PASSWORD not set, daily reports will not be delivered");
                None
            }
        };

        Ok(Self { transport, from })
    }

    fn build_message(&self, recipient: &str, subject: &str, html_body: &str) -> Result<Message, NotifyError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| NotifyError::Address(recipient.to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for SmtpNotifier {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), NotifyError> {
        let transport = self.transport.as_ref().ok_or(NotifyError::NotConfigured)?;
        let message = self.build_message(recipient, subject, html_body)?;

        let mut last_err = None;
        for attempt in 0..SEND_ATTEMPTS {
            match transport.send(message.clone()).await {
                Ok(_) => {
                    tracing::info!("Report sent to {}", recipient);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        error = %e,
                        "Email send failed"
                    );
                    last_err = Some(e);
                    if attempt + 1 < SEND_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            RETRY_BASE_MS * 2u64.pow(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        Err(NotifyError::Transport(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}
