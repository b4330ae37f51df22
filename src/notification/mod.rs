//! Notification module
//!
//! Outgoing email. `SmtpEmailSender` delivers through an SMTP relay,
//! `LogEmailSender` only writes the message to the log.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Email delivery errors
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Email delivery abstraction
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError>;
}

/// Sends email through an authenticated SMTP relay
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_name: String,
}

impl std::fmt::Debug for SmtpEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpEmailSender")
            .field("from_name", &self.from_name)
            .finish_non_exhaustive()
    }
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig, from_name: &str) -> Result<Self, EmailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| EmailError::Transport(format!("Failed to create SMTP transport: {}", e)))?
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_name: from_name.to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.from_name, from)
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("Invalid from email: {}", e)))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("Invalid recipient email: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

/// Logs emails instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        tracing::info!(
            from = %from,
            to = %to,
            subject = %subject,
            body_len = html_body.len(),
            "Email delivery disabled, message logged only"
        );
        Ok(())
    }
}
