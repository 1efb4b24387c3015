use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    DeliveryFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

pub fn verification_mail(to: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Verify Your Email - AgentDesk".to_string(),
        html: format!(
            "<h1>Welcome to AgentDesk!</h1>\
             <p>Please verify your email address by entering the following code:</p>\
             <h2>{}</h2>\
             <p>This code will expire in 24 hours.</p>\
             <p>If you did not request this, please ignore this email.</p>",
            code
        ),
    }
}

pub fn password_reset_mail(to: &str, reset_link: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Reset Your Password - AgentDesk".to_string(),
        html: format!(
            "<h1>Password Reset Request</h1>\
             <p>You requested a password reset. Click the link below to reset your password:</p>\
             <a href=\"{}\">Reset Password</a>\
             <p>This link will expire in 1 hour.</p>\
             <p>If you did not request this, please ignore this email.</p>",
            reset_link
        ),
    }
}

/// Logs outgoing mail instead of delivering it; there is no SMTP transport.
/// The configured relay is only reported. Bodies are never logged since they
/// carry codes and reset links.
pub struct TracingMailer {
    relay: String,
    from: String,
}

impl TracingMailer {
    pub fn new(smtp_host: &str, smtp_port: u16, from: &str) -> Self {
        Self {
            relay: format!("{}:{}", smtp_host, smtp_port),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        warn!(
            relay = %self.relay,
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            bytes = mail.html.len(),
            "Mail not delivered: no SMTP transport, logged only"
        );
        Ok(())
    }
}
