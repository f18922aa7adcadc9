//! Outgoing email. Handlers and the event processor only see the [`Mailer`] trait; the backend is
//! picked from configuration at startup.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::{EmailConfig, EmailProvider};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("mailer misconfigured: {0}")]
    Config(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Build the mailer selected by `EMAIL_PROVIDER`.
pub fn from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.provider {
        EmailProvider::Log => Ok(Arc::new(LogMailer)),
        EmailProvider::Resend => {
            let api_key = config
                .resend_api_key
                .clone()
                .ok_or_else(|| MailError::Config("RESEND_API_KEY is not set".to_string()))?;
            Ok(Arc::new(ResendMailer::new(
                config.resend_api_url.clone(),
                api_key,
                config.from.clone(),
            )))
        }
        EmailProvider::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}

/// Development backend: records the message in the log and drops it.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email not sent (log provider)");
        Ok(())
    }
}

/// Third-party HTTP sending API (Resend-compatible JSON body).
pub struct ResendMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let body = serde_json::json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %email.to, "Email accepted by provider");
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| MailError::Config("SMTP_HOST is not set".to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e| MailError::Address(format!("{}: {}", self.from, e)))?)
            .to(email.to.parse().map_err(|e| MailError::Address(format!("{}: {}", email.to, e)))?)
            .subject(email.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        self.transport.send(message).await?;
        tracing::debug!(to = %email.to, "Email relayed over SMTP");
        Ok(())
    }
}
