//! Email rendering and delivery.
//!
//! Templates are Askama (HTML + plain text) under `templates/email/`.
//! Delivery goes through the [`Mailer`] trait: [`SmtpMailer`] uses lettre,
//! [`LogMailer`] only logs (used when SMTP is not configured) and
//! [`MemoryMailer`] records messages for tests.

use std::collections::HashSet;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// The transport refused the message.
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

// =============================================================================
// SMTP
// =============================================================================

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(&email.subject)
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

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Logs emails instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, email logged only"
        );
        Ok(())
    }
}

/// Records every email; can be told to reject chosen recipients.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future email to `address`.
    pub async fn fail_for(&self, address: &str) {
        self.failing.lock().await.insert(address.to_string());
    }

    /// Delivered emails, oldest first.
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|email| email.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        if self.failing.lock().await.contains(&email.to) {
            return Err(EmailError::Rejected(format!("mailbox {} unavailable", email.to)));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Restock notification for a waitlist subscriber.
#[derive(Template)]
#[template(path = "email/restock.html")]
pub struct RestockEmailHtml<'a> {
    pub en: bool,
    pub product_name: &'a str,
    pub variant_sku: Option<&'a str>,
    pub product_url: &'a str,
    pub unsubscribe_url: &'a str,
    pub expected_date: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/restock.txt")]
pub struct RestockEmailText<'a> {
    pub en: bool,
    pub product_name: &'a str,
    pub variant_sku: Option<&'a str>,
    pub product_url: &'a str,
    pub unsubscribe_url: &'a str,
    pub expected_date: Option<&'a str>,
}

/// Backorder delay notice.
#[derive(Template)]
#[template(path = "email/delay.html")]
pub struct DelayEmailHtml<'a> {
    pub en: bool,
    pub order_number: &'a str,
    pub product_name: &'a str,
    pub original_date: &'a str,
    pub new_date: Option<&'a str>,
    pub cancellation_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/delay.txt")]
pub struct DelayEmailText<'a> {
    pub en: bool,
    pub order_number: &'a str,
    pub product_name: &'a str,
    pub original_date: &'a str,
    pub new_date: Option<&'a str>,
    pub cancellation_url: &'a str,
}

/// A line of an order as shown in emails.
#[derive(Debug, Clone)]
pub struct EmailLine {
    pub description: String,
    pub quantity: i32,
    pub total: String,
}

/// Backorder moved to processing.
#[derive(Template)]
#[template(path = "email/fulfillment.html")]
pub struct FulfillmentEmailHtml<'a> {
    pub en: bool,
    pub order_number: &'a str,
    pub lines: &'a [EmailLine],
    pub total: &'a str,
}

#[derive(Template)]
#[template(path = "email/fulfillment.txt")]
pub struct FulfillmentEmailText<'a> {
    pub en: bool,
    pub order_number: &'a str,
    pub lines: &'a [EmailLine],
    pub total: &'a str,
}

/// Order shipped.
#[derive(Template)]
#[template(path = "email/shipping.html")]
pub struct ShippingEmailHtml<'a> {
    pub en: bool,
    pub order_number: &'a str,
    pub tracking_number: Option<&'a str>,
    pub lines: &'a [EmailLine],
}

#[derive(Template)]
#[template(path = "email/shipping.txt")]
pub struct ShippingEmailText<'a> {
    pub en: bool,
    pub order_number: &'a str,
    pub tracking_number: Option<&'a str>,
    pub lines: &'a [EmailLine],
}

/// Operational test message.
#[derive(Template)]
#[template(path = "email/test.html")]
pub struct TestEmailHtml<'a> {
    pub sent_at: &'a str,
}

#[derive(Template)]
#[template(path = "email/test.txt")]
pub struct TestEmailText<'a> {
    pub sent_at: &'a str,
}
