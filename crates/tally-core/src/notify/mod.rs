//! Delivery of reconciliation results
//!
//! Two channels, each behind a trait so tests can swap in an in-memory
//! implementation:
//! - `Mailer`: the workbook as an email attachment to the configured receiver
//! - `Messenger`: a one-line summary to a WhatsApp number
//!
//! Neither channel retries. Failures go back to the caller and leave the
//! reconciled table untouched.

mod email;
mod whatsapp;

pub use email::{MockMailer, SmtpMailer};
pub use whatsapp::{MockMessenger, TwilioMessenger};

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use crate::config::{Channel, Config, EmailConfig};
use crate::error::{Error, Result};
use crate::export::{to_xlsx, EXPORT_FILENAME};
use crate::models::ReconciledTable;

pub const REPORT_SUBJECT: &str = "Ledger Reconciliation Report";
pub const REPORT_BODY: &str = "Please find attached the reconciliation output with AI analysis.";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Prefix the messaging relay uses for WhatsApp addresses
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// A file attached to an outgoing email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// An email to the mailer's configured receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub body: String,
    pub attachment: Attachment,
}

/// Sends email through a relay
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    /// Where the report goes (for display)
    fn receiver(&self) -> &str;
}

/// Sends WhatsApp messages through a relay
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `body` to `to` (E.164, no prefix); returns the relay's message id
    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<String>;
}

fn destination_pattern() -> &'static Option<Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+[0-9]{7,15}$").ok())
}

/// Check a WhatsApp destination and return it in E.164 form
///
/// Accepts `+` followed by 7 to 15 digits, with or without a leading
/// `whatsapp:` prefix. Spaces, dashes and parentheses are ignored.
pub fn validate_destination(destination: &str) -> Result<String> {
    let trimmed = destination.trim();
    let bare = trimmed.strip_prefix(WHATSAPP_PREFIX).unwrap_or(trimmed);
    let normalized: String = bare
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let pattern = destination_pattern()
        .as_ref()
        .ok_or_else(|| Error::InvalidData("Destination pattern failed to compile".into()))?;

    if pattern.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(Error::InvalidDestination(format!(
            "'{}' is not a phone number in +<country><number> form",
            destination.trim()
        )))
    }
}

/// Delivers a reconciled table over the configured channels
///
/// Channel problems surface only from the delivery that needs the channel.
#[derive(Default)]
pub struct Notifier {
    mailer: Option<Box<dyn Mailer>>,
    /// SMTP settings; the mailer is built on first use
    smtp: Option<EmailConfig>,
    email_unavailable: Option<String>,
    messenger: Option<Box<dyn Messenger>>,
    whatsapp_unavailable: Option<String>,
}

impl Notifier {
    /// No channels configured
    pub fn new() -> Self {
        Self::default()
    }

    /// Real relays for every channel in `config`
    pub fn from_config(config: &Config) -> Self {
        let mut notifier = Self::new();
        match config.email {
            Channel::Ready(ref email) => notifier.smtp = Some(email.clone()),
            Channel::Invalid(ref reason) => notifier.email_unavailable = Some(reason.clone()),
            Channel::Off => {}
        }
        match config.whatsapp {
            Channel::Ready(ref whatsapp) => {
                notifier = notifier.with_messenger(TwilioMessenger::new(whatsapp));
            }
            Channel::Invalid(ref reason) => notifier.whatsapp_unavailable = Some(reason.clone()),
            Channel::Off => {}
        }
        notifier
    }

    pub fn with_mailer(mut self, mailer: impl Mailer + 'static) -> Self {
        self.mailer = Some(Box::new(mailer));
        self
    }

    pub fn with_messenger(mut self, messenger: impl Messenger + 'static) -> Self {
        self.messenger = Some(Box::new(messenger));
        self
    }

    pub fn has_mailer(&self) -> bool {
        self.mailer.is_some() || self.smtp.is_some()
    }

    pub fn has_messenger(&self) -> bool {
        self.messenger.is_some()
    }

    /// Email the full table as `reconciliation_output.xlsx`
    pub async fn email_report(&self, table: &ReconciledTable) -> Result<()> {
        let smtp;
        let mailer: &dyn Mailer = match (&self.mailer, &self.smtp) {
            (Some(mailer), _) => mailer.as_ref(),
            (None, Some(config)) => {
                smtp = SmtpMailer::new(config)?;
                &smtp
            }
            (None, None) => return Err(unavailable("Email", &self.email_unavailable)),
        };

        let email = OutgoingEmail {
            subject: REPORT_SUBJECT.to_string(),
            body: REPORT_BODY.to_string(),
            attachment: Attachment {
                filename: EXPORT_FILENAME.to_string(),
                content_type: XLSX_CONTENT_TYPE.to_string(),
                bytes: to_xlsx(table)?,
            },
        };

        mailer.send(&email).await?;
        info!(rows = table.len(), "Emailed reconciliation report");
        Ok(())
    }

    /// Send the summary line to `destination`; returns the relay's message id
    ///
    /// The destination is validated before anything is sent.
    pub async fn send_summary(&self, table: &ReconciledTable, destination: &str) -> Result<String> {
        let to = validate_destination(destination)?;

        let messenger = self
            .messenger
            .as_ref()
            .ok_or_else(|| unavailable("WhatsApp", &self.whatsapp_unavailable))?;

        let body = table.summary().message();
        let sid = messenger.send_whatsapp(&to, &body).await?;
        info!(sid = %sid, "Sent reconciliation summary");
        Ok(sid)
    }
}

fn unavailable(channel: &str, reason: &Option<String>) -> Error {
    match reason {
        Some(reason) => Error::Config(reason.clone()),
        None => Error::Config(format!("{} is not configured", channel)),
    }
}
