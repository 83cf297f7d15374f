//! SMTP relay mailer

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use crate::config::EmailConfig;
use crate::error::{Error, Result};

use super::{Mailer, OutgoingEmail};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Port that speaks TLS from the first byte; other ports upgrade via STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

/// Mailer that authenticates to an SMTP relay as the sender
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    receiver: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|e| Error::Config(format!("Invalid EMAIL_SENDER address: {}", e)))?;
        let to: Mailbox = config
            .receiver
            .parse()
            .map_err(|e| Error::Config(format!("Invalid EMAIL_RECEIVER address: {}", e)))?;

        let creds = Credentials::new(config.sender.clone(), config.password.clone());

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| Error::Config(format!("Failed to create SMTP relay: {}", e)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            receiver: config.receiver.clone(),
        })
    }
}

/// Plain-text body plus one attachment
fn build_message(from: &Mailbox, to: &Mailbox, email: &OutgoingEmail) -> Result<Message> {
    let content_type = ContentType::parse(&email.attachment.content_type)
        .map_err(|e| Error::Mail(format!("Invalid attachment content type: {}", e)))?;

    let attachment = MailAttachment::new(email.attachment.filename.clone())
        .body(email.attachment.bytes.clone(), content_type);

    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(email.subject.clone())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(email.body.clone()))
                .singlepart(attachment),
        )
        .map_err(|e| Error::Mail(format!("Failed to build message: {}", e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(&self.from, &self.to, email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| Error::Mail(format!("Failed to send email: {}", e)))?;

        debug!(
            to = %self.receiver,
            code = %response.code(),
            "SMTP relay accepted message"
        );
        Ok(())
    }

    fn receiver(&self) -> &str {
        &self.receiver
    }
}

/// In-memory mailer for testing
///
/// Clones share the same outbox.
#[derive(Clone)]
pub struct MockMailer {
    receiver: String,
    fail: bool,
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl MockMailer {
    pub fn new(receiver: &str) -> Self {
        Self {
            receiver: receiver.to_string(),
            fail: false,
            outbox: Arc::default(),
        }
    }

    /// A mailer whose relay rejects every message
    pub fn failing(receiver: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(receiver)
        }
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.fail {
            return Err(Error::Mail("mock relay rejected message".into()));
        }
        self.outbox
            .lock()
            .map_err(|_| Error::Mail("mock outbox poisoned".into()))?
            .push(email.clone());
        Ok(())
    }

    fn receiver(&self) -> &str {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Attachment, XLSX_CONTENT_TYPE};

    fn config(port: u16) -> EmailConfig {
        EmailConfig {
            sender: "books@example.com".into(),
            password: "app-password".into(),
            receiver: "cfo@example.com".into(),
            smtp_host: "smtp.example.com".into(),
            smtp_port: port,
        }
    }

    fn sender() -> Mailbox {
        "books@example.com".parse().unwrap()
    }

    fn receiver() -> Mailbox {
        "cfo@example.com".parse().unwrap()
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            subject: "Ledger Reconciliation Report".into(),
            body: "Please find attached.".into(),
            attachment: Attachment {
                filename: "reconciliation_output.xlsx".into(),
                content_type: XLSX_CONTENT_TYPE.into(),
                bytes: b"PK\x03\x04".to_vec(),
            },
        }
    }

    #[test]
    fn test_invalid_sender_is_config_error() {
        let mut cfg = config(465);
        cfg.sender = "not an address".into();
        assert!(matches!(SmtpMailer::new(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_message_carries_attachment() {
        let message = build_message(&sender(), &receiver(), &email()).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("Subject: Ledger Reconciliation Report"));
        assert!(raw.contains("To: cfo@example.com"));
        assert!(raw.contains("reconciliation_output.xlsx"));
        assert!(raw.contains(XLSX_CONTENT_TYPE));
        assert!(raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_bad_content_type_is_mail_error() {
        let mut bad = email();
        bad.attachment.content_type = "not a type".into();
        let result = build_message(&sender(), &receiver(), &bad);
        assert!(matches!(result, Err(Error::Mail(_))));
    }

    #[tokio::test]
    async fn test_mock_mailer_records() {
        let mailer = MockMailer::new("cfo@example.com");
        mailer.send(&email()).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.receiver(), "cfo@example.com");
    }
}
