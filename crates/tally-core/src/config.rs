//! Runtime configuration
//!
//! Built once at startup and passed by reference. Values come from two
//! layers, later layers winning:
//! 1. TOML secrets file with flat upper-case keys
//!    (`--secrets <path>`, else ~/.config/tally/secrets.toml if present)
//! 2. Environment variables of the same names
//!
//! Every channel is optional. A delivery channel with some but not all of
//! its required keys is kept as `Channel::Invalid` with the reason, so it
//! fails only when a delivery over it is requested.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub const EMAIL_SENDER_ENV: &str = "EMAIL_SENDER";
pub const EMAIL_PASSWORD_ENV: &str = "EMAIL_PASSWORD";
pub const EMAIL_RECEIVER_ENV: &str = "EMAIL_RECEIVER";
pub const SMTP_HOST_ENV: &str = "SMTP_HOST";
pub const SMTP_PORT_ENV: &str = "SMTP_PORT";
pub const TWILIO_SID_ENV: &str = "TWILIO_SID";
pub const TWILIO_AUTH_TOKEN_ENV: &str = "TWILIO_AUTH_TOKEN";
pub const TWILIO_WHATSAPP_FROM_ENV: &str = "TWILIO_WHATSAPP_FROM";
pub const TWILIO_API_BASE_ENV: &str = "TWILIO_API_BASE";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// Implicit TLS submission port
pub const DEFAULT_SMTP_PORT: u16 = 465;
/// Twilio WhatsApp sandbox sender
pub const DEFAULT_WHATSAPP_FROM: &str = "whatsapp:+14155238886";
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Raw key/value layer, as read from the secrets file and environment
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Secrets {
    #[serde(rename = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,
    #[serde(rename = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,
    #[serde(rename = "OPENAI_MODEL")]
    pub openai_model: Option<String>,
    #[serde(rename = "EMAIL_SENDER")]
    pub email_sender: Option<String>,
    #[serde(rename = "EMAIL_PASSWORD")]
    pub email_password: Option<String>,
    #[serde(rename = "EMAIL_RECEIVER")]
    pub email_receiver: Option<String>,
    #[serde(rename = "SMTP_HOST")]
    pub smtp_host: Option<String>,
    #[serde(rename = "SMTP_PORT")]
    pub smtp_port: Option<u16>,
    #[serde(rename = "TWILIO_SID")]
    pub twilio_sid: Option<String>,
    #[serde(rename = "TWILIO_AUTH_TOKEN")]
    pub twilio_auth_token: Option<String>,
    #[serde(rename = "TWILIO_WHATSAPP_FROM")]
    pub twilio_whatsapp_from: Option<String>,
    #[serde(rename = "TWILIO_API_BASE")]
    pub twilio_api_base: Option<String>,
    /// Unparseable `SMTP_PORT` from the environment
    #[serde(skip)]
    pub smtp_port_error: Option<String>,
}

impl Secrets {
    /// Parse a TOML secrets file
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid secrets file: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Overlay values from the process environment
    pub fn overlay_env(self) -> Self {
        self.overlay_with(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`; set values replace file values
    pub fn overlay_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let strings: [(&str, &mut Option<String>); 11] = [
            (OPENAI_API_KEY_ENV, &mut self.openai_api_key),
            (OPENAI_BASE_URL_ENV, &mut self.openai_base_url),
            (OPENAI_MODEL_ENV, &mut self.openai_model),
            (EMAIL_SENDER_ENV, &mut self.email_sender),
            (EMAIL_PASSWORD_ENV, &mut self.email_password),
            (EMAIL_RECEIVER_ENV, &mut self.email_receiver),
            (SMTP_HOST_ENV, &mut self.smtp_host),
            (TWILIO_SID_ENV, &mut self.twilio_sid),
            (TWILIO_AUTH_TOKEN_ENV, &mut self.twilio_auth_token),
            (TWILIO_WHATSAPP_FROM_ENV, &mut self.twilio_whatsapp_from),
            (TWILIO_API_BASE_ENV, &mut self.twilio_api_base),
        ];
        for (name, slot) in strings {
            if let Some(value) = get(name) {
                *slot = Some(value);
            }
        }

        if let Some(port) = get(SMTP_PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.smtp_port = Some(port),
                Err(_) => {
                    self.smtp_port_error = Some(format!(
                        "{} must be a port number, got '{}'",
                        SMTP_PORT_ENV, port
                    ))
                }
            }
        }

        self
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("email_sender", &self.email_sender)
            .field("email_password", &redact(&self.email_password))
            .field("email_receiver", &self.email_receiver)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("twilio_sid", &self.twilio_sid)
            .field("twilio_auth_token", &redact(&self.twilio_auth_token))
            .field("twilio_whatsapp_from", &self.twilio_whatsapp_from)
            .field("twilio_api_base", &self.twilio_api_base)
            .field("smtp_port_error", &self.smtp_port_error)
            .finish()
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***")
}

/// Text-generation endpoint settings
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// SMTP relay settings for the report email
#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub sender: String,
    pub password: String,
    pub receiver: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender", &self.sender)
            .field("password", &"***")
            .field("receiver", &self.receiver)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

/// Messaging relay settings for the summary message
#[derive(Clone, PartialEq, Eq)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Origin address including the `whatsapp:` prefix
    pub from: String,
    pub api_base: String,
}

impl fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("from", &self.from)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// State of an optional delivery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel<T> {
    /// None of the channel's keys are set
    Off,
    Ready(T),
    /// Keys are set but unusable; holds the reason
    Invalid(String),
}

impl<T> Channel<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(config) => Some(config),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::Off
    }
}

/// Validated configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub ai: Option<AiConfig>,
    pub email: Channel<EmailConfig>,
    pub whatsapp: Channel<WhatsAppConfig>,
    /// Secrets file that was read, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load from the secrets file (explicit path or default location) and
    /// the environment
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_secrets_path().filter(|p| p.exists()),
        };

        let secrets = match file {
            Some(ref p) => {
                debug!("Reading secrets from {}", p.display());
                Secrets::from_file(p)?
            }
            None => Secrets::default(),
        };

        let mut config = Self::from_secrets(secrets.overlay_env());
        config.source = file;
        Ok(config)
    }

    /// Validate a secrets layer into per-channel settings
    ///
    /// Never fails: a broken delivery channel is recorded as
    /// `Channel::Invalid` and reported when it is used.
    pub fn from_secrets(secrets: Secrets) -> Self {
        let ai = non_empty(secrets.openai_api_key).map(|api_key| AiConfig {
            api_key,
            base_url: non_empty(secrets.openai_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: non_empty(secrets.openai_model)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        let email = match (
            non_empty(secrets.email_sender),
            non_empty(secrets.email_password),
            non_empty(secrets.email_receiver),
        ) {
            (None, None, None) => Channel::Off,
            (Some(sender), Some(password), Some(receiver)) => match secrets.smtp_port_error {
                Some(reason) => Channel::Invalid(reason),
                None => Channel::Ready(EmailConfig {
                    sender,
                    password,
                    receiver,
                    smtp_host: non_empty(secrets.smtp_host)
                        .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                    smtp_port: secrets.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
                }),
            },
            (sender, password, receiver) => {
                let missing = missing_keys(&[
                    (EMAIL_SENDER_ENV, sender.is_some()),
                    (EMAIL_PASSWORD_ENV, password.is_some()),
                    (EMAIL_RECEIVER_ENV, receiver.is_some()),
                ]);
                Channel::Invalid(format!("Email is partially configured; missing {}", missing))
            }
        };
        if let Channel::Invalid(ref reason) = email {
            warn!("Email delivery unavailable: {}", reason);
        }

        let whatsapp = match (
            non_empty(secrets.twilio_sid),
            non_empty(secrets.twilio_auth_token),
        ) {
            (None, None) => Channel::Off,
            (Some(account_sid), Some(auth_token)) => Channel::Ready(WhatsAppConfig {
                account_sid,
                auth_token,
                from: non_empty(secrets.twilio_whatsapp_from)
                    .unwrap_or_else(|| DEFAULT_WHATSAPP_FROM.to_string()),
                api_base: non_empty(secrets.twilio_api_base)
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            }),
            (sid, token) => {
                let missing = missing_keys(&[
                    (TWILIO_SID_ENV, sid.is_some()),
                    (TWILIO_AUTH_TOKEN_ENV, token.is_some()),
                ]);
                Channel::Invalid(format!(
                    "WhatsApp is partially configured; missing {}",
                    missing
                ))
            }
        };
        if let Channel::Invalid(ref reason) = whatsapp {
            warn!("WhatsApp delivery unavailable: {}", reason);
        }

        Self {
            ai,
            email,
            whatsapp,
            source: None,
        }
    }
}

/// Default secrets file location
pub fn default_secrets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("secrets.toml"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing_keys(keys: &[(&str, bool)]) -> String {
    keys.iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
