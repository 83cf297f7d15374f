//! WhatsApp delivery through the Twilio Messages REST API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::WhatsAppConfig;
use crate::error::{Error, Result};

use super::{Messenger, WHATSAPP_PREFIX};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Messenger backed by a Twilio account
#[derive(Clone)]
pub struct TwilioMessenger {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioMessenger {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: with_prefix(&config.from),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

fn with_prefix(address: &str) -> String {
    if address.starts_with(WHATSAPP_PREFIX) {
        address.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, address)
    }
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<String> {
        let to = with_prefix(to);
        let form = [
            ("From", self.from.as_str()),
            ("To", to.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Messaging(format!("Failed to reach messaging relay: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TwilioErrorResponse>(&text) {
                Ok(TwilioErrorResponse {
                    code: Some(code),
                    message: Some(message),
                }) => format!("{} (code {})", message, code),
                _ => text,
            };
            return Err(Error::Messaging(format!(
                "Relay returned {}: {}",
                status, detail
            )));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| Error::Messaging(format!("Failed to parse relay response: {}", e)))?;

        debug!(sid = %message.sid, "Relay queued message");
        Ok(message.sid)
    }
}

/// In-memory messenger for testing
///
/// Records (destination, body) pairs; clones share the record.
#[derive(Clone, Default)]
pub struct MockMessenger {
    fail: bool,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A messenger whose relay rejects every message
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<String> {
        if self.fail {
            return Err(Error::Messaging("mock relay rejected message".into()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| Error::Messaging("mock record poisoned".into()))?;
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("SMmock{}", sent.len()))
    }
}
