//! OpenAI-compatible backend implementation
//!
//! Works with the hosted OpenAI API and any server that implements the
//! `/v1/chat/completions` endpoint (vLLM, LocalAI, llama-server, ...).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiConfig;
use crate::error::{Error, Result};
use crate::models::{Presence, ReconciledRow};
use crate::prompts::{PromptId, PromptLibrary};

use super::{AIBackend, Sampling, ANSWER_SAMPLING, EXPLAIN_SAMPLING};

/// Per-request timeout for chat completions
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from the text-generation section of the configuration
    pub fn from_config(config: &AiConfig) -> Self {
        Self::with_api_key(&config.base_url, &config.model, &config.api_key)
    }

    /// Use a specific prompt library (e.g. embedded only in tests)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    fn render(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<String> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        prompts.render(id, vars)
    }

    /// Make a chat completion request
    async fn chat_completion(&self, prompt: &str, sampling: Sampling) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(sampling.temperature),
            max_tokens: Some(sampling.max_tokens),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("OpenAI API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(Error::Ai("No response from OpenAI API".into()));
        }
        Ok(content)
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn presence_note(presence: Presence) -> &'static str {
    match presence {
        Presence::Both => "",
        Presence::AccountingOnly => "this code appears only in the accounting system export",
        Presence::LedgerOnly => "this code appears only in the internal ledger export",
    }
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn explain_mismatch(&self, row: &ReconciledRow) -> Result<String> {
        let accounting_debit = row.accounting.debit.to_string();
        let accounting_credit = row.accounting.credit.to_string();
        let ledger_debit = row.ledger.debit.to_string();
        let ledger_credit = row.ledger.credit.to_string();

        let prompt = {
            let mut vars = HashMap::new();
            vars.insert("key", row.key.as_str());
            vars.insert("accounting_debit", accounting_debit.as_str());
            vars.insert("accounting_credit", accounting_credit.as_str());
            vars.insert("ledger_debit", ledger_debit.as_str());
            vars.insert("ledger_credit", ledger_credit.as_str());
            vars.insert("presence_note", presence_note(row.presence));
            self.render(PromptId::ExplainMismatch, &vars)?
        };

        let response = self.chat_completion(&prompt, EXPLAIN_SAMPLING).await?;
        debug!(key = %row.key, "Explanation response: {}", response);
        Ok(response)
    }

    async fn answer_question(&self, question: &str, table_csv: &str) -> Result<String> {
        let prompt = {
            let mut vars = HashMap::new();
            vars.insert("data", table_csv);
            vars.insert("question", question);
            self.render(PromptId::AnswerQuestion, &vars)?
        };

        let response = self.chat_completion(&prompt, ANSWER_SAMPLING).await?;
        debug!("Assistant response: {}", response);
        Ok(response)
    }

    async fn health_check(&self) -> bool {
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key);
        }
        matches!(req.send().await, Ok(resp) if resp.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
