//! Pluggable text-generation backend abstraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: the two requests Tally makes of a language model
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::load(None)?;
//! if let Some(client) = AIClient::from_config(&config) {
//!     let hypothesis = client.explain_mismatch(&row).await?;
//! }
//! ```

mod mock;
mod openai_compatible;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::ReconciledRow;

/// Sampling parameters for one kind of request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Mismatch explanations: a little variety, one sentence
pub const EXPLAIN_SAMPLING: Sampling = Sampling {
    temperature: 0.5,
    max_tokens: 100,
};

/// Assistant answers: deterministic, short
pub const ANSWER_SAMPLING: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 150,
};

/// Trait defining the interface for all text-generation backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// One-sentence hypothesis for why a mismatched row differs
    async fn explain_mismatch(&self, row: &ReconciledRow) -> Result<String>;

    /// Short answer to a question about the table (given as CSV text)
    async fn answer_question(&self, question: &str, table_csv: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI chat completions API or any server implementing it
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create a client from configuration
    ///
    /// Returns None if no text-generation API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .ai
            .as_ref()
            .map(|ai| AIClient::OpenAICompatible(OpenAICompatibleBackend::from_config(ai)))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn explain_mismatch(&self, row: &ReconciledRow) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.explain_mismatch(row).await,
            AIClient::Mock(b) => b.explain_mismatch(row).await,
        }
    }

    async fn answer_question(&self, question: &str, table_csv: &str) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.answer_question(question, table_csv).await,
            AIClient::Mock(b) => b.answer_question(question, table_csv).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secrets;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }

    #[test]
    fn test_from_config_without_key() {
        let config = Config::from_secrets(Secrets::default());
        assert!(AIClient::from_config(&config).is_none());
    }

    #[test]
    fn test_from_config_with_key() {
        let secrets = Secrets {
            openai_api_key: Some("sk-test".into()),
            ..Secrets::default()
        };
        let config = Config::from_secrets(secrets);
        let client = AIClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "gpt-4");
        assert_eq!(client.host(), "https://api.openai.com");
    }

    #[test]
    fn test_answer_sampling_is_deterministic() {
        assert_eq!(ANSWER_SAMPLING.temperature, 0.0);
        assert_eq!(ANSWER_SAMPLING.max_tokens, 150);
        assert_eq!(EXPLAIN_SAMPLING.max_tokens, 100);
    }
}
