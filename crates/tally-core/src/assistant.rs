//! Free-form questions about a reconciled table
//!
//! Each question is answered from the table alone: the whole table goes out
//! as CSV text with the question, and no earlier Q/A is included.

use tracing::warn;

use crate::ai::{AIBackend, AIClient};
use crate::explain::AI_ERROR_PREFIX;
use crate::export::to_csv;
use crate::models::{ChatEntry, ChatLog, ReconciledTable};

pub struct Assistant {
    client: AIClient,
}

impl Assistant {
    pub fn new(client: AIClient) -> Self {
        Self { client }
    }

    /// Answer `question` about `table` and append the exchange to `log`
    ///
    /// Never fails: an error becomes the answer text.
    pub async fn ask<'a>(
        &self,
        question: &str,
        table: &ReconciledTable,
        log: &'a mut ChatLog,
    ) -> &'a ChatEntry {
        let answer = match self.answer(question, table).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Assistant request failed: {}", e);
                format!("{} {}", AI_ERROR_PREFIX, e)
            }
        };
        log.push(question.to_string(), answer)
    }

    async fn answer(&self, question: &str, table: &ReconciledTable) -> crate::Result<String> {
        let data = to_csv(table)?;
        self.client.answer_question(question, &data).await
    }
}
