//! Per-mismatch explanations
//!
//! Each Mismatched row gets one request to the text-generation backend, in
//! table order, one at a time. Matched rows get an empty explanation and no
//! request. A failed request marks only its own row.

use tracing::{debug, warn};

use crate::ai::{AIBackend, AIClient};
use crate::models::ReconciledTable;

/// Prefix for the explanation of a row whose request failed
pub const AI_ERROR_PREFIX: &str = "AI Error:";

/// Outcome counts of an explanation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplainStats {
    /// Mismatched rows that received a hypothesis
    pub explained: usize,
    /// Mismatched rows whose request failed
    pub failed: usize,
    /// Matched rows (no request made)
    pub skipped: usize,
}

/// Progress callback for explanation passes
/// Parameters: (current, total) over mismatched rows
pub type ExplainProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Fills the explanation column of a reconciled table
pub struct Explainer {
    client: AIClient,
    progress: Option<ExplainProgressCallback>,
}

impl Explainer {
    pub fn new(client: AIClient) -> Self {
        Self {
            client,
            progress: None,
        }
    }

    /// Report progress after each mismatched row
    pub fn with_progress(mut self, callback: ExplainProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    /// Set every row's explanation
    ///
    /// Never fails: a backend error becomes `AI Error: <message>` in that
    /// row and the pass continues.
    pub async fn explain_table(&self, table: &mut ReconciledTable) -> ExplainStats {
        let mut stats = ExplainStats::default();
        let total = table.mismatched().count();
        let mut current = 0;

        for index in 0..table.len() {
            let row = table.rows()[index].clone();

            if !row.is_mismatched() {
                table.set_explanation(index, String::new());
                stats.skipped += 1;
                continue;
            }

            let explanation = match self.client.explain_mismatch(&row).await {
                Ok(text) => {
                    debug!(key = %row.key, "Explained mismatch");
                    stats.explained += 1;
                    text
                }
                Err(e) => {
                    warn!("Explanation failed for '{}': {}", row.key, e);
                    stats.failed += 1;
                    format!("{} {}", AI_ERROR_PREFIX, e)
                }
            };
            table.set_explanation(index, explanation);

            current += 1;
            if let Some(ref progress) = self.progress {
                progress(current, total);
            }
        }

        stats
    }
}
