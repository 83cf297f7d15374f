//! Mock backend for testing
//!
//! Returns predictable text without a network round trip. Keys listed with
//! `failing_on` produce an error instead, so per-row failure handling can be
//! exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::ReconciledRow;

use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    failing_keys: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::default()
        }
    }

    /// Fail every request that mentions `key`
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing_keys.push(key.to_string());
        self
    }

    /// Number of requests made so far (shared between clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn explain_mismatch(&self, row: &ReconciledRow) -> Result<String> {
        self.record();
        if self.failing_keys.iter().any(|k| k == &row.key) {
            return Err(Error::Ai(format!("mock failure for {}", row.key)));
        }
        Ok(format!(
            "Account {} differs by {} debit and {} credit, likely a timing difference.",
            row.key, row.debit_diff, row.credit_diff
        ))
    }

    async fn answer_question(&self, question: &str, table_csv: &str) -> Result<String> {
        self.record();
        if self.failing_keys.iter().any(|k| question.contains(k.as_str())) {
            return Err(Error::Ai("mock failure".into()));
        }
        let data_rows = table_csv.lines().count().saturating_sub(1);
        Ok(format!(
            "Mock answer to '{}' over {} rows.",
            question.trim(),
            data_rows
        ))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
