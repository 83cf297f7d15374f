//! Tally Core Library
//!
//! Shared functionality for the Tally ledger reconciliation tool:
//! - CSV import of the accounting and internal ledger exports
//! - Outer-join reconciliation with Matched/Mismatched classification
//! - Per-mismatch explanations from an OpenAI-compatible backend
//! - Spreadsheet and CSV export of the reconciled table
//! - Report delivery by email and summary delivery by WhatsApp
//! - Assistant for free-form questions about the table
//! - Prompt library for customizable AI prompts

pub mod ai;
pub mod assistant;
pub mod config;
pub mod error;
pub mod explain;
pub mod export;
pub mod import;
pub mod models;
pub mod notify;
pub mod prompts;
pub mod reconcile;

/// Test utilities including the mock relay server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OpenAICompatibleBackend};
pub use assistant::Assistant;
pub use config::{AiConfig, Channel, Config, EmailConfig, Secrets, WhatsAppConfig};
pub use error::{Error, Result};
pub use explain::{ExplainStats, Explainer};
pub use export::{to_csv, to_xlsx, write_csv, write_xlsx, EXPORT_FILENAME};
pub use import::{normalize_column_name, read_ledger, LedgerSchema};
pub use models::{
    Amounts, ChatEntry, ChatLog, LedgerRow, MatchStatus, Presence, ReconciledRow,
    ReconciledTable, ReconciliationSummary, Side,
};
pub use notify::{
    validate_destination, Mailer, Messenger, MockMailer, MockMessenger, Notifier, SmtpMailer,
    TwilioMessenger,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use reconcile::{classify, reconcile, MISMATCH_TOLERANCE};
