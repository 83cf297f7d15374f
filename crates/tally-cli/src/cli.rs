//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tally_core::EXPORT_FILENAME;

/// Tally - Reconcile an accounting export against an internal ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Ledger reconciliation with AI explanations", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Secrets file (TOML with OPENAI_API_KEY, EMAIL_*, TWILIO_* keys)
    ///
    /// Defaults to ~/.config/tally/secrets.toml when present.
    /// Environment variables of the same names take precedence.
    #[arg(long, global = true)]
    pub secrets: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// The two exports to reconcile
#[derive(Args, Debug, Clone)]
pub struct LedgerArgs {
    /// Accounting-system export (CSV)
    #[arg(short, long)]
    pub accounting: PathBuf,

    /// Internal ledger export (CSV)
    #[arg(short, long)]
    pub ledger: PathBuf,

    /// Key column of the accounting export
    #[arg(long, default_value = "account_code")]
    pub accounting_key: String,

    /// Key column of the ledger export
    #[arg(long, default_value = "gl_code")]
    pub ledger_key: String,

    /// Skip AI explanations of mismatched rows
    #[arg(long)]
    pub no_explain: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile two exports, write the spreadsheet, optionally deliver it
    Reconcile {
        #[command(flatten)]
        input: LedgerArgs,

        /// Spreadsheet output path
        #[arg(short, long, default_value = EXPORT_FILENAME)]
        output: PathBuf,

        /// Also write the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Email the spreadsheet to EMAIL_RECEIVER
        #[arg(long)]
        email: bool,

        /// Send the summary to this WhatsApp number (e.g. +14155551234)
        #[arg(long, value_name = "NUMBER")]
        whatsapp: Option<String>,
    },

    /// Reconcile two exports, then ask questions about the result
    Chat {
        #[command(flatten)]
        input: LedgerArgs,

        /// Question to ask (repeatable); reads stdin when omitted
        #[arg(short, long)]
        question: Vec<String>,
    },

    /// Show configured channels and AI endpoint reachability
    Status,

    /// Manage AI prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., explain_mismatch, answer_question)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
