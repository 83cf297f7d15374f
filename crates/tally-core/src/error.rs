//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("{ledger} ledger is missing required column '{column}'")]
    MissingColumn { ledger: String, column: String },

    #[error("{ledger} ledger, line {line}: cannot parse {column} amount '{value}'")]
    InvalidAmount {
        ledger: String,
        line: u64,
        column: String,
        value: String,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI error: {0}")]
    Ai(String),

    #[error("Mail relay error: {0}")]
    Mail(String),

    #[error("Messaging relay error: {0}")]
    Messaging(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
}

pub type Result<T> = std::result::Result<T, Error>;
