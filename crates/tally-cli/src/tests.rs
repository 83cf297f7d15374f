//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tally_core::{AIClient, Assistant, MockBackend, MockMailer, MockMessenger, Notifier};
use tempfile::TempDir;

use crate::cli::LedgerArgs;
use crate::commands::{self, truncate, ReconcileOptions};

const ACCOUNTING: &str = "Account Code,Account Name,Debit,Credit\n\
                          1000,Cash,500.00,0\n\
                          2000,Receivables,100.00,0\n\
                          3000,Suspense,0,25.50\n";

const LEDGER: &str = "GL Code,Debit,Credit\n\
                      1000,500.00,0\n\
                      2000,80.00,0\n";

fn write_inputs(dir: &TempDir) -> LedgerArgs {
    let accounting = dir.path().join("accounting.csv");
    let ledger = dir.path().join("ledger.csv");
    fs::write(&accounting, ACCOUNTING).unwrap();
    fs::write(&ledger, LEDGER).unwrap();

    LedgerArgs {
        accounting,
        ledger,
        accounting_key: "account_code".to_string(),
        ledger_key: "gl_code".to_string(),
        no_explain: false,
    }
}

fn options(dir: &TempDir) -> ReconcileOptions {
    ReconcileOptions {
        input: write_inputs(dir),
        output: dir.path().join("reconciliation_output.xlsx"),
        csv: Some(dir.path().join("reconciliation_output.csv")),
        email: false,
        whatsapp: None,
    }
}

fn csv_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn csv_path(opts: &ReconcileOptions) -> PathBuf {
    opts.csv.clone().unwrap()
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is too long", 10), "this is...");
    assert_eq!(truncate("différence", 5), "di...");
}

#[test]
fn test_load_table() {
    let dir = TempDir::new().unwrap();
    let table = commands::load_table(&write_inputs(&dir)).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.mismatched().count(), 2);
}

#[test]
fn test_load_table_missing_file() {
    let dir = TempDir::new().unwrap();
    let mut args = write_inputs(&dir);
    args.ledger = dir.path().join("missing.csv");

    let err = commands::load_table(&args).unwrap_err();
    assert!(err.to_string().contains("missing.csv"));
}

#[test]
fn test_load_table_custom_key_column() {
    let dir = TempDir::new().unwrap();
    let mut args = write_inputs(&dir);
    fs::write(&args.ledger, "Ref,Debit,Credit\n1000,500,0\n").unwrap();
    args.ledger_key = "Ref".to_string();

    let table = commands::load_table(&args).unwrap();
    assert_eq!(table.len(), 3);
}

// ========== Reconcile Command Tests ==========

#[tokio::test]
async fn test_reconcile_writes_exports_without_ai() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);

    commands::run_reconcile(&opts, None, &Notifier::new())
        .await
        .unwrap();

    assert!(fs::metadata(&opts.output).unwrap().len() > 0);
    let lines = csv_lines(&csv_path(&opts));
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("status,presence,ai_explanation"));
}

#[tokio::test]
async fn test_reconcile_fills_explanations() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    let backend = MockBackend::new();

    commands::run_reconcile(&opts, Some(AIClient::Mock(backend.clone())), &Notifier::new())
        .await
        .unwrap();

    assert_eq!(backend.calls(), 2);
    let lines = csv_lines(&csv_path(&opts));
    assert!(lines[1].ends_with(",Matched,both,"));
    assert!(lines[2].contains("Account 2000 differs"));
}

#[tokio::test]
async fn test_reconcile_delivers_on_request() {
    let dir = TempDir::new().unwrap();
    let mut opts = options(&dir);
    opts.email = true;
    opts.whatsapp = Some("+14155551234".to_string());

    let mailer = MockMailer::new("cfo@example.com");
    let messenger = MockMessenger::new();
    let notifier = Notifier::new()
        .with_mailer(mailer.clone())
        .with_messenger(messenger.clone());

    commands::run_reconcile(&opts, None, &notifier).await.unwrap();

    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(
        messenger.sent()[0].1,
        "Reconciliation done. 2 mismatches found. Total difference: 45.50."
    );
}

#[tokio::test]
async fn test_failed_delivery_still_runs_others_and_keeps_export() {
    let dir = TempDir::new().unwrap();
    let mut opts = options(&dir);
    opts.email = true;
    opts.whatsapp = Some("+14155551234".to_string());

    let messenger = MockMessenger::new();
    let notifier = Notifier::new()
        .with_mailer(MockMailer::failing("cfo@example.com"))
        .with_messenger(messenger.clone());

    let err = commands::run_reconcile(&opts, None, &notifier)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("email"));
    assert_eq!(messenger.sent().len(), 1);
    assert!(opts.output.exists());
}

#[tokio::test]
async fn test_invalid_whatsapp_number_fails_command() {
    let dir = TempDir::new().unwrap();
    let mut opts = options(&dir);
    opts.whatsapp = Some("12345".to_string());

    let messenger = MockMessenger::new();
    let notifier = Notifier::new().with_messenger(messenger.clone());

    let err = commands::run_reconcile(&opts, None, &notifier)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("whatsapp"));
    assert!(messenger.sent().is_empty());
}

#[tokio::test]
async fn test_email_requested_but_not_configured() {
    let dir = TempDir::new().unwrap();
    let mut opts = options(&dir);
    opts.email = true;

    let err = commands::run_reconcile(&opts, None, &Notifier::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not configured"));
}

#[tokio::test]
async fn test_bad_input_fails_before_export() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    fs::write(&opts.input.accounting, "account_code,debit\n1000,1\n").unwrap();

    let result = commands::run_reconcile(&opts, None, &Notifier::new()).await;
    assert!(result.is_err());
    assert!(!opts.output.exists());
}

#[tokio::test]
async fn test_partial_email_config_does_not_block_reconcile() {
    let dir = TempDir::new().unwrap();
    let secrets = dir.path().join("secrets.toml");
    fs::write(&secrets, "EMAIL_SENDER = \"books@example.com\"\n").unwrap();
    let mut opts = options(&dir);
    opts.input.no_explain = true;

    commands::cmd_reconcile(Some(&secrets), &opts).await.unwrap();

    assert!(opts.output.exists());
    assert_eq!(csv_lines(&csv_path(&opts)).len(), 4);
}

#[tokio::test]
async fn test_bad_sender_fails_only_the_email_delivery() {
    let dir = TempDir::new().unwrap();
    let secrets = dir.path().join("secrets.toml");
    fs::write(
        &secrets,
        "EMAIL_SENDER = \"not an address\"\n\
         EMAIL_PASSWORD = \"app-password\"\n\
         EMAIL_RECEIVER = \"cfo@example.com\"\n",
    )
    .unwrap();
    let mut opts = options(&dir);
    opts.input.no_explain = true;

    commands::cmd_reconcile(Some(&secrets), &opts).await.unwrap();
    assert!(opts.output.exists());

    opts.email = true;
    let err = commands::cmd_reconcile(Some(&secrets), &opts)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("EMAIL_SENDER"));
    assert!(opts.output.exists());
}

// ========== Chat Command Tests ==========

#[tokio::test]
async fn test_chat_with_flag_questions() {
    let dir = TempDir::new().unwrap();
    let table = commands::load_table(&write_inputs(&dir)).unwrap();
    let assistant = Assistant::new(AIClient::mock());
    let questions = vec!["How many mismatches?".to_string(), "Why?".to_string()];

    let log = commands::run_chat(&assistant, &table, &questions, Cursor::new(""))
        .await
        .unwrap();

    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[1].question, "Why?");
}

#[tokio::test]
async fn test_chat_reads_stdin_until_exit() {
    let dir = TempDir::new().unwrap();
    let table = commands::load_table(&write_inputs(&dir)).unwrap();
    let assistant = Assistant::new(AIClient::mock());
    let input = Cursor::new("first question\n\n  second question  \nexit\nignored\n");

    let log = commands::run_chat(&assistant, &table, &[], input)
        .await
        .unwrap();

    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[0].question, "first question");
    assert_eq!(log.entries()[1].question, "second question");
}

#[tokio::test]
async fn test_chat_stops_at_eof() {
    let dir = TempDir::new().unwrap();
    let table = commands::load_table(&write_inputs(&dir)).unwrap();
    let assistant = Assistant::new(AIClient::mock());

    let log = commands::run_chat(&assistant, &table, &[], Cursor::new("only one"))
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
}

// ========== Prompts Command Tests ==========

#[test]
fn test_cmd_prompts_show_known_and_unknown() {
    assert!(commands::cmd_prompts_show("explain_mismatch").is_ok());

    let err = commands::cmd_prompts_show("classify_merchant").unwrap_err();
    assert!(err.to_string().contains("answer_question"));
}

#[test]
fn test_cmd_prompts_list() {
    assert!(commands::cmd_prompts_list().is_ok());
}
