//! Shared command utilities
//!
//! This module contains:
//! - `load_config` - Build the configuration from secrets file + environment
//! - `load_table` - Read both exports and reconcile them
//! - `explain_table` - Fill explanations when an AI backend is available
//! - `print_table` / `print_summary` - Terminal output

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    import::{read_ledger, LedgerSchema},
    models::round_money,
    reconcile::reconcile,
    AIBackend, AIClient, Config, ExplainStats, Explainer, ReconciledTable, ReconciliationSummary,
};

use super::truncate;
use crate::cli::LedgerArgs;

/// Load configuration, reporting which file (if any) it came from
pub fn load_config(secrets: Option<&Path>) -> Result<Config> {
    let config = Config::load(secrets).context("Failed to load configuration")?;
    if let Some(ref source) = config.source {
        tracing::debug!("Loaded secrets from {}", source.display());
    }
    Ok(config)
}

/// Read one export with the given schema
fn read_export(path: &Path, schema: &LedgerSchema) -> Result<Vec<tally_core::LedgerRow>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_ledger(file, schema).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read both exports and reconcile them
pub fn load_table(args: &LedgerArgs) -> Result<ReconciledTable> {
    let accounting = read_export(
        &args.accounting,
        &LedgerSchema::accounting().with_key_column(&args.accounting_key),
    )?;
    let ledger = read_export(
        &args.ledger,
        &LedgerSchema::ledger().with_key_column(&args.ledger_key),
    )?;

    Ok(reconcile(&accounting, &ledger))
}

/// AI client for explanations, unless disabled or not configured
pub fn explain_client(config: &Config, no_explain: bool) -> Option<AIClient> {
    if no_explain {
        return None;
    }
    AIClient::from_config(config)
}

/// Explain mismatched rows, printing progress and a one-line result
pub async fn explain_table(client: AIClient, table: &mut ReconciledTable) -> ExplainStats {
    let mismatched = table.mismatched().count();
    if mismatched == 0 {
        return Explainer::new(client).explain_table(table).await;
    }

    println!(
        "🤖 Explaining {} mismatched row(s) with {}...",
        mismatched,
        client.model()
    );

    let explainer = Explainer::new(client).with_progress(Box::new(|current, total| {
        eprint!("\r   {}/{}", current, total);
        if current == total {
            eprintln!();
        }
    }));
    let stats = explainer.explain_table(table).await;

    if stats.failed > 0 {
        println!(
            "   ⚠️  {} explained, {} failed (see ai_explanation column)",
            stats.explained, stats.failed
        );
    } else {
        println!("   ✓ {} explained", stats.explained);
    }
    stats
}

/// Print the reconciled table
pub fn print_table(table: &ReconciledTable) {
    println!();
    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12} {:>10} {:>10}  {:<10}  {}",
        "KEY", "ACCT DR", "ACCT CR", "LEDGER DR", "LEDGER CR", "DR DIFF", "CR DIFF", "STATUS",
        "EXPLANATION"
    );
    println!("{}", "-".repeat(130));

    for row in table {
        println!(
            "{:<12} {:>12} {:>12} {:>12} {:>12} {:>10} {:>10}  {:<10}  {}",
            truncate(&row.key, 12),
            money(row.accounting.debit),
            money(row.accounting.credit),
            money(row.ledger.debit),
            money(row.ledger.credit),
            money(row.debit_diff),
            money(row.credit_diff),
            row.status.as_str(),
            truncate(row.explanation_text(), 50),
        );
    }
    println!();
}

/// Print the aggregate figures
pub fn print_summary(summary: &ReconciliationSummary) {
    println!("📊 Summary");
    println!("   Rows:            {}", summary.total_rows);
    println!("   Matched:         {}", summary.matched);
    println!("   Mismatched:      {}", summary.mismatched);
    if summary.accounting_only > 0 {
        println!("   Accounting only: {}", summary.accounting_only);
    }
    if summary.ledger_only > 0 {
        println!("   Ledger only:     {}", summary.ledger_only);
    }
    println!("   Total difference: {}", money(summary.total_difference));
    println!();
}

fn money(value: rust_decimal::Decimal) -> String {
    format!("{:.2}", round_money(value))
}
