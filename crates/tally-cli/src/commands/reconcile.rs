//! Reconcile command: reconcile, explain, export, deliver

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tally_core::{write_csv, write_xlsx, AIClient, Notifier};

use super::{explain_client, explain_table, load_config, load_table, print_summary, print_table};
use crate::cli::LedgerArgs;

/// Everything `tally reconcile` was asked to do
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub input: LedgerArgs,
    pub output: PathBuf,
    pub csv: Option<PathBuf>,
    pub email: bool,
    pub whatsapp: Option<String>,
}

pub async fn cmd_reconcile(secrets: Option<&Path>, opts: &ReconcileOptions) -> Result<()> {
    let config = load_config(secrets)?;

    let ai = explain_client(&config, opts.input.no_explain);
    if ai.is_none() && !opts.input.no_explain {
        println!("ℹ️  OPENAI_API_KEY not set; skipping explanations");
    }

    let notifier = Notifier::from_config(&config);
    run_reconcile(opts, ai, &notifier).await
}

/// Run the reconcile pipeline with explicit collaborators
///
/// The spreadsheet is written before any delivery. Deliveries run
/// independently; if any fails the others still run and an error is
/// returned at the end.
pub async fn run_reconcile(
    opts: &ReconcileOptions,
    ai: Option<AIClient>,
    notifier: &Notifier,
) -> Result<()> {
    println!(
        "📥 Reconciling {} against {}...",
        opts.input.accounting.display(),
        opts.input.ledger.display()
    );

    let mut table = load_table(&opts.input)?;

    if let Some(client) = ai {
        explain_table(client, &mut table).await;
    }

    print_table(&table);
    let summary = table.summary();
    print_summary(&summary);

    write_xlsx(&table, &opts.output)
        .with_context(|| format!("Failed to write {}", opts.output.display()))?;
    println!("💾 Wrote {}", opts.output.display());

    if let Some(ref csv_path) = opts.csv {
        write_csv(&table, csv_path)
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        println!("💾 Wrote {}", csv_path.display());
    }

    let mut failures: Vec<String> = Vec::new();

    if opts.email {
        match notifier.email_report(&table).await {
            Ok(()) => println!("📧 Report emailed"),
            Err(e) => {
                eprintln!("❌ Email failed: {}", e);
                failures.push(format!("email: {}", e));
            }
        }
    }

    if let Some(ref destination) = opts.whatsapp {
        match notifier.send_summary(&table, destination).await {
            Ok(sid) => println!("📱 Summary sent to {} (message {})", destination, sid),
            Err(e) => {
                eprintln!("❌ WhatsApp failed: {}", e);
                failures.push(format!("whatsapp: {}", e));
            }
        }
    }

    if !failures.is_empty() {
        bail!(
            "{} delivery(ies) failed: {}",
            failures.len(),
            failures.join("; ")
        );
    }

    Ok(())
}
