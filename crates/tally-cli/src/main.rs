//! Tally CLI - Ledger reconciliation with AI explanations
//!
//! Usage:
//!   tally reconcile -a accounting.csv -l ledger.csv    Reconcile and write the spreadsheet
//!   tally reconcile ... --email --whatsapp +1415...    Also deliver the results
//!   tally chat -a accounting.csv -l ledger.csv         Ask questions about the result
//!   tally status                                       Show configured channels

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let secrets = cli.secrets.as_deref();

    match cli.command {
        Commands::Reconcile {
            input,
            output,
            csv,
            email,
            whatsapp,
        } => {
            let opts = commands::ReconcileOptions {
                input,
                output,
                csv,
                email,
                whatsapp,
            };
            commands::cmd_reconcile(secrets, &opts).await
        }
        Commands::Chat { input, question } => commands::cmd_chat(secrets, &input, &question).await,
        Commands::Status => commands::cmd_status(secrets).await,
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
