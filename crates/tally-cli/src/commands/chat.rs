//! Chat command: questions about a reconciled table

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Result};
use tally_core::{AIClient, Assistant, ChatLog, ReconciledTable};

use super::{explain_client, explain_table, load_config, load_table, print_summary};
use crate::cli::LedgerArgs;

/// Line that ends an interactive session
const EXIT_COMMAND: &str = "exit";

pub async fn cmd_chat(secrets: Option<&Path>, input: &LedgerArgs, questions: &[String]) -> Result<()> {
    let config = load_config(secrets)?;

    let Some(client) = AIClient::from_config(&config) else {
        bail!("The assistant needs OPENAI_API_KEY (secrets file or environment)");
    };

    let mut table = load_table(input)?;
    if let Some(explainer) = explain_client(&config, input.no_explain) {
        explain_table(explainer, &mut table).await;
    }
    print_summary(&table.summary());

    let assistant = Assistant::new(client);
    let stdin = io::stdin();
    let log = run_chat(&assistant, &table, questions, stdin.lock()).await?;

    if !log.is_empty() {
        println!();
        println!("💬 Chat history");
        println!();
        print!("{}", log.render_markdown());
    }
    Ok(())
}

/// Answer `questions`, or when there are none, each line of `input` until
/// EOF or `exit`
pub async fn run_chat<R: BufRead>(
    assistant: &Assistant,
    table: &ReconciledTable,
    questions: &[String],
    input: R,
) -> Result<ChatLog> {
    let mut log = ChatLog::new();

    if !questions.is_empty() {
        for question in questions {
            let entry = assistant.ask(question, table, &mut log).await;
            println!("❓ {}", entry.question);
            println!("💡 {}", entry.answer);
        }
        return Ok(log);
    }

    println!("Ask about the reconciliation (\"{}\" to finish).", EXIT_COMMAND);
    prompt()?;
    for line in input.lines() {
        let line = line?;
        let question = line.trim();
        if question.eq_ignore_ascii_case(EXIT_COMMAND) {
            break;
        }
        if !question.is_empty() {
            let entry = assistant.ask(question, table, &mut log).await;
            println!("💡 {}", entry.answer);
        }
        prompt()?;
    }
    println!();

    Ok(log)
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}
