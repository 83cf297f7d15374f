//! Status command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::config::default_secrets_path;
use tally_core::{AIBackend, AIClient, Channel, Config};

use super::load_config;

pub async fn cmd_status(secrets: Option<&Path>) -> Result<()> {
    let config = load_config(secrets)?;

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");

    match config.source {
        Some(ref path) => println!("   Secrets: {}", path.display()),
        None => println!(
            "   Secrets: (none; looked for {})",
            default_secrets_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no config directory)".to_string())
        ),
    }
    println!();

    print_channels(&config);

    if let Some(client) = AIClient::from_config(&config) {
        println!();
        print!("   Checking {}... ", client.host());
        if client.health_check().await {
            println!("✓ reachable");
        } else {
            println!("❌ not reachable");
        }
    }

    println!();
    Ok(())
}

fn print_channels(config: &Config) {
    match config.ai {
        Some(ref ai) => println!("   🤖 AI:       {} at {} (key=***)", ai.model, ai.base_url),
        None => println!("   🤖 AI:       not configured (OPENAI_API_KEY)"),
    }

    match config.email {
        Channel::Ready(ref email) => println!(
            "   📧 Email:    {} → {} via {}:{}",
            email.sender, email.receiver, email.smtp_host, email.smtp_port
        ),
        Channel::Invalid(ref reason) => println!("   📧 Email:    ⚠️  {}", reason),
        Channel::Off => println!("   📧 Email:    not configured (EMAIL_SENDER, EMAIL_PASSWORD, EMAIL_RECEIVER)"),
    }

    match config.whatsapp {
        Channel::Ready(ref whatsapp) => println!(
            "   📱 WhatsApp: account {} from {}",
            whatsapp.account_sid, whatsapp.from
        ),
        Channel::Invalid(ref reason) => println!("   📱 WhatsApp: ⚠️  {}", reason),
        Channel::Off => println!("   📱 WhatsApp: not configured (TWILIO_SID, TWILIO_AUTH_TOKEN)"),
    }
}
