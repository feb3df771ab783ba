//! GPT Bot Telegram binary.
//!
//! Start the bot with:
//! ```bash
//! cargo run -p gptbot-telegram -- --config ./config.properties
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gptbot_core::{default_config_file, ConfigStore};
use gptbot_telegram::TelegramBot;
use tracing_subscriber::EnvFilter;

/// GPT Bot - chat with OpenAI models from Telegram
#[derive(Parser, Debug)]
#[command(name = "gptbot-telegram")]
#[command(about = "Telegram bot that forwards commands to OpenAI")]
struct Args {
    /// Path to the key/value configuration file
    #[arg(short, long, env = "GPTBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "gptbot_telegram=info,gptbot_core=info,teloxide=warn",
        1 => "gptbot_telegram=debug,gptbot_core=debug,teloxide=info",
        2 => "gptbot_telegram=trace,gptbot_core=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = args.config.unwrap_or_else(default_config_file);

    // Configuration problems are fatal.
    let config = match ConfigStore::load(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    let bot = match TelegramBot::new(config) {
        Ok(bot) => bot,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create bot");
            return Err(e.into());
        }
    };

    println!("\nGPT Bot");
    println!("   Config: {}", config_path.display());
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
