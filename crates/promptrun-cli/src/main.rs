//! promptrun CLI
//!
//! Runs one conversation described by a YAML or TOML file and prints the
//! result record as JSON on stdout. Logs go to stderr.
//!
//! Usage:
//! ```bash
//! # Mock mode (no network)
//! promptrun --config conversation.yaml
//!
//! # Against the real provider, keys from the environment
//! OPENAI_API_KEY=your_key promptrun --config conversation.yaml --real
//!
//! # Validate the file and show the rendered prompts
//! promptrun --config conversation.yaml check
//! ```

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::RunConfig;
use promptrun_engine::ConversationEngine;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// promptrun - LLM conversation runner
#[derive(Parser)]
#[command(name = "promptrun")]
#[command(about = "Run a prompt as a simulated conversation against an LLM provider", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the conversation file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "PROMPTRUN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Call the real provider instead of the mock
    #[arg(long, global = true)]
    real: bool,

    /// Override the number of turns
    #[arg(long, value_name = "N", global = true)]
    max_turns: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversation (default if no command specified)
    Run,
    /// Validate the conversation file and print the rendered prompts
    Check,
}

fn init_tracing(level: &str, json: bool) -> anyhow::Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .context("no conversation file given; pass --config or set PROMPTRUN_CONFIG")?;
    let mut config = RunConfig::from_file(&config_path)?;

    // Environment overrides the file, flags override both
    config.merge_env();
    if cli.real {
        config.conversation.use_real_llm = true;
    }
    if let Some(max_turns) = cli.max_turns {
        config.conversation.max_turns = max_turns;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_tracing(&config.logging.level, cli.json_logs || config.logging.json)?;
    info!("Loaded conversation from {}", config_path.display());

    let input = config.engine_input();

    let rendered = match cli.command {
        Some(Commands::Check) => {
            input.validate()?;
            let prompts = input.render_prompts();
            serde_json::to_string_pretty(&serde_json::json!({
                "systemPrompt": prompts.system,
                "firstUserMessage": prompts.first_message,
                "maxTurns": input.max_turns,
                "useRealLlm": input.use_real_llm,
            }))?
        }
        Some(Commands::Run) | None => {
            let engine =
                ConversationEngine::new(config.endpoints()).with_settings(config.engine_settings());
            let result = engine.run(&input).await?;
            serde_json::to_string_pretty(&result)?
        }
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Result written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
