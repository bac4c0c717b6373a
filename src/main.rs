use anyhow::Context;
use clap::{Parser, Subcommand};
use conversation_memory::config::{Config, show_config};
use conversation_memory::embeddings::OllamaClient;
use conversation_memory::{ConversationMemory, Result};

#[derive(Parser)]
#[command(name = "conversation-memory")]
#[command(about = "Index past agent sessions and retrieve relevant conversations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index new or changed session logs
    Index {
        /// Re-index every session log, even unchanged ones
        #[arg(long)]
        force: bool,
    },
    /// Search past conversations and print the agent context block
    Search {
        /// Query text to find related conversations for
        query: String,
        /// Session ID whose turns should not be returned
        #[arg(long)]
        exclude_session: Option<String>,
    },
    /// Show index statistics
    Stats,
    /// Check that Ollama is reachable and the embedding model is available
    Health,
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { force } => {
            let mut memory = ConversationMemory::open(Config::load()?)?;
            let report = memory.index_all(force)?;
            println!(
                "Indexed {} conversations from {} files ({} unchanged, {} failed)",
                report.turns_added,
                report.files_indexed,
                report.files_unchanged,
                report.failures.len()
            );
            if report.degraded_turns > 0 {
                println!(
                    "Warning: {} conversations were indexed without an embedding",
                    report.degraded_turns
                );
            }
            for failure in &report.failures {
                println!("  {}: {}", failure.path.display(), failure.error);
            }
        }
        Commands::Search {
            query,
            exclude_session,
        } => {
            let memory = ConversationMemory::open(Config::load()?)?;
            let (results, context) = memory.search_context(&query, exclude_session.as_deref());
            if results.is_empty() {
                println!("No relevant past conversations found.");
            } else {
                for result in &results {
                    println!(
                        "[{:.4}] {} ({})",
                        result.distance, result.turn.query, result.turn.session_id
                    );
                }
                println!();
                print!("{}", context);
            }
        }
        Commands::Stats => {
            let memory = ConversationMemory::open(Config::load()?)?;
            let stats = memory.stats();
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to encode stats")?
            );
        }
        Commands::Health => {
            let config = Config::load()?;
            OllamaClient::new(&config.ollama)?.health_check()?;
            println!("Ollama is reachable and {} is available", config.ollama.model);
        }
        Commands::Config => {
            show_config()?;
        }
    }

    Ok(())
}
