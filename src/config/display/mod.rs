use anyhow::{Context, Result};
use console::style;

use super::Config;

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Fallback Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );
    eprintln!(
        "  Timeout: {}",
        style(format!("{}s", config.ollama.timeout_seconds)).cyan()
    );
    match config.embeddings_url() {
        Ok(url) => eprintln!("  Embeddings URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Embeddings URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Memory Settings:").bold().yellow());
    eprintln!(
        "  Session Logs: {}",
        style(config.memory.memory_dir.display()).cyan()
    );
    eprintln!(
        "  Index Directory: {}",
        style(config.memory.index_dir.display()).cyan()
    );
    eprintln!(
        "  File Pattern: {}",
        style(format!(
            "{}*.{}",
            config.memory.file_prefix, config.memory.file_extension
        ))
        .cyan()
    );
    eprintln!("  Top K: {}", style(config.memory.top_k).cyan());
    eprintln!(
        "  Answer Preview: {} chars",
        style(config.memory.answer_preview_chars).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
