// Configuration management module
// TOML-backed settings for the embedding service and the memory index

pub mod display;
pub mod settings;


pub use display::show_config;
pub use settings::{Config, ConfigError, MemoryConfig, OllamaConfig};
