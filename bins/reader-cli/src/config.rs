use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use source_memory::MemoryBrokerConfig;
use topic_reader::ReaderConfiguration;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "topic-reader", about = "Sequential topic reader over an in-memory broker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seed the broker, open a reader and print messages as JSON lines
    Read(ReadArgs),
    /// Check the [reader] section without connecting
    Validate(ValidateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ReadArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "reader.toml", env = "READER_CONFIG")]
    pub config: String,

    /// Stop after this many messages
    #[arg(long)]
    pub max_messages: Option<usize>,

    /// Stop once no message arrives for this long (milliseconds)
    #[arg(long, default_value_t = 1000)]
    pub idle_timeout_ms: u64,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "reader.toml", env = "READER_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: MemoryBrokerConfig,
    /// Topics published into the broker before the reader is opened.
    #[serde(default)]
    pub seed: Vec<SeedConfig>,
    pub reader: ReaderConfiguration,
}

#[derive(Debug, Deserialize)]
pub struct SeedConfig {
    pub topic: String,
    /// JSON-lines file, one message per line.
    pub file: String,
    /// Compact the topic after seeding.
    #[serde(default)]
    pub compact: bool,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| CliError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
