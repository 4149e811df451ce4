use source_memory::BrokerError;
use topic_reader::ReaderError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("seed '{path}': {source}")]
    Seed { path: String, source: BrokerError },

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("{0}")]
    Reader(#[from] ReaderError),

    #[error("output: {0}")]
    Output(#[from] std::io::Error),

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}
