use reader_api::{SourceError, TopicNameError};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(#[from] TopicNameError),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("broker unreachable")]
    Unreachable,

    #[error("seed line {line}: {detail}")]
    Seed { line: usize, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    /// Convert for the source boundary: I/O failures keep the `Io` kind,
    /// everything else means the topic could not be reached.
    pub fn into_source_error(self) -> SourceError {
        match self {
            BrokerError::Io(e) => SourceError::from(e),
            other => SourceError::connect(other.to_string()),
        }
    }
}
