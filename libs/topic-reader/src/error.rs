use reader_api::{SourceError, SourceErrorKind, TopicName};

/// Classification of a reader failure, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    InvalidConfiguration,
    ConnectError,
    Timeout,
    ClosedReader,
    SourceError,
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Missing or invalid configuration field. Raised before any connection attempt.
    #[error("invalid configuration ({field}): {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    /// The source could not be reached or the topic could not be resolved.
    #[error("connect ({topic}): {source}")]
    Connect { topic: String, source: SourceError },

    /// The deadline elapsed before a message became available. The cursor is unchanged.
    #[error("timed out waiting for the next message")]
    Timeout,

    #[error("reader is closed")]
    ClosedReader,

    /// The source failed after the reader was established.
    #[error("source ({topic}): {source}")]
    Source { topic: String, source: SourceError },
}

impl ReaderError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ReaderError::InvalidConfiguration { field, reason: reason.into() }
    }

    pub(crate) fn connect(topic: &TopicName, source: SourceError) -> Self {
        ReaderError::Connect { topic: topic.to_string(), source }
    }

    /// Map a runtime source failure onto the reader's error kinds.
    pub(crate) fn from_source(topic: &TopicName, source: SourceError) -> Self {
        match source.kind() {
            SourceErrorKind::Timeout => ReaderError::Timeout,
            SourceErrorKind::Released => ReaderError::ClosedReader,
            SourceErrorKind::Connect | SourceErrorKind::Io => ReaderError::Source {
                topic: topic.to_string(),
                source,
            },
        }
    }

    pub fn kind(&self) -> ResultKind {
        match self {
            ReaderError::InvalidConfiguration { .. } => ResultKind::InvalidConfiguration,
            ReaderError::Connect { .. } => ResultKind::ConnectError,
            ReaderError::Timeout => ResultKind::Timeout,
            ReaderError::ClosedReader => ResultKind::ClosedReader,
            ReaderError::Source { .. } => ResultKind::SourceError,
        }
    }

    /// `Connect` is retried by creating a new reader, `Timeout` by calling `next` again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReaderError::Connect { .. } | ReaderError::Timeout)
    }
}
