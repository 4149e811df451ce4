pub mod compaction;
pub mod config;
pub mod error;
pub mod reader;
mod start;

pub use compaction::CompactionView;
pub use config::{ReaderConfiguration, ValidatedConfig};
pub use error::{ReaderError, ResultKind};
pub use reader::{Reader, ReaderState};

pub use reader_api::{
    CompactionHorizon, Message, MessageId, MessageSource, SourceError, SourceErrorKind,
    SourceHandle, StartPosition, TopicName,
};
