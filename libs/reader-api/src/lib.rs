pub mod error;
pub mod message;
pub mod source;
pub mod topic;

pub use error::{SourceError, SourceErrorKind};
pub use message::{CompactionHorizon, Message, MessageId, ParseMessageIdError, StartPosition};
pub use source::{MessageSource, SourceHandle};
pub use topic::{TopicName, TopicNameError};
