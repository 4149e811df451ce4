use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use crate::error::SourceError;
use crate::message::{CompactionHorizon, Message, MessageId};
use crate::topic::TopicName;

/// Connection to the broker side of a topic log.
///
/// The reader doesn't know concrete implementations (in-memory broker,
/// network client, ...). For the reader, a source is just this trait.
pub trait MessageSource: Send + Sync {
    /// Open a cursor on `topic` under the given subscription name.
    ///
    /// Fails with a `Connect` error when the broker is unreachable or the
    /// topic cannot be resolved.
    #[allow(clippy::type_complexity)]
    fn connect(
        &self,
        topic: &TopicName,
        subscription: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SourceHandle>, SourceError>> + Send + '_>>;
}

/// One established cursor on one topic.
///
/// Seek and take operations act on the handle's own position; two handles on
/// the same topic never affect each other.
pub trait SourceHandle: Send + Sync {
    /// Position before the oldest retained message.
    fn seek_to_earliest(&self) -> Result<(), SourceError>;

    /// Position at the current tail. Only messages published after this call
    /// are delivered.
    fn seek_to_latest(&self) -> Result<(), SourceError>;

    /// Position so that the next message is the first one with an id greater
    /// than `id`.
    fn seek_after(&self, id: MessageId) -> Result<(), SourceError>;

    /// Take the next message if one is available right now.
    fn try_take_next(&self) -> Result<Option<Message>, SourceError>;

    /// Wait for the next message until `deadline` (forever if `None`).
    ///
    /// Returns a `Timeout` error when the deadline passes. Must be cancel-safe:
    /// dropping the future before it completes must not consume a message.
    fn wait_take_next(
        &self,
        deadline: Option<Instant>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, SourceError>> + Send + '_>>;

    /// Horizon of the topic's last completed compaction, if any.
    fn compaction_horizon(&self) -> Option<CompactionHorizon>;

    /// Release the cursor. Idempotent; later reads fail with `Released`.
    fn release(&self);
}
