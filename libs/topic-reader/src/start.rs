use reader_api::{Message, MessageId, SourceError, SourceHandle, StartPosition};

use crate::compaction::CompactionView;

/// Read position of one reader.
///
/// Advanced only by a completed `next`. `pending` holds at most one message
/// already pulled from the source by `has_next` but not yet returned.
#[derive(Debug)]
pub(crate) struct Cursor {
    pub last_delivered: Option<MessageId>,
    pub view: CompactionView,
    pub pending: Option<Message>,
}

impl Cursor {
    /// Decide whether a message taken from the source is visible to the caller.
    pub fn accept(&self, msg: Message, topic: &str) -> Option<Message> {
        if let Some(last) = self.last_delivered {
            if msg.id() <= last {
                tracing::warn!(%topic, id = %msg.id(), last = %last, "out-of-order message from source, skipping");
                return None;
            }
        }
        if !self.view.admits(&msg) {
            tracing::trace!(%topic, id = %msg.id(), "message superseded by compaction, skipping");
            return None;
        }
        Some(msg)
    }

    /// Record `msg` as delivered and hand it out.
    pub fn deliver(&mut self, msg: Message) -> Message {
        self.last_delivered = Some(msg.id());
        msg
    }
}

/// Seek `handle` to the requested start and build the initial cursor.
///
/// The tail for `Latest` is fixed here, at creation time, so messages
/// published between creation and the first read are delivered.
pub(crate) fn resolve(
    handle: &dyn SourceHandle,
    start: StartPosition,
    read_compacted: bool,
) -> Result<Cursor, SourceError> {
    let last_delivered = match start {
        StartPosition::Earliest => {
            handle.seek_to_earliest()?;
            None
        }
        StartPosition::Latest => {
            handle.seek_to_latest()?;
            None
        }
        StartPosition::After(id) => {
            handle.seek_after(id)?;
            Some(id)
        }
    };

    let view = if read_compacted {
        CompactionView::compacted(handle.compaction_horizon())
    } else {
        CompactionView::passthrough()
    };

    Ok(Cursor {
        last_delivered,
        view,
        pending: None,
    })
}
