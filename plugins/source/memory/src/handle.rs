use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use reader_api::{CompactionHorizon, Message, MessageId, SourceError, SourceHandle};

use crate::broker::TopicLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Before the oldest retained entry.
    Start,
    /// After the given id; the next entry is the first one greater than it.
    After(MessageId),
}

/// Reader cursor on one topic of a [`MemoryBroker`](crate::MemoryBroker).
pub struct MemoryHandle {
    log: Arc<TopicLog>,
    subscription: String,
    position: Mutex<Position>,
    notify_rx: tokio::sync::Mutex<broadcast::Receiver<()>>,
    released: AtomicBool,
}

impl MemoryHandle {
    pub(crate) fn new(log: Arc<TopicLog>, subscription: String) -> Self {
        // Subscribe before the first read so no append is missed in between.
        let notify_rx = log.subscribe_notify();
        Self {
            log,
            subscription,
            position: Mutex::new(Position::Start),
            notify_rx: tokio::sync::Mutex::new(notify_rx),
            released: AtomicBool::new(false),
        }
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    fn ensure_live(&self) -> Result<(), SourceError> {
        if self.released.load(Ordering::Acquire) {
            return Err(SourceError::released(format!(
                "subscription '{}' on {} was released",
                self.subscription, self.log.name
            )));
        }
        Ok(())
    }

    fn set_position(&self, position: Position) -> Result<(), SourceError> {
        self.ensure_live()?;
        let mut guard = match self.position.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = position;
        Ok(())
    }
}

impl SourceHandle for MemoryHandle {
    fn seek_to_earliest(&self) -> Result<(), SourceError> {
        self.set_position(Position::Start)
    }

    fn seek_to_latest(&self) -> Result<(), SourceError> {
        let tail = self.log.read().last_id();
        self.set_position(tail.map_or(Position::Start, Position::After))
    }

    fn seek_after(&self, id: MessageId) -> Result<(), SourceError> {
        self.set_position(Position::After(id))
    }

    fn try_take_next(&self) -> Result<Option<Message>, SourceError> {
        self.ensure_live()?;
        let mut position = match self.position.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = self.log.read();
        let index = match *position {
            Position::Start => 0,
            Position::After(id) => state.first_after(id),
        };
        let Some(msg) = state.entries.get(index) else {
            return Ok(None);
        };
        *position = Position::After(msg.id());
        Ok(Some(msg.clone()))
    }

    fn wait_take_next(
        &self,
        deadline: Option<Instant>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, SourceError>> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.notify_rx.lock().await;
            loop {
                if let Some(msg) = self.try_take_next()? {
                    return Ok(msg);
                }
                // Nothing yet, wait for an append notification.
                let woke = match deadline {
                    Some(deadline) => {
                        match tokio::time::timeout_at(deadline.into(), rx.recv()).await {
                            Ok(res) => res,
                            Err(_) => {
                                return Err(SourceError::timeout(format!(
                                    "no message on {} before deadline",
                                    self.log.name
                                )));
                            }
                        }
                    }
                    None => rx.recv().await,
                };
                match woke {
                    // Lagged notifications only mean there is more to re-read.
                    Ok(()) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        return Err(SourceError::released(format!("{} was removed", self.log.name)));
                    }
                }
            }
        })
    }

    fn compaction_horizon(&self) -> Option<CompactionHorizon> {
        self.log.read().compaction.clone()
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.log.remove_subscription(&self.subscription);
        tracing::debug!(topic = %self.log.name, subscription = %self.subscription, "reader released");
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.release();
    }
}
