use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use reader_api::{Message, MessageSource, SourceHandle, TopicName};

use crate::config::ReaderConfiguration;
use crate::error::ReaderError;
use crate::start::{self, Cursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Open,
    Closed,
}

/// Sequential, non-acking cursor over one topic.
///
/// All methods take `&self`: a reader can sit behind an `Arc` so that `close`
/// is called from another task while one task is waiting in `next`. The
/// waiting call returns `ClosedReader` as soon as the close signal fires.
pub struct Reader {
    topic: TopicName,
    name: String,
    handle: Box<dyn SourceHandle>,
    cursor: Mutex<Cursor>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("topic", &self.topic.as_str())
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Reader {
    /// Validate `config`, connect to the topic and seek to the start position.
    ///
    /// An invalid configuration fails before `source` is touched. Any failure
    /// while connecting or seeking is reported as `Connect`.
    pub async fn create(
        source: &dyn MessageSource,
        config: &ReaderConfiguration,
    ) -> Result<Self, ReaderError> {
        let cfg = config.validate()?;

        let handle = source
            .connect(&cfg.topic, &cfg.name)
            .await
            .map_err(|e| ReaderError::connect(&cfg.topic, e))?;

        let cursor = match start::resolve(&*handle, cfg.start, cfg.read_compacted) {
            Ok(cursor) => cursor,
            Err(e) => {
                handle.release();
                return Err(ReaderError::connect(&cfg.topic, e));
            }
        };

        tracing::info!(
            topic = %cfg.topic,
            reader = %cfg.name,
            start = %cfg.start,
            read_compacted = cfg.read_compacted,
            horizon = ?cursor.view.horizon().map(|h| h.horizon()),
            "reader created"
        );

        Ok(Self {
            topic: cfg.topic,
            name: cfg.name,
            handle,
            cursor: Mutex::new(cursor),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Fully-qualified topic name.
    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    /// Reader (subscription) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ReaderState {
        if self.closed.load(Ordering::Acquire) {
            ReaderState::Closed
        } else {
            ReaderState::Open
        }
    }

    /// Whether a message can be returned by `next` right now.
    ///
    /// Never waits: `false` means nothing is available at this moment, not
    /// that nothing will ever arrive. While another task is inside `next` the
    /// cursor belongs to that call and the answer is `false`.
    pub async fn has_next(&self) -> Result<bool, ReaderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ReaderError::ClosedReader);
        }
        let Ok(mut cursor) = self.cursor.try_lock() else {
            tracing::trace!(topic = %self.topic, reader = %self.name, "cursor busy in next");
            return Ok(false);
        };
        if cursor.pending.is_some() {
            return Ok(true);
        }
        loop {
            let taken = self
                .handle
                .try_take_next()
                .map_err(|e| self.source_error(e))?;
            match taken {
                Some(msg) => {
                    if let Some(msg) = cursor.accept(msg, self.topic.as_str()) {
                        cursor.pending = Some(msg);
                        return Ok(true);
                    }
                }
                None => return Ok(false),
            }
        }
    }

    /// Wait for the next message until `deadline`.
    ///
    /// On `Timeout` the cursor is unchanged and the call can be repeated.
    pub async fn next(&self, deadline: Instant) -> Result<Message, ReaderError> {
        self.next_until(Some(deadline)).await
    }

    /// Wait for the next message for at most `timeout`.
    pub async fn next_timeout(&self, timeout: Duration) -> Result<Message, ReaderError> {
        self.next_until(Some(Instant::now() + timeout)).await
    }

    /// Wait for the next message with no deadline. Still returns on `close`.
    pub async fn recv(&self) -> Result<Message, ReaderError> {
        self.next_until(None).await
    }

    async fn next_until(&self, deadline: Option<Instant>) -> Result<Message, ReaderError> {
        let mut cursor = self.lock_cursor(deadline).await?;
        if let Some(msg) = cursor.pending.take() {
            return Ok(cursor.deliver(msg));
        }
        loop {
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(ReaderError::ClosedReader),
                res = self.handle.wait_take_next(deadline) => res.map_err(|e| self.source_error(e))?,
            };
            if let Some(msg) = cursor.accept(msg, self.topic.as_str()) {
                return Ok(cursor.deliver(msg));
            }
        }
    }

    /// Close the reader and release its source handle.
    ///
    /// The first call wakes any task waiting in `next`; later calls are no-ops.
    pub fn close(&self) -> Result<(), ReaderError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.cancel();
        self.handle.release();
        tracing::info!(topic = %self.topic, reader = %self.name, "reader closed");
        Ok(())
    }

    /// Take the cursor lock, giving up on close or when `deadline` passes.
    async fn lock_cursor(
        &self,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'_, Cursor>, ReaderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ReaderError::ClosedReader);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(ReaderError::ClosedReader),
            guard = self.cursor.lock() => Ok(guard),
            _ = sleep_until(deadline) => Err(ReaderError::Timeout),
        }
    }

    fn source_error(&self, e: reader_api::SourceError) -> ReaderError {
        if self.closed.load(Ordering::Acquire) {
            return ReaderError::ClosedReader;
        }
        ReaderError::from_source(&self.topic, e)
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn sleep_until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::ResultKind;
    use reader_api::{CompactionHorizon, MessageId, SourceError, StartPosition};

    /// Handle that replays a fixed script of take results.
    struct ScriptedHandle {
        script: std::sync::Mutex<VecDeque<Result<Option<Message>, SourceError>>>,
        released: Arc<AtomicUsize>,
    }

    impl SourceHandle for ScriptedHandle {
        fn seek_to_earliest(&self) -> Result<(), SourceError> {
            Ok(())
        }

        fn seek_to_latest(&self) -> Result<(), SourceError> {
            Ok(())
        }

        fn seek_after(&self, _id: MessageId) -> Result<(), SourceError> {
            Err(SourceError::io("seek rejected"))
        }

        fn try_take_next(&self) -> Result<Option<Message>, SourceError> {
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn wait_take_next(
            &self,
            deadline: Option<Instant>,
        ) -> Pin<Box<dyn Future<Output = Result<Message, SourceError>> + Send + '_>> {
            Box::pin(async move {
                match self.try_take_next()? {
                    Some(msg) => Ok(msg),
                    None => {
                        sleep_until(deadline).await;
                        Err(SourceError::timeout("no message"))
                    }
                }
            })
        }

        fn compaction_horizon(&self) -> Option<CompactionHorizon> {
            None
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedSource {
        script: std::sync::Mutex<Option<Vec<Result<Option<Message>, SourceError>>>>,
        released: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Message>, SourceError>>) -> Self {
            Self {
                script: std::sync::Mutex::new(Some(script)),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl MessageSource for ScriptedSource {
        fn connect(
            &self,
            _topic: &TopicName,
            _subscription: &str,
        ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SourceHandle>, SourceError>> + Send + '_>> {
            let script = self.script.lock().unwrap().take().unwrap_or_default();
            let released = self.released.clone();
            Box::pin(async move {
                Ok(Box::new(ScriptedHandle {
                    script: std::sync::Mutex::new(script.into()),
                    released,
                }) as Box<dyn SourceHandle>)
            })
        }
    }

    fn msg(entry: u64) -> Message {
        Message::new(MessageId::new(1, entry), None, format!("m-{entry}").into_bytes())
    }

    fn config() -> ReaderConfiguration {
        ReaderConfiguration::new()
            .topic("scripted")
            .start_message_id(StartPosition::Earliest)
    }

    #[tokio::test]
    async fn skips_messages_that_go_backwards() {
        let source = ScriptedSource::new(vec![
            Ok(Some(msg(2))),
            Ok(Some(msg(1))),
            Ok(Some(msg(2))),
            Ok(Some(msg(3))),
        ]);
        let reader = Reader::create(&source, &config()).await.unwrap();

        let first = reader.next_timeout(Duration::from_millis(50)).await.unwrap();
        let second = reader.next_timeout(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.id(), MessageId::new(1, 2));
        assert_eq!(second.id(), MessageId::new(1, 3));
    }

    #[tokio::test]
    async fn io_failure_is_reported_as_source_error() {
        let source = ScriptedSource::new(vec![Err(SourceError::io("connection reset"))]);
        let reader = Reader::create(&source, &config()).await.unwrap();

        let err = reader.has_next().await.unwrap_err();
        assert_eq!(err.kind(), ResultKind::SourceError);
    }

    #[tokio::test]
    async fn failed_seek_is_a_connect_error_and_releases_handle() {
        let source = ScriptedSource::new(vec![]);
        let cfg = config().start_message_id(MessageId::new(1, 1));

        let err = Reader::create(&source, &cfg).await.unwrap_err();
        assert_eq!(err.kind(), ResultKind::ConnectError);
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn has_next_keeps_message_for_next() {
        let source = ScriptedSource::new(vec![Ok(Some(msg(0)))]);
        let reader = Reader::create(&source, &config()).await.unwrap();

        assert!(reader.has_next().await.unwrap());
        assert!(reader.has_next().await.unwrap());
        let got = reader.next_timeout(Duration::from_millis(10)).await.unwrap();
        assert_eq!(got.payload(), b"m-0");
        assert!(!reader.has_next().await.unwrap());
    }

    #[tokio::test]
    async fn drop_releases_handle_once() {
        let source = ScriptedSource::new(vec![]);
        let reader = Reader::create(&source, &config()).await.unwrap();
        reader.close().unwrap();
        assert_eq!(reader.state(), ReaderState::Closed);
        drop(reader);
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }
}
