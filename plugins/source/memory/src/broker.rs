use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use reader_api::{
    CompactionHorizon, Message, MessageId, MessageSource, SourceError, SourceHandle, TopicName,
};

use crate::config::MemoryBrokerConfig;
use crate::error::BrokerError;
use crate::handle::MemoryHandle;
use crate::seed::ProducerMessage;

/// Broker-side publish timestamp. A clock before the epoch stamps 0.
fn publish_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

// ═══════════════════════════════════════════════════════════════
//  TopicLog
// ═══════════════════════════════════════════════════════════════

pub(crate) struct LogState {
    pub entries: VecDeque<Message>,
    pub ledger_id: u64,
    pub next_entry: u64,
    pub compaction: Option<CompactionHorizon>,
}

impl LogState {
    pub fn last_id(&self) -> Option<MessageId> {
        self.entries.back().map(Message::id)
    }

    /// Index of the first retained entry with an id greater than `id`.
    pub fn first_after(&self, id: MessageId) -> usize {
        self.entries.partition_point(|m| m.id() <= id)
    }
}

/// Append-only log of one topic plus its active reader subscriptions.
pub(crate) struct TopicLog {
    pub name: TopicName,
    state: RwLock<LogState>,
    subscriptions: RwLock<HashSet<String>>,
    /// Unit signal broadcast on every append.
    notify_tx: broadcast::Sender<()>,
}

impl TopicLog {
    fn new(name: TopicName, ledger_id: u64, notify_buffer: usize) -> Self {
        let (notify_tx, _) = broadcast::channel(notify_buffer);
        Self {
            name,
            state: RwLock::new(LogState {
                entries: VecDeque::new(),
                ledger_id,
                next_entry: 0,
                compaction: None,
            }),
            subscriptions: RwLock::new(HashSet::new()),
            notify_tx,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, LogState> {
        match self.state.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(topic = %self.name, "topic log read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, LogState> {
        match self.state.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(topic = %self.name, "topic log write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn subscriptions_mut(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        match self.subscriptions.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe_notify(&self) -> broadcast::Receiver<()> {
        self.notify_tx.subscribe()
    }

    pub fn remove_subscription(&self, name: &str) {
        self.subscriptions_mut().remove(name);
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// In-process broker: a set of topic logs that readers connect to.
///
/// Stands in for a real broker connection in tests and in the CLI. Owns the
/// broker-side concerns the reader treats as opaque: id assignment, ledger
/// rollover, retention, and compaction.
pub struct MemoryBroker {
    config: MemoryBrokerConfig,
    topics: RwLock<HashMap<String, Arc<TopicLog>>>,
    next_ledger: AtomicU64,
    reachable: AtomicBool,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("topics", &self.topics().len())
            .field("reachable", &self.reachable.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::with_config(MemoryBrokerConfig::default())
    }
}

impl MemoryBroker {
    pub fn new(config: MemoryBrokerConfig) -> Result<Self, BrokerError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: MemoryBrokerConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
            next_ledger: AtomicU64::new(0),
            reachable: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the broker. Unreachable brokers refuse
    /// new connections and publishes; existing handles keep reading.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    pub fn create_topic(&self, topic: &str) -> Result<TopicName, BrokerError> {
        let name = TopicName::parse(topic)?;
        self.get_or_create(&name);
        Ok(name)
    }

    pub fn topics(&self) -> Vec<String> {
        let guard = match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the readers currently connected to `topic`.
    pub fn subscriptions(&self, topic: &str) -> Result<Vec<String>, BrokerError> {
        let log = self.existing(topic)?;
        let guard = match log.subscriptions.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut names: Vec<String> = guard.iter().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn last_message_id(&self, topic: &str) -> Result<Option<MessageId>, BrokerError> {
        Ok(self.existing(topic)?.read().last_id())
    }

    /// Append a message and wake waiting readers.
    pub fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<MessageId, BrokerError> {
        self.publish_message(
            topic,
            ProducerMessage {
                key: key.map(str::to_string),
                payload: payload.into(),
                properties: HashMap::new(),
            },
        )
    }

    pub fn publish_message(
        &self,
        topic: &str,
        message: ProducerMessage,
    ) -> Result<MessageId, BrokerError> {
        if !self.reachable.load(Ordering::Acquire) {
            return Err(BrokerError::Unreachable);
        }
        let log = self.resolve(topic)?;

        let id = {
            let mut state = log.write();
            if state.next_entry >= self.config.max_entries_per_ledger {
                state.ledger_id = self.next_ledger.fetch_add(1, Ordering::Relaxed);
                state.next_entry = 0;
                tracing::debug!(topic = %log.name, ledger = state.ledger_id, "ledger rolled over");
            }
            let id = MessageId::new(state.ledger_id, state.next_entry);
            state.next_entry += 1;

            if state.entries.len() >= self.config.max_retained {
                state.entries.pop_front();
            }
            state.entries.push_back(
                Message::new(id, message.key, message.payload)
                    .with_properties(message.properties)
                    .with_publish_ts_ms(publish_time_ms()),
            );
            id
        };

        // Notify readers (ignore if none are waiting).
        let _ = log.notify_tx.send(());
        Ok(id)
    }

    /// Compact `topic` up to its current last message.
    ///
    /// Records, for every key in the log, the id of its most recent message.
    /// The raw log is left untouched; compacted readers filter against the
    /// recorded horizon. Returns `None` for an empty topic.
    pub fn compact(&self, topic: &str) -> Result<Option<CompactionHorizon>, BrokerError> {
        let log = self.existing(topic)?;
        let mut state = log.write();
        let Some(horizon) = state.last_id() else {
            return Ok(None);
        };

        let mut retained = HashMap::new();
        for msg in &state.entries {
            if let Some(key) = msg.key() {
                retained.insert(key.to_string(), msg.id());
            }
        }

        let compaction = CompactionHorizon::new(horizon, retained);
        tracing::info!(
            topic = %log.name,
            horizon = %horizon,
            keys = compaction.retained_keys(),
            "topic compacted"
        );
        state.compaction = Some(compaction.clone());
        Ok(Some(compaction))
    }

    fn existing(&self, topic: &str) -> Result<Arc<TopicLog>, BrokerError> {
        let name = TopicName::parse(topic)?;
        self.lookup(&name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))
    }

    fn resolve(&self, topic: &str) -> Result<Arc<TopicLog>, BrokerError> {
        let name = TopicName::parse(topic)?;
        self.resolve_name(&name)
    }

    fn resolve_name(&self, name: &TopicName) -> Result<Arc<TopicLog>, BrokerError> {
        if let Some(log) = self.lookup(name) {
            return Ok(log);
        }
        if !self.config.auto_create_topics {
            return Err(BrokerError::TopicNotFound(name.to_string()));
        }
        Ok(self.get_or_create(name))
    }

    fn lookup(&self, name: &TopicName) -> Option<Arc<TopicLog>> {
        let guard = match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("broker topic map read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.get(name.as_str()).cloned()
    }

    fn get_or_create(&self, name: &TopicName) -> Arc<TopicLog> {
        let mut guard = match self.topics.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("broker topic map write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(topic = %name, "topic created");
                let ledger = self.next_ledger.fetch_add(1, Ordering::Relaxed);
                Arc::new(TopicLog::new(name.clone(), ledger, self.config.notify_buffer))
            })
            .clone()
    }

    fn open_handle(
        &self,
        topic: &TopicName,
        subscription: &str,
    ) -> Result<MemoryHandle, BrokerError> {
        if !self.reachable.load(Ordering::Acquire) {
            return Err(BrokerError::Unreachable);
        }
        let log = self.resolve_name(topic)?;
        if !log.subscriptions_mut().insert(subscription.to_string()) {
            return Err(BrokerError::Config(format!(
                "subscription '{subscription}' already has an active reader on {topic}"
            )));
        }
        tracing::debug!(%topic, %subscription, "reader connected");
        Ok(MemoryHandle::new(log, subscription.to_string()))
    }
}

impl MessageSource for MemoryBroker {
    fn connect(
        &self,
        topic: &TopicName,
        subscription: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SourceHandle>, SourceError>> + Send + '_>> {
        let result = self
            .open_handle(topic, subscription)
            .map(|h| Box::new(h) as Box<dyn SourceHandle>)
            .map_err(|e| e.into_source_error().with_context(topic));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker(config: MemoryBrokerConfig) -> MemoryBroker {
        MemoryBroker::new(config).unwrap()
    }

    #[test]
    fn ids_increase_and_roll_over_ledgers() {
        let broker = broker(MemoryBrokerConfig {
            max_entries_per_ledger: 2,
            ..Default::default()
        });
        let ids: Vec<MessageId> = (0..5)
            .map(|i| broker.publish("t", None, format!("m-{i}")).unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "{ids:?}");
        assert_eq!(ids[0].ledger_id, ids[1].ledger_id);
        assert_ne!(ids[1].ledger_id, ids[2].ledger_id);
        assert_eq!(ids[2].entry_id, 0);
    }

    #[test]
    fn published_messages_carry_broker_timestamp() {
        let broker = MemoryBroker::default();
        let before = publish_time_ms();
        broker.publish("t", None, "x").unwrap();
        let log = broker.existing("t").unwrap();
        let stamped = log.read().entries[0].publish_ts_ms();
        assert!(stamped >= before && stamped > 0, "{stamped} < {before}");
    }

    #[test]
    fn retention_trims_oldest() {
        let broker = broker(MemoryBrokerConfig {
            max_retained: 3,
            ..Default::default()
        });
        for i in 0..5 {
            broker.publish("t", None, format!("m-{i}")).unwrap();
        }
        let log = broker.existing("t").unwrap();
        let state = log.read();
        let payloads: Vec<&[u8]> = state.entries.iter().map(Message::payload).collect();
        assert_eq!(payloads, vec![&b"m-2"[..], &b"m-3"[..], &b"m-4"[..]]);
    }

    #[test]
    fn compaction_keeps_latest_id_per_key() {
        let broker = MemoryBroker::default();
        let a0 = broker.publish("t", Some("a"), "a0").unwrap();
        let b0 = broker.publish("t", Some("b"), "b0").unwrap();
        let a1 = broker.publish("t", Some("a"), "a1").unwrap();
        broker.publish("t", None, "keyless").unwrap();

        let horizon = broker.compact("t").unwrap().unwrap();
        assert_eq!(horizon.retained("a"), Some(a1));
        assert_eq!(horizon.retained("b"), Some(b0));
        assert_ne!(horizon.retained("a"), Some(a0));
        assert_eq!(horizon.retained_keys(), 2);
        assert_eq!(Some(horizon.horizon()), broker.last_message_id("t").unwrap());
    }

    #[test]
    fn compacting_empty_or_unknown_topic() {
        let broker = MemoryBroker::default();
        broker.create_topic("empty").unwrap();
        assert!(broker.compact("empty").unwrap().is_none());
        assert!(matches!(broker.compact("missing"), Err(BrokerError::TopicNotFound(_))));
    }

    #[test]
    fn short_and_full_names_share_a_topic() {
        let broker = MemoryBroker::default();
        broker.publish("orders", None, "x").unwrap();
        broker.publish("persistent://public/default/orders", None, "y").unwrap();
        assert_eq!(broker.topics(), vec!["persistent://public/default/orders".to_string()]);
    }

    #[test]
    fn unreachable_broker_refuses_publish() {
        let broker = MemoryBroker::default();
        broker.set_reachable(false);
        assert!(matches!(broker.publish("t", None, "x"), Err(BrokerError::Unreachable)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = MemoryBroker::new(MemoryBrokerConfig {
            max_retained: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }
}
