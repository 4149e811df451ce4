use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  MessageId
// ════════════════════════════════════════════════════════════════

/// Position of a message within a topic's log.
///
/// Ordered by ledger first, then by entry within the ledger. Ids handed
/// out by a source for one topic are strictly increasing in publish order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    pub ledger_id: u64,
    pub entry_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseMessageIdError {
    #[error("invalid message id '{0}': expected <ledger>:<entry>")]
    Format(String),

    #[error("invalid message id bytes: expected 16 bytes, got {0}")]
    Length(usize),
}

impl MessageId {
    pub const fn new(ledger_id: u64, entry_id: u64) -> Self {
        Self { ledger_id, entry_id }
    }

    /// Binary form for persisting a resume point: ledger then entry, big-endian.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.ledger_id.to_be_bytes());
        out[8..].copy_from_slice(&self.entry_id.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseMessageIdError> {
        let bytes: &[u8; 16] = bytes
            .try_into()
            .map_err(|_| ParseMessageIdError::Length(bytes.len()))?;
        let mut ledger = [0u8; 8];
        let mut entry = [0u8; 8];
        ledger.copy_from_slice(&bytes[..8]);
        entry.copy_from_slice(&bytes[8..]);
        Ok(Self::new(u64::from_be_bytes(ledger), u64::from_be_bytes(entry)))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ledger_id, self.entry_id)
    }
}

impl FromStr for MessageId {
    type Err = ParseMessageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMessageIdError::Format(s.to_string());
        let (ledger, entry) = s.split_once(':').ok_or_else(err)?;
        let ledger_id = ledger.trim().parse().map_err(|_| err())?;
        let entry_id = entry.trim().parse().map_err(|_| err())?;
        Ok(Self::new(ledger_id, entry_id))
    }
}

impl Serialize for MessageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════
//  StartPosition
// ════════════════════════════════════════════════════════════════

/// Where a reader starts.
///
/// `Earliest` and `Latest` are symbolic positions resolved against the
/// source when the reader is created; they never identify a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartPosition {
    /// Before the oldest retained message.
    Earliest,
    /// At the log tail: only messages published after the reader was created.
    Latest,
    /// Strictly after the given message (exclusive), for resuming.
    After(MessageId),
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPosition::Earliest => f.write_str("earliest"),
            StartPosition::Latest => f.write_str("latest"),
            StartPosition::After(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for StartPosition {
    type Err = ParseMessageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(StartPosition::Earliest),
            "latest" => Ok(StartPosition::Latest),
            _ => s.parse().map(StartPosition::After),
        }
    }
}

impl From<MessageId> for StartPosition {
    fn from(id: MessageId) -> Self {
        StartPosition::After(id)
    }
}

impl Serialize for StartPosition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StartPosition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════
//  Message
// ════════════════════════════════════════════════════════════════

/// Immutable message as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    key: Option<String>,
    payload: Vec<u8>,
    properties: HashMap<String, String>,
    publish_ts_ms: i64,
}

impl Message {
    pub fn new(id: MessageId, key: Option<String>, payload: Vec<u8>) -> Self {
        Self {
            id,
            key,
            payload,
            properties: HashMap::new(),
            publish_ts_ms: 0,
        }
    }

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_publish_ts_ms(mut self, ts_ms: i64) -> Self {
        self.publish_ts_ms = ts_ms;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the message and return the payload bytes.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Publish time in Unix milliseconds, 0 if the source did not record one.
    pub fn publish_ts_ms(&self) -> i64 {
        self.publish_ts_ms
    }
}

// ════════════════════════════════════════════════════════════════
//  CompactionHorizon
// ════════════════════════════════════════════════════════════════

/// Result of the topic's last completed compaction, as computed by the broker.
///
/// Every message at or before `horizon` is covered by the compaction. For each
/// key seen in that prefix, `retained` names the one message kept for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionHorizon {
    horizon: MessageId,
    retained: HashMap<String, MessageId>,
}

impl CompactionHorizon {
    pub fn new(horizon: MessageId, retained: HashMap<String, MessageId>) -> Self {
        Self { horizon, retained }
    }

    pub fn horizon(&self) -> MessageId {
        self.horizon
    }

    /// Id of the message kept for `key`, if the key occurs before the horizon.
    pub fn retained(&self, key: &str) -> Option<MessageId> {
        self.retained.get(key).copied()
    }

    pub fn covers(&self, id: MessageId) -> bool {
        id <= self.horizon
    }

    pub fn retained_keys(&self) -> usize {
        self.retained.len()
    }
}
