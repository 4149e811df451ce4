use serde::Deserialize;

use crate::error::BrokerError;

fn default_max_entries_per_ledger() -> u64 {
    50_000
}

fn default_max_retained() -> usize {
    100_000
}

fn default_auto_create_topics() -> bool {
    true
}

fn default_notify_buffer() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryBrokerConfig {
    /// Entries written to a ledger before the topic rolls over to a new one.
    #[serde(default = "default_max_entries_per_ledger")]
    pub max_entries_per_ledger: u64,
    /// Retained messages per topic; older ones are trimmed from the front.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
    /// Create unknown topics on first connect or publish.
    #[serde(default = "default_auto_create_topics")]
    pub auto_create_topics: bool,
    /// Capacity of the per-topic new-message notification channel.
    #[serde(default = "default_notify_buffer")]
    pub notify_buffer: usize,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            max_entries_per_ledger: default_max_entries_per_ledger(),
            max_retained: default_max_retained(),
            auto_create_topics: default_auto_create_topics(),
            notify_buffer: default_notify_buffer(),
        }
    }
}

impl MemoryBrokerConfig {
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.max_entries_per_ledger == 0 {
            return Err(BrokerError::Config("max_entries_per_ledger must be > 0".into()));
        }
        if self.max_retained == 0 {
            return Err(BrokerError::Config("max_retained must be > 0".into()));
        }
        if self.notify_buffer == 0 {
            return Err(BrokerError::Config("notify_buffer must be > 0".into()));
        }
        Ok(())
    }
}
