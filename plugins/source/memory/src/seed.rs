use std::collections::HashMap;
use std::io::BufRead;

use base64::Engine;
use serde::Deserialize;

use crate::broker::MemoryBroker;
use crate::error::BrokerError;

/// Message as handed to the broker for publishing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerMessage {
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
}

/// One line of a JSON-lines seed file.
///
/// Supports two payload forms:
/// 1. `{"payload": "text"}`: UTF-8 text
/// 2. `{"payload_base64": "aGVsbG8="}`: arbitrary bytes
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedLine {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    payload_base64: Option<String>,
    #[serde(default)]
    properties: HashMap<String, String>,
}

impl SeedLine {
    fn into_message(self) -> Result<ProducerMessage, String> {
        let payload = match (self.payload, self.payload_base64) {
            (Some(text), None) => text.into_bytes(),
            (None, Some(b64)) => base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| format!("payload_base64: {e}"))?,
            (None, None) => Vec::new(),
            (Some(_), Some(_)) => {
                return Err("payload and payload_base64 are mutually exclusive".into());
            }
        };
        Ok(ProducerMessage {
            key: self.key,
            payload,
            properties: self.properties,
        })
    }
}

impl MemoryBroker {
    /// Publish every line of a JSON-lines document to `topic`, in order.
    ///
    /// Blank lines are skipped. Stops at the first malformed line; lines
    /// before it stay published. Returns the number of messages published.
    pub fn seed_jsonl(&self, topic: &str, input: impl BufRead) -> Result<usize, BrokerError> {
        let mut published = 0;
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let seed: SeedLine = serde_json::from_str(&line).map_err(|e| BrokerError::Seed {
                line: index + 1,
                detail: e.to_string(),
            })?;
            let message = seed.into_message().map_err(|detail| BrokerError::Seed {
                line: index + 1,
                detail,
            })?;
            self.publish_message(topic, message)?;
            published += 1;
        }
        tracing::info!(topic, published, "topic seeded");
        Ok(published)
    }
}
