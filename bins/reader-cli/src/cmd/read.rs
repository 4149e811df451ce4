use std::collections::HashMap;
use std::io::{BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde::Serialize;

use source_memory::{BrokerError, MemoryBroker};
use topic_reader::{Message, MessageId, Reader, ReaderError};

use crate::config::{AppConfig, ReadArgs};
use crate::error::CliError;

/// One printed message. Payloads that are not UTF-8 are printed as base64.
#[derive(Debug, Serialize)]
struct OutputLine<'a> {
    id: MessageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<&'a HashMap<String, String>>,
    publish_ts_ms: i64,
}

impl<'a> From<&'a Message> for OutputLine<'a> {
    fn from(msg: &'a Message) -> Self {
        let (payload, payload_base64) = match std::str::from_utf8(msg.payload()) {
            Ok(text) => (Some(text), None),
            Err(_) => (
                None,
                Some(base64::engine::general_purpose::STANDARD.encode(msg.payload())),
            ),
        };
        Self {
            id: msg.id(),
            key: msg.key(),
            payload,
            payload_base64,
            properties: Some(msg.properties()).filter(|p| !p.is_empty()),
            publish_ts_ms: msg.publish_ts_ms(),
        }
    }
}

pub async fn run(args: ReadArgs) -> Result<(), CliError> {
    // --- Load config ---
    let config = AppConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Seed broker ---
    let broker = MemoryBroker::new(config.broker)?;
    for seed in &config.seed {
        let file = std::fs::File::open(&seed.file).map_err(|e| CliError::Seed {
            path: seed.file.clone(),
            source: BrokerError::Io(e),
        })?;
        broker
            .seed_jsonl(&seed.topic, BufReader::new(file))
            .map_err(|source| CliError::Seed { path: seed.file.clone(), source })?;
        if seed.compact {
            broker.compact(&seed.topic)?;
        }
    }

    // --- Open reader ---
    let reader = Arc::new(Reader::create(&broker, &config.reader).await?);

    let closer = reader.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, closing reader");
            let _ = closer.close();
        }
    });

    // --- Read loop ---
    let idle = Duration::from_millis(args.idle_timeout_ms);
    let mut out = std::io::stdout();
    let mut delivered = 0usize;
    loop {
        if args.max_messages.is_some_and(|max| delivered >= max) {
            break;
        }
        match reader.next_timeout(idle).await {
            Ok(msg) => {
                let line = serde_json::to_string(&OutputLine::from(&msg))?;
                writeln!(out, "{line}")?;
                delivered += 1;
            }
            Err(ReaderError::Timeout) => {
                tracing::info!(idle_ms = args.idle_timeout_ms, "no message within idle timeout, stopping");
                break;
            }
            Err(ReaderError::ClosedReader) => break,
            Err(e) => return Err(e.into()),
        }
    }
    out.flush()?;

    reader.close()?;
    tracing::info!(topic = %reader.topic(), delivered, "finished");
    Ok(())
}
