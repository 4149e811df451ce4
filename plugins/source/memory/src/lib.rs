mod broker;
mod config;
mod error;
mod handle;
mod seed;

pub use broker::MemoryBroker;
pub use config::MemoryBrokerConfig;
pub use error::BrokerError;
pub use handle::MemoryHandle;
pub use seed::ProducerMessage;
