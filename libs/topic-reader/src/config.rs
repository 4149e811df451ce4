use serde::Deserialize;

use reader_api::{StartPosition, TopicName, TopicNameError};

use crate::error::ReaderError;

const DEFAULT_ROLE_PREFIX: &str = "reader";

/// Reader configuration, built in code or parsed from TOML.
///
/// `topic` and `start_message_id` are required; they are `Option` so that a
/// missing value is reported by [`validate`](Self::validate) as a configuration
/// error instead of failing at parse time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderConfiguration {
    /// Topic to read. Short names are expanded to `persistent://public/default/<name>`.
    #[serde(default)]
    pub topic: Option<String>,

    /// `"earliest"`, `"latest"` or `"<ledger>:<entry>"` (exclusive).
    #[serde(default, alias = "start")]
    pub start_message_id: Option<StartPosition>,

    /// Read the compacted view of the topic.
    #[serde(default)]
    pub read_compacted: bool,

    /// Reader (subscription) name. Generated when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Prefix for the generated reader name.
    #[serde(default)]
    pub subscription_role_prefix: Option<String>,
}

/// A configuration that passed validation, with every required field resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub topic: TopicName,
    pub start: StartPosition,
    pub read_compacted: bool,
    pub name: String,
}

impl ReaderConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn start_message_id(mut self, start: impl Into<StartPosition>) -> Self {
        self.start_message_id = Some(start.into());
        self
    }

    pub fn read_compacted(mut self, read_compacted: bool) -> Self {
        self.read_compacted = read_compacted;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn subscription_role_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subscription_role_prefix = Some(prefix.into());
        self
    }

    /// Parse a configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Check the configuration without touching any source.
    ///
    /// Rules are checked in order and the first failure is returned:
    /// topic present and well-formed, start position present, name not blank.
    pub fn validate(&self) -> Result<ValidatedConfig, ReaderError> {
        let raw_topic = self
            .topic
            .as_deref()
            .ok_or_else(|| ReaderError::invalid("topic", "topic is required when creating a reader"))?;
        let topic = TopicName::parse(raw_topic).map_err(|e| match e {
            TopicNameError::Empty => {
                ReaderError::invalid("topic", "topic is required when creating a reader")
            }
            other => ReaderError::invalid("topic", other.to_string()),
        })?;

        let start = self.start_message_id.ok_or_else(|| {
            ReaderError::invalid("start_message_id", "start message id is required when creating a reader")
        })?;

        let name = match self.name.as_deref() {
            Some(name) if name.trim().is_empty() => {
                return Err(ReaderError::invalid("name", "reader name must not be blank"));
            }
            Some(name) => name.to_string(),
            None => generate_name(self.subscription_role_prefix.as_deref()),
        };

        Ok(ValidatedConfig {
            topic,
            start,
            read_compacted: self.read_compacted,
            name,
        })
    }
}

fn generate_name(prefix: Option<&str>) -> String {
    let prefix = prefix.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_ROLE_PREFIX);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..10])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultKind;
    use reader_api::MessageId;

    fn field_of(err: ReaderError) -> &'static str {
        match err {
            ReaderError::InvalidConfiguration { field, .. } => field,
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn missing_topic_is_rejected() {
        let err = ReaderConfiguration::new()
            .start_message_id(StartPosition::Latest)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ResultKind::InvalidConfiguration);
        assert_eq!(field_of(err), "topic");
    }

    #[test]
    fn empty_topic_is_rejected() {
        let err = ReaderConfiguration::new()
            .topic("")
            .start_message_id(StartPosition::Earliest)
            .validate()
            .unwrap_err();
        assert_eq!(field_of(err), "topic");
    }

    #[test]
    fn blank_topic_is_rejected() {
        let err = ReaderConfiguration::new()
            .topic("   ")
            .start_message_id(StartPosition::Earliest)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ResultKind::InvalidConfiguration);
        assert_eq!(field_of(err), "topic");
    }

    #[test]
    fn malformed_topic_is_rejected() {
        let err = ReaderConfiguration::new()
            .topic("kafka://public/default/t")
            .start_message_id(StartPosition::Earliest)
            .validate()
            .unwrap_err();
        assert_eq!(field_of(err), "topic");
    }

    #[test]
    fn missing_start_is_rejected() {
        let err = ReaderConfiguration::new().topic("my-topic").validate().unwrap_err();
        assert_eq!(field_of(err), "start_message_id");
    }

    #[test]
    fn topic_is_checked_before_start() {
        let err = ReaderConfiguration::new().validate().unwrap_err();
        assert_eq!(field_of(err), "topic");
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = ReaderConfiguration::new()
            .topic("t")
            .start_message_id(StartPosition::Earliest)
            .name("  ")
            .validate()
            .unwrap_err();
        assert_eq!(field_of(err), "name");
    }

    #[test]
    fn valid_configuration_resolves_fields() {
        let cfg = ReaderConfiguration::new()
            .topic("my-topic")
            .start_message_id(MessageId::new(4, 2))
            .read_compacted(true)
            .name("audit")
            .validate()
            .unwrap();
        assert_eq!(cfg.topic.as_str(), "persistent://public/default/my-topic");
        assert_eq!(cfg.start, StartPosition::After(MessageId::new(4, 2)));
        assert!(cfg.read_compacted);
        assert_eq!(cfg.name, "audit");
    }

    #[test]
    fn generated_name_uses_role_prefix() {
        let cfg = ReaderConfiguration::new()
            .topic("t")
            .start_message_id(StartPosition::Earliest)
            .subscription_role_prefix("billing")
            .validate()
            .unwrap();
        assert!(cfg.name.starts_with("billing-"), "{}", cfg.name);
        assert_eq!(cfg.name.len(), "billing-".len() + 10);

        let cfg = ReaderConfiguration::new()
            .topic("t")
            .start_message_id(StartPosition::Earliest)
            .validate()
            .unwrap();
        assert!(cfg.name.starts_with("reader-"));
    }

    #[test]
    fn parses_from_toml() {
        let cfg = ReaderConfiguration::parse(
            r#"
            topic = "acme/orders/created"
            start = "3:7"
            read_compacted = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.topic.as_deref(), Some("acme/orders/created"));
        assert_eq!(cfg.start_message_id, Some(StartPosition::After(MessageId::new(3, 7))));
        assert!(cfg.read_compacted);

        let cfg = ReaderConfiguration::parse(r#"start_message_id = "latest""#).unwrap();
        assert_eq!(cfg.topic, None);
        assert_eq!(cfg.start_message_id, Some(StartPosition::Latest));
    }

    #[test]
    fn unknown_fields_fail_to_parse() {
        assert!(ReaderConfiguration::parse(r#"topik = "t""#).is_err());
    }
}
