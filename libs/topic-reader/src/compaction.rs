use reader_api::{CompactionHorizon, Message};

/// Filter applied to the raw stream when the compacted view is requested.
///
/// Within the compacted prefix (ids at or before the horizon) a keyed message
/// is visible only if it is the one the broker retained for its key. Messages
/// past the horizon and keyless messages always pass, in their original order.
///
/// The horizon comes from the source as-is; the view never recomputes it.
#[derive(Debug, Clone, Default)]
pub struct CompactionView {
    horizon: Option<CompactionHorizon>,
}

impl CompactionView {
    /// View that lets every message through.
    pub fn passthrough() -> Self {
        Self { horizon: None }
    }

    /// View over the compacted prefix described by `horizon`. With no horizon
    /// (topic never compacted) the view lets every message through.
    pub fn compacted(horizon: Option<CompactionHorizon>) -> Self {
        Self { horizon }
    }

    pub fn horizon(&self) -> Option<&CompactionHorizon> {
        self.horizon.as_ref()
    }

    pub fn admits(&self, msg: &Message) -> bool {
        let Some(horizon) = &self.horizon else {
            return true;
        };
        if !horizon.covers(msg.id()) {
            return true;
        }
        match msg.key() {
            None => true,
            Some(key) => horizon.retained(key).is_none_or(|kept| kept == msg.id()),
        }
    }
}
