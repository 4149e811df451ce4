use std::fmt;

/// Category of a message source failure.
///
/// The reader uses the kind to classify the failure for its caller
/// (connect-time vs. runtime, retryable vs. terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Broker unreachable, hostname unresolvable, topic lookup failed.
    Connect,
    /// A deadline elapsed before a message became available.
    Timeout,
    /// The handle was released; no further reads are possible.
    Released,
    /// Any other transport or I/O failure after the handle was established.
    Io,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceErrorKind::Connect => f.write_str("connect"),
            SourceErrorKind::Timeout => f.write_str("timeout"),
            SourceErrorKind::Released => f.write_str("released"),
            SourceErrorKind::Io => f.write_str("io"),
        }
    }
}

/// Error returned by every `MessageSource` / `SourceHandle` method.
#[derive(Debug, Clone)]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn connect(msg: impl Into<String>) -> Self {
        Self { kind: SourceErrorKind::Connect, message: msg.into() }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self { kind: SourceErrorKind::Timeout, message: msg.into() }
    }

    pub fn released(msg: impl Into<String>) -> Self {
        Self { kind: SourceErrorKind::Released, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: SourceErrorKind::Io, message: msg.into() }
    }

    pub fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving the original kind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
