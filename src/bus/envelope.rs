//! Envelopes, reply outcomes and delivery options.

use crate::types::{codes, CorrelationId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Prefix of generated reply addresses.
pub const REPLY_PREFIX: &str = "__reply.";

/// Fresh opaque reply address.
pub fn new_reply_address() -> String {
    format!("{REPLY_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// One in-flight request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub address: String,
    pub body: Value,
    pub correlation_id: CorrelationId,
    /// Set when the sender awaits a reply.
    pub reply_address: Option<String>,
}

impl RequestEnvelope {
    /// Envelope whose reply is awaited.
    pub fn request(address: impl Into<String>, body: Value, correlation_id: CorrelationId) -> Self {
        Self {
            address: address.into(),
            body,
            correlation_id,
            reply_address: Some(new_reply_address()),
        }
    }

    /// Fire-and-forget envelope.
    pub fn one_way(address: impl Into<String>, body: Value, correlation_id: CorrelationId) -> Self {
        Self {
            address: address.into(),
            body,
            correlation_id,
            reply_address: None,
        }
    }

    pub fn expects_reply(&self) -> bool {
        self.reply_address.is_some()
    }
}

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    NoHandlers,
    Timeout,
    RecipientFailure,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NoHandlers => "NO_HANDLERS",
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::RecipientFailure => "RECIPIENT_FAILURE",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure half of a reply: `(code, kind, message)`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} ({code}): {message}")]
pub struct ReplyFailure {
    pub code: i32,
    pub kind: FailureKind,
    pub message: String,
}

impl ReplyFailure {
    pub fn new(code: i32, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
        }
    }

    pub fn no_handlers(address: &str) -> Self {
        Self::new(
            codes::NOT_FOUND,
            FailureKind::NoHandlers,
            format!("No handlers for address {address}"),
        )
    }

    pub fn timeout(address: &str, after: Duration) -> Self {
        Self::new(
            codes::TIMED_OUT,
            FailureKind::Timeout,
            format!("Timed out after {after:?} waiting for a reply from {address}"),
        )
    }

    pub fn recipient(code: i32, message: impl Into<String>) -> Self {
        Self::new(code, FailureKind::RecipientFailure, message)
    }
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Success(Value),
    Failure(ReplyFailure),
}

impl ReplyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReplyOutcome::Success(_))
    }

    pub fn failure(&self) -> Option<&ReplyFailure> {
        match self {
            ReplyOutcome::Failure(failure) => Some(failure),
            ReplyOutcome::Success(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Value, ReplyFailure> {
        match self {
            ReplyOutcome::Success(value) => Ok(value),
            ReplyOutcome::Failure(failure) => Err(failure),
        }
    }
}

/// Per-request delivery overrides.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOptions {
    /// Correlation id to send with; generated (or inherited) when unset.
    pub correlation_id: Option<CorrelationId>,
    /// Caller-side deadline; the configured default applies when unset.
    pub timeout: Option<Duration>,
}

impl DeliveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_addresses_are_unique() {
        let a = new_reply_address();
        let b = new_reply_address();
        assert!(a.starts_with(REPLY_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn test_one_way_has_no_reply_address() {
        let id = CorrelationId::generate();
        let envelope = RequestEnvelope::one_way("a", Value::Null, id.clone());
        assert!(!envelope.expects_reply());
        assert!(RequestEnvelope::request("a", Value::Null, id).expects_reply());
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(ReplyFailure::no_handlers("x").code, 404);
        let timeout = ReplyFailure::timeout("x", Duration::from_millis(1500));
        assert_eq!(timeout.code, 503);
        assert_eq!(timeout.kind, FailureKind::Timeout);
        assert!(timeout.message.contains("1.5s"));
    }

    #[test]
    fn test_into_result() {
        let failure = ReplyFailure::recipient(409, "taken");
        let outcome = ReplyOutcome::Failure(failure.clone());
        assert!(!outcome.is_success());
        assert_eq!(outcome.into_result(), Err(failure));
    }
}
