//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Every
//! variant maps to a numeric reply code via [`Error::code`], which is what a
//! failure reply carries across the bus.

use crate::bus::ReplyFailure;
use crate::codec::{DecodeError, DescriptorError, EncodeError};
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric reply codes.
pub mod codes {
    pub const BAD_REQUEST: i32 = 400;
    pub const UNAUTHORIZED: i32 = 401;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const INTERNAL: i32 = 500;
    pub const TIMED_OUT: i32 = 503;
}

/// Main error enum for verticore.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested entity does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to perform the operation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Caller is not authenticated (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Operation conflicts with current state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Illegal argument supplied by the caller (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Contract violation on the handler's state (400).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Inbound value does not match the expected type (400).
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Handler produced a value that does not match its declared result (500).
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Descriptor cannot be used for encoding or decoding.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Two handlers registered for one address.
    #[error("duplicate address: {0}")]
    DuplicateAddress(String),

    /// Nobody is registered for the address (404).
    #[error("no handlers for address: {0}")]
    NoHandlers(String),

    /// Caller-side deadline elapsed (503).
    #[error("timeout: {0}")]
    Timeout(String),

    /// A nested request failed; its code propagates unchanged.
    #[error(transparent)]
    Reply(#[from] ReplyFailure),

    /// Internal errors (500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Anything else raised by a handler (500).
    #[error(transparent)]
    Unexpected(Box<dyn std::error::Error + Send + Sync>),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Reply code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::NotFound(_) | Error::NoHandlers(_) => codes::NOT_FOUND,
            Error::Forbidden(_) => codes::FORBIDDEN,
            Error::Unauthorized(_) => codes::UNAUTHORIZED,
            Error::Conflict(_) => codes::CONFLICT,
            Error::BadRequest(_) | Error::IllegalState(_) | Error::Decode(_) => codes::BAD_REQUEST,
            Error::Timeout(_) => codes::TIMED_OUT,
            Error::Reply(failure) => failure.code,
            Error::Encode(_)
            | Error::Descriptor(_)
            | Error::DuplicateAddress(_)
            | Error::Internal(_)
            | Error::Unexpected(_)
            | Error::Serialization(_)
            | Error::Io(_) => codes::INTERNAL,
        }
    }

    /// Whether the message may be shown to the caller verbatim.
    ///
    /// Encode failures and unclassified errors describe server internals and
    /// are replaced by an opaque message.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Error::Encode(_)
                | Error::Descriptor(_)
                | Error::Internal(_)
                | Error::Unexpected(_)
                | Error::Serialization(_)
                | Error::Io(_)
        )
    }
}

// Convenience constructors
impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn unexpected(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unexpected(Box::new(err))
    }
}
