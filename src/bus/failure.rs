//! Failure translation: handler errors to `(code, message)` replies.

use crate::bus::{ReplyFailure, RequestEnvelope};
use crate::types::Error;
use crate::value;

/// Reply message for failures whose details must not leave the process.
pub const OPAQUE_MESSAGE: &str = "Internal error";

/// Render an error with its whole `source()` chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Message sent back to the caller.
fn reply_message(err: &Error) -> String {
    if !err.is_user_facing() {
        return OPAQUE_MESSAGE.to_string();
    }
    match err {
        Error::NotFound(msg)
        | Error::Forbidden(msg)
        | Error::Unauthorized(msg)
        | Error::Conflict(msg)
        | Error::BadRequest(msg)
        | Error::IllegalState(msg)
        | Error::DuplicateAddress(msg)
        | Error::NoHandlers(msg)
        | Error::Timeout(msg) => msg.clone(),
        Error::Reply(nested) => nested.message.clone(),
        other => other.to_string(),
    }
}

/// Log the untranslated error and build the failure reply for it.
///
/// `redact` lists body keys masked before the request is logged.
pub fn translate(err: &Error, envelope: &RequestEnvelope, redact: &[String]) -> ReplyFailure {
    let code = err.code();
    let body = value::redact(&envelope.body, redact);
    tracing::error!(
        code,
        address = %envelope.address,
        correlation_id = %envelope.correlation_id,
        body = %body,
        "Exception caught while handling message: {}",
        error_chain(err)
    );
    ReplyFailure::recipient(code, reply_message(err))
}
