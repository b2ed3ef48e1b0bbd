//! Frame codec and wire messages for the TCP transport.
//!
//! Frame format:
//! ```text
//! ┌──────────┬──────────┬────────────────────────┐
//! │ len (4B) │ type(1B) │     JSON payload       │
//! │ u32 BE   │ u8       │                        │
//! └──────────┴──────────┴────────────────────────┘
//! ```
//! Length = sizeof(type byte) + sizeof(payload), NOT including the 4-byte prefix.

use crate::bus::{FailureKind, ReplyFailure, ReplyOutcome};
use crate::types::codes;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Message type: request from client.
pub const MSG_REQUEST: u8 = 0x01;
/// Message type: successful reply.
pub const MSG_RESPONSE: u8 = 0x02;
/// Message type: failure reply.
pub const MSG_ERROR: u8 = 0xFF;

/// Read one frame from the stream.
///
/// Returns `(msg_type, payload_bytes)`. Returns `None` on clean EOF.
/// `max_frame_bytes` caps the maximum accepted frame size.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let frame_len = u32::from_be_bytes(len_buf);
    if frame_len > max_frame_bytes {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Frame too large: {} bytes", frame_len),
        ));
    }
    if frame_len < 1 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Frame too short: missing type byte",
        ));
    }

    let mut frame_data = vec![0u8; frame_len as usize];
    reader.read_exact(&mut frame_data).await?;
    let payload = frame_data.split_off(1);
    Ok(Some((frame_data[0], payload)))
}

/// Write one frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    let frame_len = u32::try_from(payload.len() + 1).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Frame exceeds u32 length")
    })?;
    writer.write_all(&frame_len.to_be_bytes()).await?;
    writer.write_all(&[msg_type]).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Caller-side deadline in milliseconds, capped by the bus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub body: Value,
}

/// Reply payload: `{id, ok: true, body}` or `{id, ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyFailure>,
}

impl WireResponse {
    pub fn from_outcome(id: impl Into<String>, outcome: ReplyOutcome) -> Self {
        match outcome {
            ReplyOutcome::Success(body) => Self {
                id: id.into(),
                ok: true,
                body: Some(body),
                error: None,
            },
            ReplyOutcome::Failure(failure) => Self {
                id: id.into(),
                ok: false,
                body: None,
                error: Some(failure),
            },
        }
    }

    /// Failure for a frame that never reached the bus.
    pub fn rejected(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_outcome(
            id,
            ReplyOutcome::Failure(ReplyFailure::new(
                codes::BAD_REQUEST,
                FailureKind::RecipientFailure,
                message,
            )),
        )
    }

    /// Frame type this payload travels in.
    pub fn msg_type(&self) -> u8 {
        if self.ok {
            MSG_RESPONSE
        } else {
            MSG_ERROR
        }
    }

    pub fn into_outcome(self) -> ReplyOutcome {
        match (self.ok, self.error) {
            (true, _) => ReplyOutcome::Success(self.body.unwrap_or(Value::Null)),
            (false, Some(failure)) => ReplyOutcome::Failure(failure),
            (false, None) => ReplyOutcome::Failure(ReplyFailure::new(
                codes::INTERNAL,
                FailureKind::RecipientFailure,
                "failure reply without error",
            )),
        }
    }
}
