//! TCP transport client: one request in flight per connection.

use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::bus::{decode_reply, ReplyOutcome};
use crate::codec::Codec;
use crate::transport::codec::{read_frame, write_frame, WireRequest, WireResponse, MSG_REQUEST};
use crate::types::{CorrelationId, Error, Result, TransportConfig};
use crate::value::Value;

#[derive(Debug)]
pub struct TransportClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    next_id: u64,
    max_frame_bytes: u32,
    timeout: Option<Duration>,
}

impl TransportClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            writer,
            next_id: 0,
            max_frame_bytes: TransportConfig::default().max_frame_bytes,
            timeout: None,
        })
    }

    /// Deadline forwarded with every request; the server caps it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send a raw value and wait for the reply.
    pub async fn request_value(
        &mut self,
        address: &str,
        body: Value,
        correlation_id: Option<&CorrelationId>,
    ) -> Result<ReplyOutcome> {
        self.next_id += 1;
        let request = WireRequest {
            id: self.next_id.to_string(),
            address: address.to_string(),
            correlation_id: correlation_id.map(|id| id.to_string()),
            timeout_ms: self
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            body,
        };
        let payload = serde_json::to_vec(&request)?;
        write_frame(&mut self.writer, MSG_REQUEST, &payload).await?;

        let Some((_msg_type, payload)) = read_frame(&mut self.reader, self.max_frame_bytes).await?
        else {
            return Err(Error::internal("connection closed before reply"));
        };
        let response: WireResponse = serde_json::from_slice(&payload)?;
        if response.id != request.id {
            return Err(Error::internal(format!(
                "reply id {} does not match request id {}",
                response.id, request.id
            )));
        }
        tracing::debug!("Reply {} from {}", response.id, address);
        Ok(response.into_outcome())
    }

    /// Typed request. Failure replies surface as `Error::Reply`.
    pub async fn request<A: Codec, R: Codec>(&mut self, address: &str, argument: &A) -> Result<R> {
        let body = argument.encode()?;
        let reply = self.request_value(address, body, None).await?.into_result()?;
        decode_reply(address, &reply)
    }
}
