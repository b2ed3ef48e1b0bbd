//! TCP transport server: accept loop and per-connection handler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::bus::{DeliveryOptions, EventBus};
use crate::transport::codec::{read_frame, write_frame, WireRequest, WireResponse, MSG_REQUEST};
use crate::types::{CorrelationId, TransportConfig};

fn encode_json<T: serde::Serialize>(value: &T) -> std::io::Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        tracing::error!("JSON encoding failed: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
    })
}

/// Transport server in front of an [`EventBus`].
#[derive(Debug)]
pub struct TransportServer {
    bus: EventBus,
    cancel: CancellationToken,
    config: TransportConfig,
}

impl TransportServer {
    pub fn new(bus: EventBus, config: TransportConfig) -> Self {
        Self {
            bus,
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Bind `listen_addr` and serve until cancelled.
    pub async fn serve(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        self.serve_with(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_with(&self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let conn_semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        tracing::info!(
            "Transport listening on {} (max_connections={})",
            addr,
            self.config.max_connections,
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Transport shutting down");
                    break;
                }
                accept = listener.accept() => {
                    let (stream, peer) = accept?;

                    let permit = match Arc::clone(&conn_semaphore).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!(
                                "Connection from {} rejected: at max_connections ({})",
                                peer,
                                self.config.max_connections,
                            );
                            drop(stream);
                            continue;
                        }
                    };

                    tracing::debug!(
                        "Connection from {} (active={})",
                        peer,
                        self.config.max_connections - conn_semaphore.available_permits(),
                    );
                    let bus = self.bus.clone();
                    let cancel = self.cancel.clone();
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, bus, cancel, config, permit).await {
                            tracing::warn!("Connection from {} error: {}", peer, e);
                        }
                    });
                }
            }
        }
        Ok(())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled by [`TransportServer::shutdown`].
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Read frames, dispatch each request on the bus, write the reply.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    bus: EventBus,
    cancel: CancellationToken,
    config: TransportConfig,
    _permit: OwnedSemaphorePermit,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame_result = tokio::time::timeout(config.read_timeout, read_frame(&mut reader, config.max_frame_bytes)) => {
                let (msg_type, payload) = match frame_result {
                    Err(_elapsed) => {
                        tracing::debug!("Read timeout ({:?}) from {}, dropping connection", config.read_timeout, peer);
                        break;
                    }
                    Ok(result) => match result? {
                        Some(frame) => frame,
                        None => break,
                    },
                };

                let response = if msg_type != MSG_REQUEST {
                    WireResponse::rejected("", format!("Unexpected message type: 0x{:02X}", msg_type))
                } else {
                    match serde_json::from_slice::<WireRequest>(&payload) {
                        Ok(request) => dispatch(&bus, request).await,
                        Err(e) => WireResponse::rejected("", format!("Invalid request: {}", e)),
                    }
                };

                let encoded = encode_json(&response)?;
                timed_write(&mut writer, response.msg_type(), &encoded, config.write_timeout).await?;
            }
        }
    }

    Ok(())
}

async fn dispatch(bus: &EventBus, request: WireRequest) -> WireResponse {
    let mut options = DeliveryOptions::default();
    if let Some(id) = request.correlation_id {
        match CorrelationId::from_string(id) {
            Ok(id) => options = options.with_correlation_id(id),
            Err(reason) => return WireResponse::rejected(request.id, reason),
        }
    }
    if let Some(ms) = request.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    let outcome = bus
        .request_value(&request.address, request.body, options)
        .await;
    WireResponse::from_outcome(request.id, outcome)
}

/// Write a frame with a timeout; slow consumers are dropped.
async fn timed_write<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
    timeout: Duration,
) -> std::io::Result<()> {
    tokio::time::timeout(timeout, write_frame(writer, msg_type, payload))
        .await
        .map_err(|_| {
            tracing::warn!("Write timeout ({:?}), dropping connection", timeout);
            std::io::Error::new(std::io::ErrorKind::TimedOut, "write timeout")
        })?
}
