//! Length-prefixed JSON transport over TCP.
//!
//! Exposes the bus request/reply contract to other processes: each request
//! frame is dispatched on the [`EventBus`](crate::bus::EventBus) and answered
//! with one response or error frame.

pub mod client;
pub mod codec;
pub mod server;

pub use client::TransportClient;
pub use server::TransportServer;
