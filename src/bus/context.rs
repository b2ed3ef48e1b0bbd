//! Per-request execution context.

use crate::bus::{DeliveryOptions, EventBus};
use crate::codec::Codec;
use crate::types::{CorrelationId, Result};
use tokio_util::sync::CancellationToken;

/// Logical context of one inbound request.
///
/// Passed by value into suspending handlers and carried across every await,
/// so nested requests issued through it inherit the inbound correlation id
/// no matter which thread the handler resumes on.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    address: String,
    bus: EventBus,
    cancel: CancellationToken,
}

impl RequestContext {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        address: String,
        bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            correlation_id,
            address,
            bus,
            cancel,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Address the inbound request was sent to.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Context whose nested requests carry `correlation_id` instead.
    pub fn with_correlation_id(&self, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            ..self.clone()
        }
    }

    /// Cancelled when the bus shuts down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn inherit(&self, mut options: DeliveryOptions) -> DeliveryOptions {
        if options.correlation_id.is_none() {
            options.correlation_id = Some(self.correlation_id.clone());
        }
        options
    }

    /// Nested request carrying this request's correlation id.
    pub async fn request<A: Codec, R: Codec>(&self, address: &str, argument: &A) -> Result<R> {
        self.request_with(address, argument, DeliveryOptions::default())
            .await
    }

    /// Nested request; an explicit correlation id in `options` wins.
    pub async fn request_with<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
        options: DeliveryOptions,
    ) -> Result<R> {
        self.bus
            .request_with(address, argument, self.inherit(options))
            .await
    }

    /// Nested request whose reply is an array.
    pub async fn request_collect<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
    ) -> Result<Vec<R>> {
        self.request_with(address, argument, DeliveryOptions::default())
            .await
    }

    /// Nested request that yields `None` when nobody listens on `address`.
    pub async fn try_request<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
    ) -> Result<Option<R>> {
        self.bus
            .try_request_with(address, argument, self.inherit(DeliveryOptions::default()))
            .await
    }

    /// Nested one-way message.
    pub fn send<A: Codec>(&self, address: &str, argument: &A) -> Result<()> {
        self.bus
            .send_with(address, argument, self.inherit(DeliveryOptions::default()))
    }

    /// Run blocking work on the bounded worker pool, inside this request's
    /// span.
    pub async fn run_blocking<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.bus.workers().run(job).await
    }
}
