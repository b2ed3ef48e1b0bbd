//! Event bus: address dispatch with typed request/reply.
//!
//! Components bind handlers to symbolic addresses during an explicit start-up
//! pass ([`BusBuilder`]); the resulting [`EventBus`] routes every envelope to
//! exactly one handler and always answers with a [`ReplyOutcome`]:
//!   - **Routing miss**: `Failure(NoHandlers, 404)`
//!   - **Handler error**: translated to `Failure(RecipientFailure, code)`
//!   - **Caller deadline**: `Failure(Timeout, 503)`
//!
//! Every request carries a correlation id. Handlers get it through their
//! [`RequestContext`], and nested requests made through the context inherit it.

mod component;
mod context;
mod envelope;
mod failure;
mod handler;
mod registry;
mod worker;

pub use component::{Component, Registrar};
pub use context::RequestContext;
pub use envelope::{
    new_reply_address, DeliveryOptions, FailureKind, ReplyFailure, ReplyOutcome,
    RequestEnvelope, REPLY_PREFIX,
};
pub use failure::{error_chain, translate, OPAQUE_MESSAGE};
pub use handler::Handler;
pub use registry::{AddressBinding, AddressRegistry};
pub use worker::WorkerPool;

use crate::codec::Codec;
use crate::observability;
use crate::types::{Config, CorrelationId, Result};
use crate::value::Value;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

// =============================================================================
// Interceptors
// =============================================================================

/// Observer of every dispatched envelope.
pub trait Interceptor: Send + Sync + 'static {
    fn on_request(&self, _envelope: &RequestEnvelope) {}

    fn on_reply(&self, _envelope: &RequestEnvelope, _outcome: &ReplyOutcome) {}
}

/// Logs each message as `address[reply]` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceInterceptor;

impl Interceptor for TraceInterceptor {
    fn on_request(&self, envelope: &RequestEnvelope) {
        tracing::debug!(
            correlation_id = %envelope.correlation_id,
            "Message to {}[{}]",
            envelope.address,
            envelope.reply_address.as_deref().unwrap_or("-")
        );
    }

    fn on_reply(&self, envelope: &RequestEnvelope, outcome: &ReplyOutcome) {
        match outcome {
            ReplyOutcome::Success(_) => tracing::debug!(
                correlation_id = %envelope.correlation_id,
                "Reply from {}: ok",
                envelope.address
            ),
            ReplyOutcome::Failure(failure) => tracing::debug!(
                correlation_id = %envelope.correlation_id,
                "Reply from {}: {}",
                envelope.address,
                failure
            ),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Statistics about bus usage.
#[derive(Debug, Default, Clone, PartialEq, Eq, crate::codec::Codec)]
pub struct BusStats {
    pub registered_addresses: u64,
    pub requests_dispatched: u64,
    pub replies_succeeded: u64,
    pub replies_failed: u64,
    pub no_handlers: u64,
    pub timeouts: u64,
}

#[derive(Debug, Default)]
struct BusCounters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    no_handlers: AtomicU64,
    timeouts: AtomicU64,
}

// =============================================================================
// Builder
// =============================================================================

/// Runs the registration pass and produces an [`EventBus`].
pub struct BusBuilder {
    config: Config,
    registry: AddressRegistry,
    components: Vec<Arc<dyn Component>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl BusBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            registry: AddressRegistry::new(),
            components: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    /// Start from a registry filled by hand.
    pub fn with_registry(mut self, registry: AddressRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn component<C: Component>(self, component: C) -> Self {
        self.shared_component(Arc::new(component))
    }

    pub fn shared_component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    pub fn interceptor<I: Interceptor>(self, interceptor: I) -> Self {
        self.shared_interceptor(Arc::new(interceptor))
    }

    pub fn shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Register every component in order. The first registration error
    /// (duplicate address, non-encodable type) aborts start-up.
    pub fn build(self) -> Result<EventBus> {
        let BusBuilder {
            config,
            mut registry,
            components,
            interceptors,
        } = self;

        for component in components {
            let name = component.name().to_string();
            let redact: Vec<&str> = component.redacted_fields().to_vec();
            let mut registrar = Registrar::new(&mut registry, &name, &redact);
            Arc::clone(&component).register(&mut registrar)?;
            tracing::info!(
                "Component {} registered {} addresses",
                name,
                registrar.registered()
            );
        }

        tracing::info!(
            "Event bus ready (addresses={}, worker_pool={})",
            registry.len(),
            config.worker_pool.size
        );

        Ok(EventBus {
            inner: Arc::new(BusInner {
                workers: WorkerPool::new(config.worker_pool.size),
                registry,
                config,
                interceptors,
                shutdown: CancellationToken::new(),
                counters: BusCounters::default(),
            }),
        })
    }
}

impl fmt::Debug for BusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusBuilder")
            .field("registry", &self.registry)
            .field("components", &self.components.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

// =============================================================================
// EventBus
// =============================================================================

struct BusInner {
    registry: AddressRegistry,
    workers: WorkerPool,
    config: Config,
    interceptors: Vec<Arc<dyn Interceptor>>,
    shutdown: CancellationToken,
    counters: BusCounters,
}

/// Handle to the running bus. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("addresses", &self.inner.registry.len())
            .field("workers", &self.inner.workers)
            .field("interceptors", &self.inner.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn builder(config: &Config) -> BusBuilder {
        BusBuilder::new(config)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Route one envelope to its handler and produce the reply.
    ///
    /// Never fails: routing misses and handler errors come back as
    /// `ReplyOutcome::Failure`. No deadline is applied here.
    pub async fn dispatch(&self, envelope: RequestEnvelope) -> ReplyOutcome {
        self.dispatch_ref(&envelope).await
    }

    async fn dispatch_ref(&self, envelope: &RequestEnvelope) -> ReplyOutcome {
        let counters = &self.inner.counters;
        counters.dispatched.fetch_add(1, Ordering::Relaxed);
        for interceptor in &self.inner.interceptors {
            interceptor.on_request(envelope);
        }

        let outcome = match self.inner.registry.get(&envelope.address) {
            Some(binding) => self.invoke(binding.clone(), envelope).await,
            None => {
                counters.no_handlers.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("No handlers for address: {}", envelope.address);
                ReplyOutcome::Failure(ReplyFailure::no_handlers(&envelope.address))
            }
        };

        self.finish(envelope, outcome)
    }

    fn finish(&self, envelope: &RequestEnvelope, outcome: ReplyOutcome) -> ReplyOutcome {
        let counters = &self.inner.counters;
        match &outcome {
            ReplyOutcome::Success(_) => counters.succeeded.fetch_add(1, Ordering::Relaxed),
            ReplyOutcome::Failure(_) => counters.failed.fetch_add(1, Ordering::Relaxed),
        };
        for interceptor in &self.inner.interceptors {
            interceptor.on_reply(envelope, &outcome);
        }
        outcome
    }

    async fn invoke(&self, binding: AddressBinding, envelope: &RequestEnvelope) -> ReplyOutcome {
        let span =
            observability::request_span(envelope.correlation_id.as_str(), &envelope.address);
        let ctx = RequestContext::new(
            envelope.correlation_id.clone(),
            envelope.address.clone(),
            self.clone(),
            self.inner.shutdown.child_token(),
        );
        let handler = Arc::clone(&binding.handler);
        let body = envelope.body.clone();

        let result = if binding.suspending {
            let task = tokio::spawn(
                async move { handler.call(body, ctx).await }.instrument(span.clone()),
            );
            match task.await {
                Ok(result) => result,
                Err(join_error) => Err(crate::types::Error::internal(format!(
                    "handler task for {} failed: {}",
                    envelope.address, join_error
                ))),
            }
        } else {
            let call = AssertUnwindSafe(async move { handler.call(body, ctx).await })
                .catch_unwind()
                .instrument(span.clone());
            match call.await {
                Ok(result) => result,
                Err(_) => Err(crate::types::Error::internal(format!(
                    "handler for {} panicked",
                    envelope.address
                ))),
            }
        };

        match result {
            Ok(value) => ReplyOutcome::Success(value),
            Err(err) => {
                let mut redact = binding.redact;
                redact.extend(self.inner.config.logging.redact_fields.iter().cloned());
                ReplyOutcome::Failure(span.in_scope(|| translate(&err, envelope, &redact)))
            }
        }
    }

    // =========================================================================
    // Request/Reply
    // =========================================================================

    /// Send a raw value and wait for the reply, applying the caller-side
    /// deadline. On expiry the handler keeps running and its reply is dropped;
    /// interceptors see the timeout failure as the reply.
    pub async fn request_value(
        &self,
        address: &str,
        body: Value,
        options: DeliveryOptions,
    ) -> ReplyOutcome {
        let correlation_id = options
            .correlation_id
            .unwrap_or_else(CorrelationId::generate);
        let deadline = self.effective_timeout(options.timeout);
        let envelope = RequestEnvelope::request(address, body, correlation_id);

        match tokio::time::timeout(deadline, self.dispatch_ref(&envelope)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.inner.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Request to {} timed out after {:?}", address, deadline);
                let failure = ReplyFailure::timeout(address, deadline);
                self.finish(&envelope, ReplyOutcome::Failure(failure))
            }
        }
    }

    /// Typed request with a fresh correlation id and the default deadline.
    pub async fn request<A: Codec, R: Codec>(&self, address: &str, argument: &A) -> Result<R> {
        self.request_with(address, argument, DeliveryOptions::default())
            .await
    }

    /// Typed request. Failure replies surface as `Error::Reply`, keeping
    /// their code.
    pub async fn request_with<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
        options: DeliveryOptions,
    ) -> Result<R> {
        let body = argument.encode()?;
        let reply = self.request_value(address, body, options).await.into_result()?;
        decode_reply(address, &reply)
    }

    /// Typed request whose reply is an array of `R`.
    pub async fn request_collect<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
    ) -> Result<Vec<R>> {
        self.request_with(address, argument, DeliveryOptions::default())
            .await
    }

    /// Typed request that yields `None` when nobody listens on `address`.
    pub async fn try_request<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
    ) -> Result<Option<R>> {
        self.try_request_with(address, argument, DeliveryOptions::default())
            .await
    }

    pub async fn try_request_with<A: Codec, R: Codec>(
        &self,
        address: &str,
        argument: &A,
        options: DeliveryOptions,
    ) -> Result<Option<R>> {
        let body = argument.encode()?;
        match self.request_value(address, body, options).await {
            ReplyOutcome::Success(reply) => decode_reply(address, &reply).map(Some),
            ReplyOutcome::Failure(failure) if failure.kind == FailureKind::NoHandlers => Ok(None),
            ReplyOutcome::Failure(failure) => Err(failure.into()),
        }
    }

    /// One-way message: dispatched in the background, reply discarded,
    /// failures logged.
    pub fn send<A: Codec>(&self, address: &str, argument: &A) -> Result<()> {
        self.send_with(address, argument, DeliveryOptions::default())
    }

    pub fn send_with<A: Codec>(
        &self,
        address: &str,
        argument: &A,
        options: DeliveryOptions,
    ) -> Result<()> {
        let body = argument.encode()?;
        let correlation_id = options
            .correlation_id
            .unwrap_or_else(CorrelationId::generate);
        let envelope = RequestEnvelope::one_way(address, body, correlation_id);
        let bus = self.clone();
        tokio::spawn(
            async move {
                let address = envelope.address.clone();
                if let ReplyOutcome::Failure(failure) = bus.dispatch(envelope).await {
                    tracing::warn!("One-way message to {} failed: {}", address, failure);
                }
            }
            .instrument(tracing::Span::current()),
        );
        Ok(())
    }

    fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        let bus = &self.inner.config.bus;
        requested
            .unwrap_or(bus.request_timeout)
            .min(bus.max_request_timeout)
    }

    // =========================================================================
    // Introspection & lifecycle
    // =========================================================================

    /// Bound addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        self.inner.registry.addresses()
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.inner.registry
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.inner.workers
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> BusStats {
        let counters = &self.inner.counters;
        BusStats {
            registered_addresses: self.inner.registry.len() as u64,
            requests_dispatched: counters.dispatched.load(Ordering::Relaxed),
            replies_succeeded: counters.succeeded.load(Ordering::Relaxed),
            replies_failed: counters.failed.load(Ordering::Relaxed),
            no_handlers: counters.no_handlers.load(Ordering::Relaxed),
            timeouts: counters.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Cancel the contexts of all running and future requests.
    pub fn shutdown(&self) {
        tracing::info!("Event bus shutting down");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// Decode a success reply. A reply of the wrong shape is an internal error
/// (500), never a caller-side decode failure.
pub fn decode_reply<R: Codec>(address: &str, reply: &Value) -> Result<R> {
    R::decode(reply).map_err(|e| {
        crate::types::Error::internal(format!("reply from {address} does not decode: {e}"))
    })
}

// =============================================================================
// Tests
// =============================================================================
