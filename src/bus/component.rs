//! Components and the start-up registration pass.

use crate::bus::handler::{AsyncHandler, RawHandler, SyncHandler};
use crate::bus::{AddressBinding, AddressRegistry, Handler, RequestContext};
use crate::codec::{Codec, TypeDescriptor};
use crate::types::Result;
use crate::value::Value;
use std::future::Future;
use std::sync::Arc;

/// A unit of handlers registered together at start-up.
///
/// Registration is an explicit pass: the bus builder hands each component a
/// [`Registrar`] once, and the component binds every address it serves,
/// including addresses computed from its configuration.
pub trait Component: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Keys masked in the bodies of every request this component handles.
    fn redacted_fields(&self) -> &[&str] {
        &[]
    }

    fn register(self: Arc<Self>, registrar: &mut Registrar<'_>) -> Result<()>;
}

/// Registration handle given to one component.
#[derive(Debug)]
pub struct Registrar<'a> {
    registry: &'a mut AddressRegistry,
    component: String,
    redact: Vec<String>,
    registered: usize,
}

impl<'a> Registrar<'a> {
    pub fn new(registry: &'a mut AddressRegistry, component: &str, redact: &[&str]) -> Self {
        Self {
            registry,
            component: component.to_string(),
            redact: redact.iter().map(|s| (*s).to_string()).collect(),
            registered: 0,
        }
    }

    /// Bind a non-suspending handler. It runs to completion on the
    /// dispatching task; blocking work belongs in a suspending handler that
    /// uses the worker pool.
    pub fn handle<A, R, F>(&mut self, address: impl Into<String>, f: F) -> Result<()>
    where
        A: Codec,
        R: Codec,
        F: Fn(A) -> Result<R> + Send + Sync + 'static,
    {
        let argument = self.registry.descriptors().get_or_resolve::<A>();
        let result = self.registry.descriptors().get_or_resolve::<R>();
        self.bind(
            address.into(),
            Arc::new(SyncHandler::<A, R, F>::new(f)),
            argument,
            result,
            false,
            A::redacted_fields(),
        )
    }

    /// Bind a suspending handler. It runs as its own task and may await
    /// nested requests or worker-pool jobs through its context.
    pub fn handle_async<A, R, F, Fut>(&mut self, address: impl Into<String>, f: F) -> Result<()>
    where
        A: Codec,
        R: Codec,
        F: Fn(A, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let argument = self.registry.descriptors().get_or_resolve::<A>();
        let result = self.registry.descriptors().get_or_resolve::<R>();
        self.bind(
            address.into(),
            Arc::new(AsyncHandler::<A, R, F, Fut>::new(f)),
            argument,
            result,
            true,
            A::redacted_fields(),
        )
    }

    /// Bind a suspending handler over raw values with explicit descriptors.
    pub fn handle_raw<F, Fut>(
        &mut self,
        address: impl Into<String>,
        argument: TypeDescriptor,
        result: TypeDescriptor,
        f: F,
    ) -> Result<()>
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let argument = argument.resolved();
        let result = result.resolved();
        let handler = RawHandler::new(f, argument.clone(), result.clone());
        self.bind(
            address.into(),
            Arc::new(handler),
            Arc::new(argument),
            Arc::new(result),
            true,
            &[],
        )
    }

    fn bind(
        &mut self,
        address: String,
        handler: Arc<dyn Handler>,
        argument: Arc<TypeDescriptor>,
        result: Arc<TypeDescriptor>,
        suspending: bool,
        type_redact: &[&str],
    ) -> Result<()> {
        let mut redact = self.redact.clone();
        for field in type_redact {
            if !redact.iter().any(|f| f == field) {
                redact.push((*field).to_string());
            }
        }

        let mut binding = AddressBinding::new(address, handler, argument, result, suspending);
        binding.redact = redact;
        binding.component = self.component.clone();

        tracing::info!(
            component = %self.component,
            address = %binding.address,
            argument = %binding.argument,
            result = %binding.result,
            suspending,
            "Registering handler"
        );
        self.registry.register(binding)?;
        self.registered += 1;
        Ok(())
    }

    /// Name of the component being registered.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Addresses bound through this registrar so far.
    pub fn registered(&self) -> usize {
        self.registered
    }
}
