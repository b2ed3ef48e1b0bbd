//! Type-erased handlers and the typed adapters behind them.

use crate::bus::RequestContext;
use crate::codec::{conform, conform_output, Codec, TypeDescriptor};
use crate::types::Result;
use crate::value::Value;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Handler over raw values, as stored in the address registry.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, body: Value, ctx: RequestContext) -> Result<Value>;
}

/// Non-suspending typed handler: decode, run to completion, encode.
pub(crate) struct SyncHandler<A, R, F> {
    f: F,
    _types: PhantomData<fn(A) -> R>,
}

impl<A, R, F> SyncHandler<A, R, F> {
    pub(crate) fn new(f: F) -> Self {
        Self {
            f,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<A, R, F> Handler for SyncHandler<A, R, F>
where
    A: Codec,
    R: Codec,
    F: Fn(A) -> Result<R> + Send + Sync + 'static,
{
    async fn call(&self, body: Value, _ctx: RequestContext) -> Result<Value> {
        let argument = A::decode(&body)?;
        let result = (self.f)(argument)?;
        Ok(result.encode()?)
    }
}

/// Suspending typed handler.
pub(crate) struct AsyncHandler<A, R, F, Fut> {
    f: F,
    _types: PhantomData<fn(A) -> (R, Fut)>,
}

impl<A, R, F, Fut> AsyncHandler<A, R, F, Fut> {
    pub(crate) fn new(f: F) -> Self {
        Self {
            f,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<A, R, F, Fut> Handler for AsyncHandler<A, R, F, Fut>
where
    A: Codec,
    R: Codec,
    F: Fn(A, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    async fn call(&self, body: Value, ctx: RequestContext) -> Result<Value> {
        let argument = A::decode(&body)?;
        let result = (self.f)(argument, ctx).await?;
        Ok(result.encode()?)
    }
}

/// Suspending handler over raw values with explicit descriptors. The
/// argument is conformed before the call and the result checked after it.
pub(crate) struct RawHandler<F, Fut> {
    f: F,
    argument: TypeDescriptor,
    result: TypeDescriptor,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> RawHandler<F, Fut> {
    pub(crate) fn new(f: F, argument: TypeDescriptor, result: TypeDescriptor) -> Self {
        Self {
            f,
            argument,
            result,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for RawHandler<F, Fut>
where
    F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn call(&self, body: Value, ctx: RequestContext) -> Result<Value> {
        let argument = conform(&body, &self.argument)?;
        let result = (self.f)(argument, ctx).await?;
        Ok(conform_output(&result, &self.result)?)
    }
}
