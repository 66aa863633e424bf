//! Handler from an async closure.

use crate::registry::RequestHandler;
use async_trait::async_trait;
use bridge_types::RequestDescriptor;
use std::future::Future;
use std::marker::PhantomData;

/// Wraps `Fn(Req) -> impl Future<Output = anyhow::Result<Resp>>`.
///
/// ```rust,ignore
/// let handler = SimpleHandler::new(FetchPrice, |req| async move {
///     Ok(FetchPriceResponse { price: lookup(&req.name).await? })
/// });
/// ```
pub struct SimpleHandler<D, F> {
    func: F,
    _descriptor: PhantomData<fn() -> D>,
}

impl<D, F, Fut> SimpleHandler<D, F>
where
    D: RequestDescriptor,
    F: Fn(D::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<D::Response>> + Send + 'static,
{
    pub fn new(_descriptor: D, func: F) -> Self {
        Self {
            func,
            _descriptor: PhantomData,
        }
    }
}

#[async_trait]
impl<D, F, Fut> RequestHandler<D> for SimpleHandler<D, F>
where
    D: RequestDescriptor,
    F: Fn(D::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<D::Response>> + Send + 'static,
{
    async fn handle(&self, request: D::Request) -> anyhow::Result<D::Response> {
        (self.func)(request).await
    }
}
