use std::future::Future;

use async_trait::async_trait;

/// Something the scheduler can deliver inputs to: timer ticks, drone events,
/// video packets. Errors are logged by the scheduler and do not unregister
/// the handler.
#[async_trait]
pub trait Handler<T: Send + 'static>: Send + 'static {
    async fn handle(&mut self, input: T) -> anyhow::Result<()>;
}

/// Input delivered to periodic handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Number of ticks delivered before this one.
    pub count: u64,
}

/// Adapts a closure returning a future into a [`Handler`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler(f)
}

#[async_trait]
impl<T, F, Fut> Handler<T> for FnHandler<F>
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&mut self, input: T) -> anyhow::Result<()> {
        (self.0)(input).await
    }
}
