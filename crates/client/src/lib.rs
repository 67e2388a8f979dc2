use async_trait::async_trait;

use tokio_util::sync::CancellationToken;

/// A long-running component of the drone system. Every task is started once
/// by the binary and runs until it finishes, fails, or the shared
/// cancellation token is cancelled.
#[async_trait]
pub trait Task {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()>;
}
