use async_trait::async_trait;
use ds_drone::DroneLink;
use ds_types::FlightCommand;
use tracing::*;

/// Acts on the text the inference service returned for a frame.
#[async_trait]
pub trait CommandDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, response: &str) -> anyhow::Result<()>;
}

/// Logs inference replies and otherwise ignores them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

#[async_trait]
impl CommandDispatcher for NoopDispatcher {
    async fn dispatch(&self, response: &str) -> anyhow::Result<()> {
        debug!("inference reply '{}' not dispatched", response.trim());
        Ok(())
    }
}

/// Treats each reply as a flight command in the drone's text syntax
/// (`"cw 30"`, `"land"`) and sends it over the link. Replies that don't
/// parse are ignored.
pub struct LinkDispatcher<L> {
    link: L,
}

impl<L: DroneLink> LinkDispatcher<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }
}

#[async_trait]
impl<L: DroneLink> CommandDispatcher for LinkDispatcher<L> {
    async fn dispatch(&self, response: &str) -> anyhow::Result<()> {
        match response.parse::<FlightCommand>() {
            Ok(command) => {
                info!("inference requested '{command}'");
                self.link.send(command).await
            }
            Err(err) => {
                debug!("ignoring inference reply '{}': {err}", response.trim());
                Ok(())
            }
        }
    }
}
