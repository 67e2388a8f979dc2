use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use ds_types::{DroneEvent, FlightCommand};
use tokio::sync::watch;
use tracing::*;

/// The command side of a live session with a drone. Commands are
/// fire-and-forget: `send` returns once the command is queued for the drone,
/// and nothing tracks whether the drone carried it out.
#[async_trait]
pub trait DroneLink: Send + Sync + 'static {
    async fn send(&self, command: FlightCommand) -> anyhow::Result<()>;

    fn state(&self) -> ConnectionState;
}

#[async_trait]
impl<L: DroneLink + ?Sized> DroneLink for Arc<L> {
    async fn send(&self, command: FlightCommand) -> anyhow::Result<()> {
        (**self).send(command).await
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub video: bool,
    pub encoder_rate: Option<u8>,
}

impl ConnectionState {
    /// Updates the state to reflect that `command` was issued.
    pub fn apply(&mut self, command: FlightCommand) {
        match command {
            FlightCommand::SetVideoEncoderRate(rate) => self.encoder_rate = Some(rate),
            FlightCommand::StartVideo => self.video = true,
            _ => {}
        }
    }
}

/// A [`DroneLink`] that queues commands for a drone task to deliver.
#[derive(Clone)]
pub struct ChannelLink {
    cmd_tx: flume::Sender<FlightCommand>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ChannelLink {
    pub(crate) fn new(
        cmd_tx: flume::Sender<FlightCommand>,
        state_rx: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self { cmd_tx, state_rx }
    }
}

#[async_trait]
impl DroneLink for ChannelLink {
    async fn send(&self, command: FlightCommand) -> anyhow::Result<()> {
        trace!("queueing command '{command}'");

        self.cmd_tx
            .send_async(command)
            .await
            .map_err(|_| anyhow!("drone task is not running, dropped command '{command}'"))
    }

    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }
}

/// Publishes a control event without blocking the drone task. Events are
/// rare, so a full channel means nobody is listening.
pub(crate) fn emit(evt_tx: &flume::Sender<DroneEvent>, event: DroneEvent) {
    debug!("drone event: {event:?}");

    if let Err(err) = evt_tx.try_send(event) {
        warn!("dropping drone event: {err}");
    }
}
