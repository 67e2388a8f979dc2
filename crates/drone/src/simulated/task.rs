use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use ds_client::Task;
use ds_types::{DroneEvent, FlightCommand, VideoPacket};
use tokio::{
    select,
    sync::watch,
    time::{interval, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::*;

use super::SimulatedConfig;
use crate::{link::emit, ChannelLink, ConnectionState};

pub fn create_task(config: SimulatedConfig) -> anyhow::Result<SimulatedTask> {
    if config.packet_size == 0 {
        bail!("simulated packet size must be non-zero");
    }

    if config.packet_interval.is_zero() {
        bail!("simulated packet interval must be non-zero");
    }

    let (cmd_tx, cmd_rx) = flume::bounded(256);
    let (evt_tx, evt_rx) = flume::bounded(256);
    let (video_tx, video_rx) = flume::bounded(1024);
    let (state_tx, state_rx) = watch::channel(ConnectionState::default());

    Ok(SimulatedTask {
        config,
        link: ChannelLink::new(cmd_tx, state_rx),
        cmd_rx,
        evt_tx,
        evt_rx,
        video_tx,
        video_rx,
        state_tx,
    })
}

pub struct SimulatedTask {
    config: SimulatedConfig,
    link: ChannelLink,
    cmd_rx: flume::Receiver<FlightCommand>,
    evt_tx: flume::Sender<DroneEvent>,
    evt_rx: flume::Receiver<DroneEvent>,
    video_tx: flume::Sender<VideoPacket>,
    video_rx: flume::Receiver<VideoPacket>,
    state_tx: watch::Sender<ConnectionState>,
}

impl SimulatedTask {
    pub fn link(&self) -> ChannelLink {
        self.link.clone()
    }

    pub fn events(&self) -> flume::Receiver<DroneEvent> {
        self.evt_rx.clone()
    }

    pub fn video(&self) -> flume::Receiver<VideoPacket> {
        self.video_rx.clone()
    }
}

#[async_trait]
impl Task for SimulatedTask {
    fn name(&self) -> &'static str {
        "drone/simulated"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            config,
            cmd_rx,
            evt_tx,
            video_tx,
            state_tx,
            ..
        } = *self;

        let video = match &config.video_path {
            Some(path) => Some(
                tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read simulated video {}", path.display()))?,
            ),
            None => None,
        };

        let mut state_rx = state_tx.subscribe();

        let control_loop = async {
            sleep(config.connect_delay).await;

            info!("simulated drone connected");
            state_tx.send_modify(|s| s.connected = true);
            emit(&evt_tx, DroneEvent::Connected);

            while let Ok(cmd) = cmd_rx.recv_async().await {
                info!("simulated drone: {cmd}");
                state_tx.send_modify(|s| s.apply(cmd));
            }

            Ok::<_, anyhow::Error>(())
        };

        let video_loop = async {
            let video = match video {
                Some(video) if !video.is_empty() => Bytes::from(video),
                // nothing to replay, so this loop never finishes on its own
                _ => return std::future::pending().await,
            };

            while !state_rx.borrow_and_update().video {
                if state_rx.changed().await.is_err() {
                    return Ok(());
                }
            }

            debug!("replaying {} bytes of simulated video", video.len());

            let mut ticker = interval(config.packet_interval);
            let mut offset = 0;

            loop {
                ticker.tick().await;

                let end = usize::min(offset + config.packet_size, video.len());
                let packet = VideoPacket(video.slice(offset..end));
                offset = if end == video.len() { 0 } else { end };

                if video_tx.send_async(packet).await.is_err() {
                    break;
                }
            }

            Ok::<_, anyhow::Error>(())
        };

        select! {
            _ = cancel.cancelled() => {}
            res = control_loop => { res? }
            res = video_loop => { res? }
        }

        Ok(())
    }
}
