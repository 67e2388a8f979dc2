use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use ds_async_util::retry_async;
use ds_client::Task;
use ds_types::{DroneEvent, FlightCommand, VideoPacket};
use tokio::{
    net::UdpSocket,
    select,
    sync::watch,
    time::{sleep, sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::*;

use super::{interface::TelloInterface, TelloConfig};
use crate::{link::emit, ChannelLink, ConnectionState};

/// Video datagrams from the drone are at most 1460 bytes; leave headroom.
const MAX_VIDEO_DATAGRAM: usize = 2048;

const VIDEO_ERROR_BACKOFF: Duration = Duration::from_millis(10);

pub fn create_task(config: TelloConfig) -> anyhow::Result<TelloTask> {
    let (cmd_tx, cmd_rx) = flume::bounded(256);
    let (evt_tx, evt_rx) = flume::bounded(256);
    let (video_tx, video_rx) = flume::bounded(1024);
    let (state_tx, state_rx) = watch::channel(ConnectionState::default());

    Ok(TelloTask {
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

/// Owns the sockets to a Tello drone. Relays queued commands to the drone,
/// watches its replies, and relays its video datagrams.
pub struct TelloTask {
    config: TelloConfig,
    link: ChannelLink,
    cmd_rx: flume::Receiver<FlightCommand>,
    evt_tx: flume::Sender<DroneEvent>,
    evt_rx: flume::Receiver<DroneEvent>,
    video_tx: flume::Sender<VideoPacket>,
    video_rx: flume::Receiver<VideoPacket>,
    state_tx: watch::Sender<ConnectionState>,
}

impl TelloTask {
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
impl Task for TelloTask {
    fn name(&self) -> &'static str {
        "drone/tello"
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

        let iface = TelloInterface::bind(config.bind, config.address).await?;

        let video_sock = UdpSocket::bind(config.video_bind)
            .await
            .with_context(|| format!("failed to bind video socket {}", config.video_bind))?;

        let control_loop = async {
            info!("connecting to drone at {}", config.address);

            retry_async(config.connect_attempts.max(1), Some(config.connect_spacing), || {
                iface.handshake(config.link_timeout)
            })
            .await
            .context("drone did not enter command mode")?;

            info!("connected to drone");
            state_tx.send_modify(|s| s.connected = true);
            emit(&evt_tx, DroneEvent::Connected);

            let mut last_reply = Instant::now();

            loop {
                let connected = state_tx.borrow().connected;

                select! {
                    cmd = cmd_rx.recv_async() => {
                        let cmd = match cmd {
                            Ok(cmd) => cmd,
                            Err(_) => {
                                debug!("all drone links dropped");
                                break;
                            }
                        };

                        if let Err(err) = iface.send(&cmd.to_string()).await {
                            warn!("{err:#}");
                            emit(&evt_tx, DroneEvent::Error(format!("{err:#}")));
                            continue;
                        }

                        state_tx.send_modify(|s| s.apply(cmd));
                    }

                    reply = iface.recv() => {
                        match reply {
                            Ok(reply) => {
                                last_reply = Instant::now();

                                if !connected {
                                    info!("drone is replying again");
                                    state_tx.send_modify(|s| s.connected = true);
                                    emit(&evt_tx, DroneEvent::Connected);
                                }

                                if reply.starts_with("error") {
                                    warn!("drone reported an error: {reply}");
                                    emit(&evt_tx, DroneEvent::Error(reply));
                                }
                            }
                            Err(err) => {
                                warn!("{err:#}");
                                emit(&evt_tx, DroneEvent::Error(format!("{err:#}")));
                            }
                        }
                    }

                    _ = sleep_until(last_reply + config.link_timeout), if connected => {
                        warn!("no reply from drone in {:?}, assuming disconnected", config.link_timeout);
                        state_tx.send_modify(|s| s.connected = false);
                        emit(&evt_tx, DroneEvent::Disconnected);
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        };

        let video_loop = relay_video(video_sock, video_tx);

        select! {
            _ = cancel.cancelled() => {}
            res = control_loop => { res? }
            res = video_loop => { res? }
        }

        Ok(())
    }
}

/// Forwards video datagrams until nobody is listening. A failed receive costs
/// one datagram at most.
async fn relay_video(
    sock: UdpSocket,
    video_tx: flume::Sender<VideoPacket>,
) -> anyhow::Result<()> {
    let mut buf = vec![0; MAX_VIDEO_DATAGRAM];

    loop {
        let n = match sock.recv(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                warn!("failed to receive video datagram: {err}");
                sleep(VIDEO_ERROR_BACKOFF).await;
                continue;
            }
        };

        if n == 0 {
            continue;
        }

        let packet = VideoPacket(Bytes::copy_from_slice(&buf[..n]));

        if video_tx.send_async(packet).await.is_err() {
            debug!("video channel closed");
            break;
        }
    }

    Ok(())
}
