use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Context};
use tokio::net::UdpSocket;
use tracing::*;

const MAX_REPLY_SIZE: usize = 256;

/// The drone's text command channel.
pub struct TelloInterface {
    sock: UdpSocket,
}

impl TelloInterface {
    pub async fn bind(local: SocketAddr, drone: SocketAddr) -> anyhow::Result<Self> {
        debug!("binding command socket {local}");

        let sock = UdpSocket::bind(local)
            .await
            .with_context(|| format!("failed to bind command socket {local}"))?;

        sock.connect(drone)
            .await
            .with_context(|| format!("failed to lock command socket to {drone}"))?;

        Ok(Self { sock })
    }

    /// Puts the drone into SDK command mode. The drone answers `ok` once it
    /// accepts commands.
    pub async fn handshake(&self, timeout: Duration) -> anyhow::Result<()> {
        self.send("command").await?;

        let reply = tokio::time::timeout(timeout, self.recv())
            .await
            .context("timed out while waiting for the drone to enter command mode")??;

        if reply != "ok" {
            bail!("drone refused command mode: '{reply}'");
        }

        Ok(())
    }

    pub async fn send(&self, text: &str) -> anyhow::Result<()> {
        debug!("SEND {text}");

        self.sock
            .send(text.as_bytes())
            .await
            .with_context(|| format!("failed to send '{text}' to drone"))?;

        Ok(())
    }

    /// Waits for the next reply from the drone. Cancel safe.
    pub async fn recv(&self) -> anyhow::Result<String> {
        let mut buf = [0; MAX_REPLY_SIZE];
        let n = self
            .sock
            .recv(&mut buf)
            .await
            .context("failed to receive reply from drone")?;

        let reply = String::from_utf8_lossy(&buf[..n]).trim().to_owned();
        debug!("RECEIVED {reply}");

        Ok(reply)
    }
}
