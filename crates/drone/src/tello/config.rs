use std::{net::SocketAddr, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TelloConfig {
    /// Address of the drone's command port.
    #[serde(default = "default_address")]
    pub address: SocketAddr,

    /// Local address for the command socket. The drone replies to the port
    /// it was contacted from.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Local address the drone streams raw H.264 to once video is started.
    #[serde(default = "default_video_bind")]
    pub video_bind: SocketAddr,

    /// How many times to attempt the command-mode handshake before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: usize,

    #[serde(with = "serde_millis", default = "default_connect_spacing")]
    pub connect_spacing: Duration,

    /// The drone is considered disconnected when it has not replied for this
    /// long.
    #[serde(with = "serde_millis", default = "default_link_timeout")]
    pub link_timeout: Duration,
}

impl Default for TelloConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            bind: default_bind(),
            video_bind: default_video_bind(),
            connect_attempts: default_connect_attempts(),
            connect_spacing: default_connect_spacing(),
            link_timeout: default_link_timeout(),
        }
    }
}

fn default_address() -> SocketAddr {
    ([192, 168, 10, 1], 8889).into()
}

fn default_bind() -> SocketAddr {
    ([0, 0, 0, 0], 8889).into()
}

fn default_video_bind() -> SocketAddr {
    ([0, 0, 0, 0], 11111).into()
}

fn default_connect_attempts() -> usize {
    10
}

fn default_connect_spacing() -> Duration {
    Duration::from_millis(500)
}

fn default_link_timeout() -> Duration {
    Duration::from_secs(10)
}
