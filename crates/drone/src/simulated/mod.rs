mod task;

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
pub use task::*;

/// A stand-in drone for dry runs on the ground. It accepts every command,
/// reports itself connected after a short delay, and can replay a recorded
/// H.264 stream as its video feed once video is started.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedConfig {
    #[serde(with = "serde_millis", default = "default_connect_delay")]
    pub connect_delay: Duration,

    /// Raw H.264 file to replay (looped) as the video feed.
    #[serde(default)]
    pub video_path: Option<PathBuf>,

    #[serde(default = "default_packet_size")]
    pub packet_size: usize,

    #[serde(with = "serde_millis", default = "default_packet_interval")]
    pub packet_interval: Duration,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            connect_delay: default_connect_delay(),
            video_path: None,
            packet_size: default_packet_size(),
            packet_interval: default_packet_interval(),
        }
    }
}

fn default_connect_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_packet_size() -> usize {
    1460
}

fn default_packet_interval() -> Duration {
    Duration::from_millis(33)
}
