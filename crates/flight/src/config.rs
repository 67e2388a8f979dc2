use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FlightPlan {
    /// Video encoder rate set once on connection.
    #[serde(default = "default_encoder_rate")]
    pub encoder_rate: u8,

    /// How often the start-video command is repeated. The drone ignores it
    /// once streaming, and it restarts the stream after a dropped start.
    #[serde(with = "serde_millis", default = "default_video_keepalive")]
    pub video_keepalive: Duration,

    /// Time between take-off and the maneuver.
    #[serde(with = "serde_millis", default = "default_maneuver_delay")]
    pub maneuver_delay: Duration,

    /// Degrees, clockwise.
    #[serde(default = "default_rotate_angle")]
    pub rotate_angle: i32,

    /// Centimeters.
    #[serde(default = "default_forward_distance")]
    pub forward_distance: u32,
}

impl Default for FlightPlan {
    fn default() -> Self {
        Self {
            encoder_rate: default_encoder_rate(),
            video_keepalive: default_video_keepalive(),
            maneuver_delay: default_maneuver_delay(),
            rotate_angle: default_rotate_angle(),
            forward_distance: default_forward_distance(),
        }
    }
}

fn default_encoder_rate() -> u8 {
    4
}

fn default_video_keepalive() -> Duration {
    Duration::from_secs(1)
}

fn default_maneuver_delay() -> Duration {
    Duration::from_secs(15)
}

fn default_rotate_angle() -> i32 {
    50
}

fn default_forward_distance() -> u32 {
    21
}
