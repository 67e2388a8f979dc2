mod link;
pub mod simulated;
pub mod tello;

pub use ds_types::{DroneEvent, FlightCommand, VideoPacket};
pub use link::*;

use serde::Deserialize;

/// Selects which drone the system talks to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DroneConfig {
    Tello(tello::TelloConfig),
    Simulated(simulated::SimulatedConfig),
}

impl Default for DroneConfig {
    fn default() -> Self {
        DroneConfig::Tello(Default::default())
    }
}
