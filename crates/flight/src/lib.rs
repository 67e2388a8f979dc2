//! The scripted take-off, maneuver and landing sequence flown once the drone
//! connects. It is open loop: the maneuver happens after a fixed delay, not in
//! response to anything the drone reports.

mod config;
mod sequencer;
mod state;

pub use config::*;
pub use sequencer::*;
pub use state::*;
