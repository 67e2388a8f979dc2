use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Idle,
    Connected,
    VideoStarting,
    Airborne,
    Maneuvering,
    Landing,
    Landed,
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightState::Idle => "idle",
            FlightState::Connected => "connected",
            FlightState::VideoStarting => "video starting",
            FlightState::Airborne => "airborne",
            FlightState::Maneuvering => "maneuvering",
            FlightState::Landing => "landing",
            FlightState::Landed => "landed",
        };

        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlightError {
    #[error("cannot go from {from} to {to} while {actual}")]
    InvalidTransition {
        from: FlightState,
        to: FlightState,
        actual: FlightState,
    },
}
