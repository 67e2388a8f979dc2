mod command;
mod frame;

pub use command::*;
pub use frame::*;

/// Events emitted by a drone link on its control channel. Video travels on a
/// separate channel as [`VideoPacket`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DroneEvent {
    /// The handshake with the drone succeeded (or responses resumed after a
    /// [`DroneEvent::Disconnected`]).
    Connected,
    /// The drone stopped answering.
    Disconnected,
    /// The drone or the link reported an error.
    Error(String),
}
