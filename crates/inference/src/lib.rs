//! Sends sampled frames to the remote inference service and turns its
//! replies into drone commands.

mod client;
mod config;
mod dispatcher;
mod task;

pub use client::*;
pub use config::*;
pub use dispatcher::*;
pub use task::*;
