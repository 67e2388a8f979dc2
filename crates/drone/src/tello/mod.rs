mod config;
mod interface;
mod task;

pub use config::*;
pub use task::*;
