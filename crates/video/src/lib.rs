//! Everything between the drone's video feed and the inference worker: the
//! external decoder process, the sink that feeds it, and the sampler that
//! picks decoded frames out of its output directory.

mod config;
mod decoder;
mod sampler;
mod sink;
mod slot;
mod workdir;

pub use config::*;
pub use decoder::*;
pub use sampler::*;
pub use sink::*;
pub use slot::*;
pub use workdir::*;
