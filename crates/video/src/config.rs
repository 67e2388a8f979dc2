use std::time::Duration;

use serde::Deserialize;

/// The external process that turns the raw video stream into numbered image
/// files.
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Images written per second of video.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Output file name pattern, relative to the working directory. Must
    /// number its files, e.g. `output_%04d.png`.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Passed to the decoder just before the output path.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            frame_rate: default_frame_rate(),
            pattern: default_pattern(),
            extra_args: Vec::new(),
        }
    }
}

fn default_program() -> String {
    "ffmpeg".to_owned()
}

fn default_frame_rate() -> u32 {
    1
}

fn default_pattern() -> String {
    "output_%04d.png".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    #[serde(with = "serde_millis", default = "default_period")]
    pub period: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
        }
    }
}

fn default_period() -> Duration {
    Duration::from_secs(1)
}
