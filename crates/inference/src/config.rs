use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// URL the frames are POSTed to.
    #[serde(default = "default_address")]
    pub address: String,

    /// Name of the multipart field carrying the image.
    #[serde(default = "default_field_name")]
    pub field_name: String,

    /// Upper bound on a whole request. Unset means wait indefinitely.
    #[serde(with = "serde_millis", default)]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub dispatcher: DispatcherKind,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            field_name: default_field_name(),
            timeout: None,
            dispatcher: DispatcherKind::default(),
        }
    }
}

/// What to do with the text the inference service sends back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    /// Log the reply and do nothing.
    #[default]
    Noop,
    /// Parse the reply as a flight command and send it to the drone.
    Command,
}

fn default_address() -> String {
    "http://127.0.0.1:5000/".to_owned()
}

fn default_field_name() -> String {
    "file".to_owned()
}
