// crates/engine-types/src/container_config.rs
//
// ContainerConfig: options recognized by `Container::open` (§6.1). Kept in
// engine-types (codec-free) so callers can build one without depending on
// engine-media's ffmpeg glue.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A custom input stream source, keyed by a pseudo-URI the container
/// resolves back to `read`/`seek` callbacks supplied out-of-band (§6.1).
/// The callbacks themselves are not serializable; this only carries the
/// address they are registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomInputStreamRef {
    pub pseudo_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Force a specific demuxer instead of probing (e.g. "mpegts").
    pub forced_input_format: Option<String>,
    /// Global options: network timeout, probe size, analyze duration.
    pub io_timeout: Option<Duration>,
    pub probe_size_bytes: Option<u64>,
    pub analyze_duration: Option<Duration>,
    /// Per-stream private options, keyed by stream index.
    pub per_stream_options: HashMap<usize, HashMap<String, String>>,
    /// Allowed protocols, e.g. `["file", "http", "https"]`. Empty means
    /// "use the codec library's default allow-list".
    pub protocol_allow_list: Vec<String>,
    pub input_buffer_length: Option<usize>,
    pub custom_input_stream: Option<CustomInputStreamRef>,
    /// Stream index of the audio track to decode when a media has more than
    /// one (§6.1 `ChangeMedia` track-switch scenario). `None` keeps whichever
    /// audio stream `Container::open` selects by default (the first one).
    pub preferred_audio_stream: Option<usize>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            forced_input_format: None,
            io_timeout: None,
            probe_size_bytes: None,
            analyze_duration: None,
            per_stream_options: HashMap::new(),
            protocol_allow_list: Vec::new(),
            input_buffer_length: None,
            custom_input_stream: None,
            preferred_audio_stream: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_is_empty_meaning_use_library_default() {
        assert!(ContainerConfig::default().protocol_allow_list.is_empty());
    }
}
