// crates/engine-types/src/connector.rs
//
// MediaConnector: the callback interface an embedding platform implements
// to observe engine events (§6.3). Default no-op methods so an embedder
// only overrides what it cares about — mirrors the teacher's preference for
// small, composable trait surfaces over one monolithic event enum.

use std::time::Duration;

use crate::container_config::ContainerConfig;
use crate::error::EngineError;
use crate::state::MediaState;
use crate::stream::MediaInfo;

pub trait MediaConnector: Send + Sync {
    fn on_message_logged(&self, _message: &str) {}

    fn on_media_initializing(&self, _config: &ContainerConfig, _source: &str) {}
    fn on_media_opening(&self, _source: &str, _info: &MediaInfo) {}
    fn on_media_changing(&self) {}
    fn on_media_changed(&self, _info: &MediaInfo) {}
    fn on_media_opened(&self, _info: &MediaInfo) {}
    fn on_media_closed(&self) {}
    fn on_media_failed(&self, _error: &EngineError) {}
    fn on_media_ended(&self) {}

    fn on_buffering_started(&self) {}
    fn on_buffering_ended(&self) {}

    fn on_seeking_started(&self) {}
    fn on_seeking_ended(&self) {}

    fn on_position_changed(&self, _old: Duration, _new: Duration) {}
    fn on_media_state_changed(&self, _old: MediaState, _new: MediaState) {}
}

/// A connector that discards every event; the engine's default when no
/// embedder is registered.
pub struct NullConnector;

impl MediaConnector for NullConnector {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_connector_accepts_every_callback_without_panicking() {
        let c = NullConnector;
        c.on_message_logged("hello");
        c.on_media_state_changed(MediaState::Close, MediaState::Open);
        c.on_position_changed(Duration::ZERO, Duration::from_secs(1));
    }
}
