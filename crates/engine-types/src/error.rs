// crates/engine-types/src/error.rs
//
// EngineError: the public, matchable error type for all transport operations
// (§7). Internal worker glue still uses anyhow; this is what crosses the
// MediaEngine facade boundary and what MediaConnector::on_error receives.

use std::time::Duration;

use thiserror::Error;

use crate::stream::StreamType;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to open media: {0}")]
    OpenFailure(String),

    #[error("no playable stream found")]
    NoStreams,

    #[error("decode failure on {stream:?}: {message}")]
    DecodeFailure { stream: StreamType, message: String },

    #[error("seek to {target:?} failed: {message}")]
    SeekFailure { target: Duration, message: String },

    #[error("renderer failure on {stream:?}: {message}")]
    RendererFailure { stream: StreamType, message: String },

    #[error("command cancelled")]
    Cancelled,

    #[error("fatal engine error: {0}")]
    Fatal(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// Per §7: a `Fatal` error is the only kind that forces the engine to a
    /// synthetic `Close`. Everything else is either surfaced and swallowed
    /// (`DecodeFailure`, up to the policy's error budget) or retried once
    /// (`SeekFailure`).
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }
}

impl From<crate::buffer::BufferError> for EngineError {
    fn from(e: crate::buffer::BufferError) -> Self {
        EngineError::Fatal(e.to_string())
    }
}
