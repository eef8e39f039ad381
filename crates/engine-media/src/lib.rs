// crates/engine-media/src/lib.rs
//
// engine-media: the playback engine built against the Container/Renderer
// capabilities in engine-types. See SPEC_FULL.md for the module map this
// crate implements (§5 Workers, §6 Engine facade).

mod command_queue;
mod container;
mod convert;
mod engine;
mod frame;
mod helpers;
mod renderer;
mod shared;
mod workers;

pub use command_queue::CompletionHandle;
pub use container::{Container, FfmpegContainer, ReadOutcome};
pub use engine::MediaEngine;
pub use frame::Frame;
pub use renderer::{
    CpalAudioRenderer, LineSubtitleRenderer, PngCaptureVideoRenderer, Renderer, RendererSet,
    SurfaceVideoRenderer,
};
