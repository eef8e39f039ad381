// crates/engine-media/src/renderer.rs
//
// Renderer capability (§4.D, §6.2): a sink the Rendering Worker pushes
// Blocks into. One renderer per active stream type, obtained from a
// platform factory keyed by StreamType. Reference implementations here
// cover the common desktop targets; platform-specific sinks (compositor
// surfaces, native audio HAL) are out of scope (SPEC_FULL.md Non-goals).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use engine_types::{Block, BlockPayload};
use parking_lot::RwLock;

/// A presentation sink for one stream type. `render` must be idempotent —
/// the Rendering Worker may call it again for the same block across cycles
/// (§5 ordering guarantees).
pub trait Renderer: Send + Sync {
    /// Present `block` at logical time `t`.
    fn render(&self, block: &Arc<Block>, t: Duration) -> Result<()>;
    /// Called every cycle even when no new block is due, so the renderer
    /// can do idle upkeep (audio device draining, subtitle fade-out).
    fn update(&self, t: Duration) -> Result<()>;

    /// Gain controls (§3, §4.D transport state) — meaningful only for an
    /// audio sink, so every other renderer kind keeps the no-op default.
    fn set_volume(&self, _volume: f64) {}
    fn set_balance(&self, _balance: f64) {}
    fn set_muted(&self, _muted: bool) {}
}

/// cpal-backed audio device sink. Owns the output stream and a bounded
/// ring of pending PCM16 samples that the audio callback drains.
pub struct CpalAudioRenderer {
    buffer: Arc<Mutex<std::collections::VecDeque<i16>>>,
    volume: RwLock<f64>,
    balance: RwLock<f64>,
    muted: RwLock<bool>,
    _stream: StreamHandle,
}

/// `cpal::Stream` isn't `Sync` on every backend (it carries a raw platform
/// handle); the renderer never touches it after construction except to
/// drop it, so asserting `Sync` here is sound.
struct StreamHandle(cpal::Stream);
unsafe impl Sync for StreamHandle {}

use std::sync::Mutex;

impl CpalAudioRenderer {
    pub fn new() -> Result<Self> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| anyhow!("no audio output device"))?;
        let config = device.default_output_config()?;

        let buffer: Arc<Mutex<std::collections::VecDeque<i16>>> = Arc::new(Mutex::new(std::collections::VecDeque::new()));
        let buffer_cb = Arc::clone(&buffer);

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [i16], _| {
                let mut buf = buffer_cb.lock().unwrap();
                for sample in data.iter_mut() {
                    *sample = buf.pop_front().unwrap_or(0);
                }
            },
            |err| eprintln!("[render] cpal stream error: {err}"),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            buffer,
            volume: RwLock::new(1.0),
            balance: RwLock::new(0.0),
            muted: RwLock::new(false),
            _stream: StreamHandle(stream),
        })
    }

    pub fn set_volume(&self, volume: f64) {
        *self.volume.write() = volume.clamp(0.0, 1.0);
    }

    pub fn set_balance(&self, balance: f64) {
        *self.balance.write() = balance.clamp(-1.0, 1.0);
    }

    pub fn set_muted(&self, muted: bool) {
        *self.muted.write() = muted;
    }

    fn apply_gain(&self, samples: &[i16]) -> Vec<i16> {
        if *self.muted.read() {
            return vec![0; samples.len()];
        }
        let volume = *self.volume.read();
        let balance = *self.balance.read();
        let left_gain = volume * (1.0 - balance.max(0.0));
        let right_gain = volume * (1.0 + balance.min(0.0));
        samples.chunks(2).flat_map(|ch| {
            let l = (ch[0] as f64 * left_gain) as i16;
            let r = (*ch.get(1).unwrap_or(&ch[0]) as f64 * right_gain) as i16;
            [l, r]
        }).collect()
    }
}

impl Renderer for CpalAudioRenderer {
    fn render(&self, block: &Arc<Block>, _t: Duration) -> Result<()> {
        if let BlockPayload::Audio(audio) = &block.payload {
            let gained = self.apply_gain(&audio.samples);
            self.buffer.lock().unwrap().extend(gained);
        }
        Ok(())
    }

    fn update(&self, _t: Duration) -> Result<()> {
        Ok(())
    }

    fn set_volume(&self, volume: f64) {
        CpalAudioRenderer::set_volume(self, volume);
    }

    fn set_balance(&self, balance: f64) {
        CpalAudioRenderer::set_balance(self, balance);
    }

    fn set_muted(&self, muted: bool) {
        CpalAudioRenderer::set_muted(self, muted);
    }
}

/// Raster surface sink: keeps the latest BGRA8 frame behind a lock for a
/// platform compositor to blit on its own schedule.
pub struct SurfaceVideoRenderer {
    latest: RwLock<Option<(Vec<u8>, u32, u32)>>,
}

impl SurfaceVideoRenderer {
    pub fn new() -> Self {
        Self { latest: RwLock::new(None) }
    }

    pub fn latest_frame(&self) -> Option<(Vec<u8>, u32, u32)> {
        self.latest.read().clone()
    }
}

impl Default for SurfaceVideoRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for SurfaceVideoRenderer {
    fn render(&self, block: &Arc<Block>, _t: Duration) -> Result<()> {
        if let BlockPayload::Video(video) = &block.payload {
            *self.latest.write() = Some((video.pixels.clone(), video.width, video.height));
        }
        Ok(())
    }

    fn update(&self, _t: Duration) -> Result<()> {
        Ok(())
    }
}

/// Debug/test sink: writes every rendered video block to a PNG file,
/// grounded on the teacher's `decode_frame` PNG-save path.
pub struct PngCaptureVideoRenderer {
    dir: std::path::PathBuf,
    counter: std::sync::atomic::AtomicU64,
}

impl PngCaptureVideoRenderer {
    pub fn new(dir: std::path::PathBuf) -> Self {
        Self { dir, counter: std::sync::atomic::AtomicU64::new(0) }
    }
}

impl Renderer for PngCaptureVideoRenderer {
    fn render(&self, block: &Arc<Block>, _t: Duration) -> Result<()> {
        let BlockPayload::Video(video) = &block.payload else { return Ok(()) };
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let path = self.dir.join(format!("frame-{n:06}.png"));
        let file = std::fs::File::create(&path)?;
        let mut writer = std::io::BufWriter::new(file);
        let mut encoder = png::Encoder::new(&mut writer, video.width, video.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        // Source pixels are BGRA8; PNG wants RGBA — swap R/B per pixel.
        let mut rgba = video.pixels.clone();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        let mut w = encoder.write_header()?;
        w.write_image_data(&rgba)?;
        eprintln!("[render] PNG capture → {}", path.display());
        Ok(())
    }

    fn update(&self, _t: Duration) -> Result<()> {
        Ok(())
    }
}

/// Minimal text sink for subtitles: prints the active line(s) to stderr.
/// A platform embedding an overlay widget would implement its own instead.
pub struct LineSubtitleRenderer {
    last: RwLock<Option<String>>,
}

impl LineSubtitleRenderer {
    pub fn new() -> Self {
        Self { last: RwLock::new(None) }
    }
}

impl Default for LineSubtitleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for LineSubtitleRenderer {
    fn render(&self, block: &Arc<Block>, _t: Duration) -> Result<()> {
        if let BlockPayload::Subtitle(sub) = &block.payload {
            let joined = sub.lines.join(" / ");
            let mut last = self.last.write();
            if last.as_deref() != Some(joined.as_str()) {
                eprintln!("[subtitle] {joined}");
                *last = Some(joined);
            }
        }
        Ok(())
    }

    fn update(&self, _t: Duration) -> Result<()> {
        Ok(())
    }
}

/// The set of renderers active for the current media, one per stream type
/// that is both present and enabled (§4.D).
#[derive(Default)]
pub struct RendererSet {
    pub video:    Option<Arc<dyn Renderer>>,
    pub audio:    Option<Arc<dyn Renderer>>,
    pub subtitle: Option<Arc<dyn Renderer>>,
}

impl RendererSet {
    pub fn for_kind(&self, kind: engine_types::StreamType) -> Option<&Arc<dyn Renderer>> {
        match kind {
            engine_types::StreamType::Video => self.video.as_ref(),
            engine_types::StreamType::Audio => self.audio.as_ref(),
            engine_types::StreamType::Subtitle => self.subtitle.as_ref(),
            _ => None,
        }
    }
}
