// crates/engine-media/src/container.rs
//
// Container capability (§6.1): open/read/decode/convert/seek/flush/close.
// `FfmpegContainer` generalizes the teacher's `LiveDecoder` — a single-clip,
// video-only, stateful decoder — into a multi-stream (video+audio+subtitle)
// demuxer/decoder that the Reading and Decoding Workers drive cooperatively
// instead of one thread owning the whole pipeline.

use std::collections::HashMap;
use std::time::Duration;

use engine_types::{ContainerConfig, EngineError, MediaInfo, StreamDescriptor, StreamType};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::media::Type as FfmpegMediaType;
use ffmpeg::software::resampling::context::Context as SwrContext;
use ffmpeg::software::scaling::context::Context as SwsContext;

use crate::convert::{duration_from_units, pts_to_duration};
use crate::frame::Frame;

pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
pub const OUTPUT_CHANNELS: u16 = 2;

/// Result of one `read()` step (§6.1).
pub enum ReadOutcome {
    /// A packet for `stream_index` was queued internally; call `decode()`
    /// to drain whatever the decoder is ready to emit.
    PacketRead { stream_index: usize, kind: StreamType },
    EndOfStream,
    /// The underlying I/O would block; caller should back off this cycle.
    NeedsDelay,
}

/// The Container capability consumed by the Reading/Decoding Workers
/// (§6.1). Implemented by `FfmpegContainer`; kept as a trait so tests can
/// substitute a fake container without a real media file.
pub trait Container: Send {
    fn open(&mut self, source: &str, config: &ContainerConfig) -> Result<MediaInfo, EngineError>;
    fn read(&mut self) -> Result<ReadOutcome, EngineError>;
    /// Drains every frame the decoder is ready to emit, across all streams,
    /// in decoder-internal order (§5 ordering guarantees — the Decoding
    /// Worker is responsible for ordering by start_time before insertion).
    fn decode(&mut self) -> Result<Vec<(usize, Frame)>, EngineError>;
    fn convert(&mut self, stream_index: usize, frame: Frame) -> Result<engine_types::Block, EngineError>;
    fn seek(&mut self, target: Duration) -> Result<Duration, EngineError>;
    fn flush(&mut self);
    fn close(&mut self);
    fn stream_descriptor(&self, stream_index: usize) -> Option<StreamDescriptor>;
    /// Bytes currently queued for `stream_index` and the PTS of the most
    /// recently read packet, for the Reading Worker's budget check (§4.E).
    fn packet_queue_stats(&self, stream_index: usize) -> (u64, Option<Duration>);
    /// Indices of open streams matching `kind`, in no particular order.
    fn stream_indices_of(&self, kind: StreamType) -> Vec<usize>;
    /// Whether `read()` has returned `EndOfStream` since the last
    /// `open`/`seek` (§6.1, §4.G step 5's end-of-stream gate).
    fn is_at_end_of_stream(&self) -> bool;
}

pub(crate) enum Decoder {
    Video { decoder: ffmpeg::decoder::video::Video, scaler: Option<SwsContext>, time_base: ffmpeg::util::rational::Rational },
    Audio { decoder: ffmpeg::decoder::audio::Audio, resampler: Option<SwrContext>, time_base: ffmpeg::util::rational::Rational },
    SubtitleText { time_base: ffmpeg::util::rational::Rational, format_tag: String },
}

struct StreamState {
    kind:         StreamType,
    decoder:      Decoder,
    pending:      std::collections::VecDeque<ffmpeg::codec::packet::Packet>,
    pending_bytes: u64,
    last_read_pts: Option<Duration>,
}

pub struct FfmpegContainer {
    ictx:    Option<ffmpeg::format::context::Input>,
    streams: HashMap<usize, StreamState>,
    /// Stream index whose end-of-stream flag was observed on the last read.
    eof:     bool,
}

impl FfmpegContainer {
    pub fn new() -> Self {
        Self { ictx: None, streams: HashMap::new(), eof: false }
    }

    fn build_decoder(stream: &ffmpeg::format::stream::Stream) -> Result<(StreamType, Decoder), EngineError> {
        let time_base = stream.time_base();
        let params = stream.parameters();
        let medium = params.medium();
        match medium {
            FfmpegMediaType::Video => {
                let ctx = ffmpeg::codec::context::Context::from_parameters(params)
                    .map_err(|e| EngineError::OpenFailure(e.to_string()))?;
                let decoder = ctx.decoder().video().map_err(|e| EngineError::OpenFailure(e.to_string()))?;
                Ok((StreamType::Video, Decoder::Video { decoder, scaler: None, time_base }))
            }
            FfmpegMediaType::Audio => {
                let ctx = ffmpeg::codec::context::Context::from_parameters(params)
                    .map_err(|e| EngineError::OpenFailure(e.to_string()))?;
                let decoder = ctx.decoder().audio().map_err(|e| EngineError::OpenFailure(e.to_string()))?;
                Ok((StreamType::Audio, Decoder::Audio { decoder, resampler: None, time_base }))
            }
            FfmpegMediaType::Subtitle => {
                let codec_name = params.id().name().to_string();
                Ok((StreamType::Subtitle, Decoder::SubtitleText { time_base, format_tag: codec_name }))
            }
            _ => Ok((StreamType::Data, Decoder::SubtitleText { time_base, format_tag: "data".into() })),
        }
    }
}

impl Default for FfmpegContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for FfmpegContainer {
    fn open(&mut self, source: &str, config: &ContainerConfig) -> Result<MediaInfo, EngineError> {
        let ictx = ffmpeg::format::input(&source)
            .map_err(|e| EngineError::OpenFailure(format!("{source}: {e}")))?;

        let mut descriptors = Vec::new();
        let mut streams = HashMap::new();

        for stream in ictx.streams() {
            let index = stream.index();
            let (kind, decoder) = match Self::build_decoder(&stream) {
                Ok(v) => v,
                Err(_) => continue, // unsupported codec on this stream; skip it, not fatal
            };

            let params = stream.parameters();
            let descriptor = StreamDescriptor {
                index,
                kind,
                codec: params.id().name().to_string(),
                bitrate: if params.bit_rate() > 0 { Some(params.bit_rate() as u64) } else { None },
                sample_rate: match &decoder {
                    Decoder::Audio { decoder, .. } => Some(decoder.rate()),
                    _ => None,
                },
                channels: match &decoder {
                    Decoder::Audio { decoder, .. } => Some(decoder.channel_layout().channels() as u16),
                    _ => None,
                },
                pixel_format: match &decoder {
                    Decoder::Video { decoder, .. } => Some(format!("{:?}", decoder.format())),
                    _ => None,
                },
                frame_rate: {
                    let fr = stream.avg_frame_rate();
                    if fr.denominator() != 0 {
                        Some(fr.numerator() as f64 / fr.denominator() as f64)
                    } else {
                        None
                    }
                },
                aspect_ratio: None,
                rotation: 0,
                metadata: stream.metadata().iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            };
            descriptors.push(descriptor);
            streams.insert(index, StreamState {
                kind, decoder,
                pending: std::collections::VecDeque::new(),
                pending_bytes: 0,
                last_read_pts: None,
            });
        }

        if streams.is_empty() {
            return Err(EngineError::NoStreams);
        }

        let duration_secs = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
        let info = MediaInfo {
            duration: if duration_secs > 0.0 { Some(Duration::from_secs_f64(duration_secs)) } else { None },
            is_seekable: config.custom_input_stream.is_none(),
            streams: descriptors,
            container_format: ictx.format().name().to_string(),
            total_size_bytes: None,
            is_network: source.contains("://") && !source.starts_with("file://"),
            is_live: duration_secs <= 0.0,
        };

        self.ictx = Some(ictx);
        self.streams = streams;
        self.eof = false;
        Ok(info)
    }

    fn read(&mut self) -> Result<ReadOutcome, EngineError> {
        let ictx = self.ictx.as_mut().ok_or_else(|| EngineError::Fatal("container not open".into()))?;
        match ictx.packets().next() {
            Some(Ok((stream, packet))) => {
                let index = stream.index();
                let tb = stream.time_base();
                let Some(state) = self.streams.get_mut(&index) else {
                    return Ok(ReadOutcome::NeedsDelay); // stream we chose not to decode
                };
                let kind = state.kind;
                state.pending_bytes += packet.size() as u64;
                if let Some(pts) = packet.pts() {
                    state.last_read_pts = Some(Duration::from_secs_f64(
                        pts as f64 * tb.numerator() as f64 / tb.denominator() as f64,
                    ));
                }
                state.pending.push_back(packet);
                Ok(ReadOutcome::PacketRead { stream_index: index, kind })
            }
            Some(Err(e)) => Err(EngineError::Fatal(e.to_string())),
            None => {
                self.eof = true;
                Ok(ReadOutcome::EndOfStream)
            }
        }
    }

    fn decode(&mut self) -> Result<Vec<(usize, Frame)>, EngineError> {
        let mut out = Vec::new();
        for (&index, state) in self.streams.iter_mut() {
            while let Some(packet) = state.pending.pop_front() {
                state.pending_bytes = state.pending_bytes.saturating_sub(packet.size() as u64);
                match &mut state.decoder {
                    Decoder::Video { decoder, .. } => {
                        if decoder.send_packet(&packet).is_err() { continue; }
                        let mut decoded = ffmpeg::util::frame::video::Video::empty();
                        while decoder.receive_frame(&mut decoded).is_ok() {
                            out.push((index, Frame::Video(decoded.clone())));
                        }
                    }
                    Decoder::Audio { decoder, .. } => {
                        if decoder.send_packet(&packet).is_err() { continue; }
                        let mut decoded = ffmpeg::util::frame::audio::Audio::empty();
                        while decoder.receive_frame(&mut decoded).is_ok() {
                            out.push((index, Frame::Audio(decoded.clone())));
                        }
                    }
                    Decoder::SubtitleText { time_base, .. } => {
                        // Text-based subtitle codecs (SRT/WebVTT/mov_text) carry their
                        // payload as raw UTF-8 text in the packet itself — no decoder
                        // round-trip needed (SPEC_FULL.md §9).
                        let tb = *time_base;
                        if let Some(data) = packet.data() {
                            if let Ok(text) = std::str::from_utf8(data) {
                                let start = pts_to_duration(packet.pts(), tb);
                                let end = match packet.duration() {
                                    d if d > 0 => start + duration_from_units(d, tb),
                                    _ => start + Duration::from_secs(4),
                                };
                                out.push((index, Frame::SubtitleText { text: text.to_string(), start, end }));
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn convert(&mut self, stream_index: usize, frame: Frame) -> Result<engine_types::Block, EngineError> {
        let state = self.streams.get_mut(&stream_index)
            .ok_or_else(|| EngineError::Fatal(format!("unknown stream {stream_index}")))?;
        crate::convert::convert_frame(state_time_base(state), &mut state.decoder, frame)
            .map_err(|e| EngineError::DecodeFailure { stream: state.kind, message: e.to_string() })
    }

    fn seek(&mut self, target: Duration) -> Result<Duration, EngineError> {
        let ictx = self.ictx.as_mut().ok_or_else(|| EngineError::Fatal("container not open".into()))?;
        let ok = crate::helpers::seek::seek_to_secs(ictx, target.as_secs_f64(), "container::seek");
        for state in self.streams.values_mut() {
            state.pending.clear();
            state.pending_bytes = 0;
            state.last_read_pts = None;
        }
        self.eof = false;
        if ok {
            Ok(target)
        } else {
            Err(EngineError::SeekFailure { target, message: "demuxer seek failed".into() })
        }
    }

    fn flush(&mut self) {
        for state in self.streams.values_mut() {
            state.pending.clear();
            state.pending_bytes = 0;
            state.last_read_pts = None;
            match &mut state.decoder {
                Decoder::Video { decoder, .. } => { let _ = decoder.flush(); }
                Decoder::Audio { decoder, .. } => { let _ = decoder.flush(); }
                Decoder::SubtitleText { .. } => {}
            }
        }
    }

    fn close(&mut self) {
        self.ictx = None;
        self.streams.clear();
        self.eof = false;
    }

    fn stream_descriptor(&self, stream_index: usize) -> Option<StreamDescriptor> {
        let state = self.streams.get(&stream_index)?;
        Some(StreamDescriptor {
            index: stream_index,
            kind: state.kind,
            codec: String::new(),
            bitrate: None,
            sample_rate: None,
            channels: None,
            pixel_format: None,
            frame_rate: None,
            aspect_ratio: None,
            rotation: 0,
            metadata: HashMap::new(),
        })
    }

    fn packet_queue_stats(&self, stream_index: usize) -> (u64, Option<Duration>) {
        self.streams.get(&stream_index)
            .map(|s| (s.pending_bytes, s.last_read_pts))
            .unwrap_or((0, None))
    }

    fn stream_indices_of(&self, kind: StreamType) -> Vec<usize> {
        self.streams.iter().filter(|(_, s)| s.kind == kind).map(|(&i, _)| i).collect()
    }

    fn is_at_end_of_stream(&self) -> bool {
        self.eof
    }
}

fn state_time_base(state: &StreamState) -> ffmpeg::util::rational::Rational {
    match &state.decoder {
        Decoder::Video { time_base, .. } => *time_base,
        Decoder::Audio { time_base, .. } => *time_base,
        Decoder::SubtitleText { time_base, .. } => *time_base,
    }
}
