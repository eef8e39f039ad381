// crates/engine-media/src/convert.rs
//
// Frame → Block conversion (§6.1 `convert`): video scaled to BGRA8 via
// SwsContext (same approach as the teacher's LiveDecoder, generalized from
// RGBA-for-preview to BGRA8-for-render-surfaces), audio resampled to PCM16
// stereo 48kHz via SwrContext, subtitle text passed through as lines.

use std::time::Duration;

use anyhow::{anyhow, Result};
use engine_types::{AudioPayload, Block, BlockPayload, SubtitlePayload, VideoPayload};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::resampling::context::Context as SwrContext;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::format::sample::{Sample, Type as SampleType};
use ffmpeg::util::rational::Rational;

use crate::container::{Decoder, OUTPUT_SAMPLE_RATE};

pub(crate) fn pts_to_duration(pts: Option<i64>, tb: Rational) -> Duration {
    match pts {
        Some(p) if p >= 0 => duration_from_units(p, tb),
        _ => Duration::ZERO,
    }
}

pub(crate) fn duration_from_units(units: i64, tb: Rational) -> Duration {
    Duration::from_secs_f64(units as f64 * tb.numerator() as f64 / tb.denominator() as f64)
}

pub(crate) fn convert_frame(time_base: Rational, decoder: &mut Decoder, frame: crate::frame::Frame) -> Result<Block> {
    match (decoder, frame) {
        (Decoder::Video { decoder, scaler, .. }, crate::frame::Frame::Video(video)) => {
            if scaler.is_none() {
                *scaler = Some(SwsContext::get(
                    decoder.format(), decoder.width(), decoder.height(),
                    Pixel::BGRA, decoder.width(), decoder.height(),
                    Flags::BILINEAR,
                )?);
            }
            let sws = scaler.as_mut().unwrap();
            let mut out = ffmpeg::util::frame::video::Video::empty();
            sws.run(&video, &mut out)?;

            let width = out.width();
            let height = out.height();
            let stride = out.stride(0);
            let raw = out.data(0);
            let row_bytes = width as usize * 4;
            let pixels: Vec<u8> = (0..height as usize)
                .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
                .copied()
                .collect();

            let start = pts_to_duration(video.pts(), time_base);
            let frame_secs = if decoder.frame_rate().is_some() {
                let fr = decoder.frame_rate().unwrap();
                fr.denominator() as f64 / fr.numerator().max(1) as f64
            } else {
                1.0 / 30.0
            };
            let end = start + Duration::from_secs_f64(frame_secs);

            Ok(Block::new(start, end, BlockPayload::Video(VideoPayload {
                pixels, width, height, stride: row_bytes as u32, closed_captions: Vec::new(),
            })))
        }
        (Decoder::Audio { decoder, resampler, .. }, crate::frame::Frame::Audio(audio)) => {
            if resampler.is_none() {
                *resampler = Some(SwrContext::get(
                    decoder.format(), decoder.channel_layout(), decoder.rate(),
                    Sample::I16(SampleType::Packed), ChannelLayout::STEREO, OUTPUT_SAMPLE_RATE,
                )?);
            }
            let swr = resampler.as_mut().unwrap();
            let mut out = ffmpeg::util::frame::audio::Audio::empty();
            swr.run(&audio, &mut out)?;

            let samples_i16: &[i16] = out.plane(0);
            let samples = samples_i16.to_vec();

            let start = pts_to_duration(audio.pts(), time_base);
            let sample_count = out.samples() as f64;
            let end = start + Duration::from_secs_f64(sample_count / OUTPUT_SAMPLE_RATE as f64);

            Ok(Block::new(start, end, BlockPayload::Audio(AudioPayload { samples })))
        }
        (Decoder::SubtitleText { format_tag, .. }, crate::frame::Frame::SubtitleText { text, start, end }) => {
            let lines: Vec<String> = text.lines().map(str::to_string).collect();
            Ok(Block::new(start, end, BlockPayload::Subtitle(SubtitlePayload {
                lines, markup: text, format_tag: format_tag.clone(),
            })))
        }
        _ => Err(anyhow!("frame/decoder kind mismatch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_to_duration_treats_negative_as_zero() {
        let tb = Rational::new(1, 30);
        assert_eq!(pts_to_duration(Some(-1), tb), Duration::ZERO);
        assert_eq!(pts_to_duration(None, tb), Duration::ZERO);
    }

    #[test]
    fn pts_to_duration_scales_by_time_base() {
        let tb = Rational::new(1, 30);
        assert_eq!(pts_to_duration(Some(30), tb), Duration::from_secs(1));
    }
}
