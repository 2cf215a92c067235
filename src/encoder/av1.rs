//! AV1 encoder using rav1e

use super::{EncoderBackend, Received};
use crate::config::{LatencyProfile, SessionConfig, MAX_QUANTIZER};
use crate::frame::{EncodedPacket, FrameDescriptor, PixelFormat};
use crate::{Error, Result};
use rav1e::prelude::*;
use std::collections::HashMap;

/// rav1e quantizer used when no quality bounds are configured
const DEFAULT_QUANTIZER: usize = 100;

/// Map a 0..=51 quantizer onto rav1e's 0..=255 scale
fn scale_quantizer(q: u8) -> usize {
    q.min(MAX_QUANTIZER) as usize * 255 / MAX_QUANTIZER as usize
}

/// AV1 encoder using rav1e
pub struct Av1Encoder {
    context: Context<u8>,
    width: u32,
    height: u32,
    frames_sent: u64,
    /// Presentation timestamps keyed by rav1e's input frame number
    pts: HashMap<u64, i64>,
    force_key: bool,
}

impl Av1Encoder {
    /// Create a new AV1 encoder
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let (quantizer, min_quantizer) = match config.effective_quality() {
            Some(bounds) => (
                scale_quantizer(bounds.max_q),
                scale_quantizer(bounds.min_q) as u8,
            ),
            None => (DEFAULT_QUANTIZER, 0),
        };

        let mut speed_settings = match config.latency {
            LatencyProfile::LowLatency => SpeedSettings::from_preset(10),
            LatencyProfile::Standard => SpeedSettings::from_preset(6),
        };
        if config.latency == LatencyProfile::LowLatency {
            speed_settings.rdo_lookahead_frames = 1;
        }

        let enc_config = rav1e::config::EncoderConfig {
            width: config.width as usize,
            height: config.height as usize,
            speed_settings,
            time_base: Rational::new(1, config.fps as u64),
            bit_depth: 8,
            chroma_sampling: ChromaSampling::Cs420,
            pixel_range: PixelRange::Limited,
            min_key_frame_interval: 0,
            max_key_frame_interval: config.gop_size as u64,
            low_latency: config.effective_b_frames() == 0,
            quantizer,
            min_quantizer,
            bitrate: config.bitrate.min(i32::MAX as u32) as i32,
            ..Default::default()
        };

        let rav1e_config = Config::new()
            .with_encoder_config(enc_config)
            .with_threads(config.threads as usize);

        let context = rav1e_config
            .new_context()
            .map_err(|e| Error::Open(format!("Failed to create AV1 context: {}", e)))?;

        log::info!(
            "rav1e encoder opened: {}x{} @ {} fps, {} bps, {} threads, low_latency={}",
            config.width,
            config.height,
            config.fps,
            config.bitrate,
            config.threads,
            config.effective_b_frames() == 0
        );

        Ok(Self {
            context,
            width: config.width,
            height: config.height,
            frames_sent: 0,
            pts: HashMap::new(),
            force_key: false,
        })
    }

    /// Copy a planar frame into a rav1e frame
    fn to_rav1e_frame(&self, frame: &FrameDescriptor) -> Result<rav1e::Frame<u8>> {
        let buffer = &frame.buffer;
        if buffer.format() != PixelFormat::Yuv420p
            || (buffer.width(), buffer.height()) != (self.width, self.height)
        {
            return Err(Error::SendFailed(format!(
                "expected {}x{} Yuv420p, got {}x{} {:?}",
                self.width,
                self.height,
                buffer.width(),
                buffer.height(),
                buffer.format()
            )));
        }

        let mut yuv_frame = self.context.new_frame();
        for (dst, src) in yuv_frame.planes.iter_mut().zip(buffer.planes()) {
            dst.copy_from_raw_u8(src.data(), src.stride(), 1);
        }
        Ok(yuv_frame)
    }
}

impl EncoderBackend for Av1Encoder {
    fn name(&self) -> &str {
        "rav1e"
    }

    fn send_frame(&mut self, frame: Option<&FrameDescriptor>) -> Result<()> {
        let Some(frame) = frame else {
            self.context.flush();
            return Ok(());
        };

        let yuv_frame = self.to_rav1e_frame(frame)?;
        let sent = if std::mem::take(&mut self.force_key) {
            let params = FrameParameters {
                frame_type_override: FrameTypeOverride::Key,
                ..Default::default()
            };
            self.context.send_frame((yuv_frame, params))
        } else {
            self.context.send_frame(yuv_frame)
        };
        sent.map_err(|e| Error::SendFailed(format!("Failed to send frame: {}", e)))?;

        self.pts.insert(self.frames_sent, frame.pts);
        self.frames_sent += 1;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Received> {
        loop {
            match self.context.receive_packet() {
                Ok(pkt) => {
                    let pts = self
                        .pts
                        .remove(&pkt.input_frameno)
                        .unwrap_or(pkt.input_frameno as i64);
                    return Ok(Received::Packet(EncodedPacket {
                        data: pkt.data,
                        pts,
                        is_keyframe: pkt.frame_type == FrameType::KEY,
                    }));
                }
                Err(EncoderStatus::Encoded) => continue,
                Err(EncoderStatus::NeedMoreData) => return Ok(Received::NotReady),
                Err(EncoderStatus::LimitReached) => return Ok(Received::EndOfStream),
                Err(e) => {
                    return Err(Error::ReceiveFailed(format!("AV1 encoding error: {}", e)));
                }
            }
        }
    }

    fn force_keyframe(&mut self) {
        self.force_key = true;
    }
}
