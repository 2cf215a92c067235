//! H.264 encoder using Cisco OpenH264
//!
//! OpenH264 codes one picture per call and never reorders, so packets are
//! queued here and handed out through the same drain protocol as the
//! buffering encoders.

use super::{EncoderBackend, Received};
use crate::bitstream::h264_is_keyframe;
use crate::config::SessionConfig;
use crate::frame::{EncodedPacket, FrameDescriptor, PixelBuffer, PixelFormat};
use crate::{Error, Result};
use openh264::encoder::{Encoder, EncoderConfig as H264Config};
use openh264::formats::{YUVBuffer, YUVSlices};
use openh264::OpenH264API;
use std::collections::VecDeque;

/// OpenH264 encoder (constrained baseline, no B-frames)
pub struct OpenH264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    gop_size: u64,
    frames_sent: u64,
    ready: VecDeque<EncodedPacket>,
    force_key: bool,
    flushed: bool,
}

/// OpenH264 parameters for a validated session config.
///
/// The thread count is always explicit; 0 would let OpenH264 pick one.
fn encoder_config(config: &SessionConfig) -> H264Config {
    let threads = u16::try_from(config.threads).unwrap_or(u16::MAX).max(1);
    H264Config::new()
        .set_bitrate_bps(config.bitrate)
        .max_frame_rate(config.fps as f32)
        .enable_skip_frame(false)
        .set_multiple_thread_idc(threads)
}

impl OpenH264Encoder {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        // Compiled from bundled source, no system library needed
        let api = OpenH264API::from_source();

        let encoder = Encoder::with_api_config(api, encoder_config(config))
            .map_err(|e| Error::Open(format!("Failed to create OpenH264 encoder: {}", e)))?;

        if config.effective_b_frames() > 0 {
            log::warn!(
                "OpenH264 has no B-frame support, ignoring max_b_frames={}",
                config.max_b_frames
            );
        }
        if config.quality.is_some() {
            log::warn!("OpenH264 rate control ignores quantizer bounds");
        }

        log::info!(
            "OpenH264 encoder opened: {}x{} @ {} fps, {} bps, gop {}, {} threads",
            config.width,
            config.height,
            config.fps,
            config.bitrate,
            config.gop_size,
            config.threads
        );

        Ok(Self {
            encoder,
            width: config.width,
            height: config.height,
            gop_size: config.gop_size as u64,
            frames_sent: 0,
            ready: VecDeque::new(),
            force_key: false,
            flushed: false,
        })
    }

    /// Encode one picture, reading the planes in place when their layout allows
    fn encode(&mut self, buffer: &PixelBuffer) -> Result<Vec<u8>> {
        let (width, height) = (self.width as usize, self.height as usize);
        let planes = buffer.planes();
        let whole_rows = planes.iter().enumerate().all(|(index, plane)| {
            let (_, rows) = buffer.format().plane_size(index, self.width, self.height);
            plane.stride().checked_mul(rows) == Some(plane.data().len())
        });

        let encoded = if whole_rows {
            let yuv = YUVSlices::new(
                (planes[0].data(), planes[1].data(), planes[2].data()),
                (width, height),
                (planes[0].stride(), planes[1].stride(), planes[2].stride()),
            );
            self.encoder.encode(&yuv).map(|bitstream| bitstream.to_vec())
        } else {
            let yuv = YUVBuffer::from_vec(buffer.to_packed(), width, height);
            self.encoder.encode(&yuv).map(|bitstream| bitstream.to_vec())
        };
        encoded.map_err(|e| Error::SendFailed(format!("Encode failed: {}", e)))
    }
}

impl EncoderBackend for OpenH264Encoder {
    fn name(&self) -> &str {
        "openh264"
    }

    fn send_frame(&mut self, frame: Option<&FrameDescriptor>) -> Result<()> {
        if self.flushed {
            return Err(Error::SendFailed("encoder already flushed".to_string()));
        }
        let Some(frame) = frame else {
            self.flushed = true;
            return Ok(());
        };

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

        if std::mem::take(&mut self.force_key) || self.frames_sent % self.gop_size == 0 {
            self.encoder.force_intra_frame();
        }

        let data = self.encode(buffer)?;
        self.frames_sent += 1;

        // Skipped pictures produce no output
        if !data.is_empty() {
            let is_keyframe = h264_is_keyframe(&data);
            self.ready.push_back(EncodedPacket {
                data,
                pts: frame.pts,
                is_keyframe,
            });
        }
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Received> {
        match self.ready.pop_front() {
            Some(packet) => Ok(Received::Packet(packet)),
            None if self.flushed => Ok(Received::EndOfStream),
            None => Ok(Received::NotReady),
        }
    }

    fn force_keyframe(&mut self) {
        self.force_key = true;
    }
}
