//! Video encoder backends
//!
//! Every backend speaks the same buffered protocol: hand a frame (or the
//! end-of-stream signal) to [`EncoderBackend::send_frame`], then pull
//! [`EncoderBackend::receive_packet`] until it reports [`Received::NotReady`]
//! or [`Received::EndOfStream`].

#[cfg(feature = "av1")]
pub mod av1;

#[cfg(feature = "h264")]
pub mod h264;

use crate::config::SessionConfig;
use crate::frame::{EncodedPacket, FrameDescriptor};
use crate::{Codec, Error, Result};

/// Outcome of one drain attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A finished packet
    Packet(EncodedPacket),
    /// Nothing ready; send more input first
    NotReady,
    /// Flush completed, no more output will ever be produced
    EndOfStream,
}

/// Stateful block encoder
pub trait EncoderBackend: Send {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Queue a planar YUV 4:2:0 frame, or `None` to signal end of stream
    fn send_frame(&mut self, frame: Option<&FrameDescriptor>) -> Result<()>;

    /// Pull the next finished packet
    fn receive_packet(&mut self) -> Result<Received>;

    /// Code the next sent frame as a keyframe
    fn force_keyframe(&mut self) {}
}

/// Builds encoder backends for a validated config
pub trait EncoderFactory {
    /// Whether `codec` names an encoder this factory can build
    fn supports(&self, codec: &str) -> bool;

    /// Allocate and open an encoder
    fn create(&self, config: &SessionConfig) -> Result<Box<dyn EncoderBackend>>;
}

/// Factory for the encoders compiled into this crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEncoders;

impl EncoderFactory for BuiltinEncoders {
    fn supports(&self, codec: &str) -> bool {
        Codec::from_name(codec).is_some_and(|c| crate::available(c).is_ok())
    }

    fn create(&self, config: &SessionConfig) -> Result<Box<dyn EncoderBackend>> {
        let codec = Codec::from_name(&config.codec)
            .ok_or_else(|| Error::Config(format!("unknown codec '{}'", config.codec)))?;
        create_encoder(codec, config)
    }
}

/// Create an encoder for the specified codec
pub fn create_encoder(codec: Codec, config: &SessionConfig) -> Result<Box<dyn EncoderBackend>> {
    match codec {
        #[cfg(feature = "av1")]
        Codec::Av1 => Ok(Box::new(av1::Av1Encoder::new(config)?)),
        #[cfg(not(feature = "av1"))]
        Codec::Av1 => {
            let _ = config;
            Err(Error::CodecUnavailable(
                "AV1 support not compiled in".to_string(),
            ))
        }
        #[cfg(feature = "h264")]
        Codec::H264 => Ok(Box::new(h264::OpenH264Encoder::new(config)?)),
        #[cfg(not(feature = "h264"))]
        Codec::H264 => {
            let _ = config;
            Err(Error::CodecUnavailable(
                "H.264 support not compiled in".to_string(),
            ))
        }
    }
}
