//! avenc - real-time RGBA frame encoding sessions
//!
//! Raw interleaved RGBA frames are converted to planar YUV 4:2:0 and driven
//! through a buffering encoder, producing a raw elementary stream:
//! - [`SessionConfig`]: validated encoding parameters
//! - [`EncoderSession`]: send/drain handshake, flush and lifecycle
//! - [`convert::ColorConverter`]: RGBA to YUV 4:2:0 conversion
//! - [`sink::BitstreamSink`]: where callers put the packets

pub mod bitstream;
pub mod config;
pub mod convert;
pub mod encoder;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod session;
pub mod sink;

pub use config::{LatencyProfile, QualityBounds, SessionConfig};
pub use convert::{ChromaFilter, ColorConverter, Yuv420Converter};
pub use error::{Error, Result};
pub use frame::{EncodedPacket, FrameDescriptor, PixelBuffer, PixelFormat};
pub use session::{EncoderSession, SessionBuilder, SessionState, SessionStats};

/// Video codec families with a built-in encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub enum Codec {
    /// AV1 codec (using rav1e)
    Av1 = 0,
    /// H.264 codec (using OpenH264)
    H264 = 1,
}

impl Codec {
    /// Resolve a codec identifier, ignoring case
    pub fn from_name(name: &str) -> Option<Codec> {
        match name.trim().to_ascii_lowercase().as_str() {
            "h264" | "h.264" | "avc" | "openh264" | "libopenh264" => Some(Codec::H264),
            "av1" | "rav1e" | "librav1e" => Some(Codec::Av1),
            _ => None,
        }
    }

    /// Canonical identifier for this codec
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Codec::Av1 => "av1",
            Codec::H264 => "h264",
        }
    }
}

/// Check if a codec is compiled into this build
pub fn available(codec: Codec) -> Result<()> {
    match codec {
        Codec::Av1 => {
            #[cfg(feature = "av1")]
            {
                Ok(())
            }
            #[cfg(not(feature = "av1"))]
            {
                Err(Error::CodecUnavailable(
                    "AV1 support not compiled in".to_string(),
                ))
            }
        }
        Codec::H264 => {
            #[cfg(feature = "h264")]
            {
                Ok(())
            }
            #[cfg(not(feature = "h264"))]
            {
                Err(Error::CodecUnavailable(
                    "H.264 support not compiled in".to_string(),
                ))
            }
        }
    }
}
