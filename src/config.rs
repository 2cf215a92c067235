//! Session configuration

use crate::convert::ChromaFilter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted frame dimension
pub const MAX_DIMENSION: u32 = 16384;

/// Highest quantiser on the H.264 scale used for quality bounds
pub const MAX_QUANTIZER: u8 = 51;

/// Most encoder worker threads a backend can be asked for
pub const MAX_THREADS: u32 = u16::MAX as u32;

/// Latency profile, selects preset/tuning defaults for the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatencyProfile {
    /// Reordering and lookahead allowed
    #[default]
    Standard,
    /// No B-frames, minimal lookahead, fastest preset
    LowLatency,
}

/// Min/max quantiser bounds on the 0..=51 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityBounds {
    pub min_q: u8,
    pub max_q: u8,
}

impl QualityBounds {
    /// Bounds used by the low-latency preset of the reference encoder
    pub const LOW_LATENCY: QualityBounds = QualityBounds {
        min_q: 15,
        max_q: 35,
    };
}

/// Encoding parameters, immutable once passed to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Codec identifier, e.g. "h264" or "av1"
    pub codec: String,
    /// Frame width, positive and even
    pub width: u32,
    /// Frame height, positive and even
    pub height: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Frame rate; the encoder time base is 1/fps
    pub fps: u32,
    /// Frames between forced keyframes
    pub gop_size: u32,
    /// Maximum consecutive B-frames, 0 for lowest latency
    pub max_b_frames: u32,
    /// Optional quantiser bounds
    pub quality: Option<QualityBounds>,
    /// Encoder worker threads, never auto-detected
    pub threads: u32,
    pub latency: LatencyProfile,
    /// Chroma downsampling filter used by the default converter
    pub chroma_filter: ChromaFilter,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            codec: "h264".to_string(),
            width: 352,
            height: 288,
            bitrate: 400_000,
            fps: 25,
            gop_size: 10,
            max_b_frames: 0,
            quality: None,
            threads: 1,
            latency: LatencyProfile::Standard,
            chroma_filter: ChromaFilter::Bilinear,
        }
    }
}

impl SessionConfig {
    /// Create a config with default rate-control settings
    pub fn new(codec: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            codec: codec.into(),
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = gop_size;
        self
    }

    pub fn with_max_b_frames(mut self, max_b_frames: u32) -> Self {
        self.max_b_frames = max_b_frames;
        self
    }

    pub fn with_quality(mut self, min_q: u8, max_q: u8) -> Self {
        self.quality = Some(QualityBounds { min_q, max_q });
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_latency(mut self, latency: LatencyProfile) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_chroma_filter(mut self, filter: ChromaFilter) -> Self {
        self.chroma_filter = filter;
        self
    }

    /// B-frame count the encoder is actually configured with.
    ///
    /// The low-latency profile disables reordering whatever was requested.
    pub fn effective_b_frames(&self) -> u32 {
        match self.latency {
            LatencyProfile::LowLatency => 0,
            LatencyProfile::Standard => self.max_b_frames,
        }
    }

    /// Quality bounds the encoder is actually configured with
    pub fn effective_quality(&self) -> Option<QualityBounds> {
        match (self.quality, self.latency) {
            (Some(bounds), _) => Some(bounds),
            (None, LatencyProfile::LowLatency) => Some(QualityBounds::LOW_LATENCY),
            (None, LatencyProfile::Standard) => None,
        }
    }

    /// Validate the config without touching any encoder resources
    pub fn validate(&self) -> Result<()> {
        if self.codec.trim().is_empty() {
            return Err(Error::Config("codec identifier is empty".to_string()));
        }
        validate_dimension("width", self.width)?;
        validate_dimension("height", self.height)?;

        if self.bitrate == 0 {
            return Err(Error::Config("bitrate must be positive".to_string()));
        }
        if self.fps == 0 {
            return Err(Error::Config("fps must be positive".to_string()));
        }
        if self.gop_size == 0 {
            return Err(Error::Config("gop size must be at least 1".to_string()));
        }
        if self.threads == 0 {
            return Err(Error::Config("thread count must be at least 1".to_string()));
        }
        if self.threads > MAX_THREADS {
            return Err(Error::Config(format!(
                "thread count {} exceeds maximum {}",
                self.threads, MAX_THREADS
            )));
        }
        if let Some(bounds) = self.quality {
            if bounds.max_q > MAX_QUANTIZER {
                return Err(Error::Config(format!(
                    "max quantizer {} exceeds {}",
                    bounds.max_q, MAX_QUANTIZER
                )));
            }
            if bounds.min_q > bounds.max_q {
                return Err(Error::Config(format!(
                    "min quantizer {} is above max quantizer {}",
                    bounds.min_q, bounds.max_q
                )));
            }
        }

        Ok(())
    }
}

fn validate_dimension(name: &str, value: u32) -> Result<()> {
    if value < 2 {
        return Err(Error::Config(format!("{} must be at least 2, got {}", name, value)));
    }
    // 4:2:0 subsampling needs whole chroma samples
    if value % 2 != 0 {
        return Err(Error::Config(format!("{} must be even, got {}", name, value)));
    }
    if value > MAX_DIMENSION {
        return Err(Error::Config(format!(
            "{} {} exceeds maximum {}",
            name, value, MAX_DIMENSION
        )));
    }
    Ok(())
}
