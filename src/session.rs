//! Encoding session: conversion, send/drain handshake and flush
//!
//! A session is created open by [`SessionBuilder::open`], accepts frames
//! while [`SessionState::Open`], and ends in [`SessionState::Closed`] after
//! [`EncoderSession::flush`] or after any fatal error. Closed is terminal:
//! every further call returns [`Error::State`].

use crate::config::SessionConfig;
use crate::convert::{ColorConverter, Yuv420Converter};
use crate::encoder::{BuiltinEncoders, EncoderBackend, EncoderFactory, Received};
use crate::frame::{EncodedPacket, FrameDescriptor, PixelBuffer, PixelFormat, DEFAULT_ALIGN};
use crate::{Codec, Error, Result};

/// Lifecycle state of an [`EncoderSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting frames
    Open,
    /// End of stream signalled, draining buffered output
    Flushing,
    /// Terminal; only dropping the session is valid
    Closed,
}

/// Running totals for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_submitted: u64,
    pub packets_emitted: u64,
    pub bytes_emitted: u64,
}

/// Configures the strategies a session is opened with
pub struct SessionBuilder {
    config: SessionConfig,
    converter: Option<Box<dyn ColorConverter>>,
    factory: Box<dyn EncoderFactory>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            converter: None,
            factory: Box::new(BuiltinEncoders),
        }
    }

    /// Replace the default BT.601 converter
    pub fn converter(mut self, converter: impl ColorConverter + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    /// Replace the built-in encoder registry
    pub fn factory(mut self, factory: impl EncoderFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Validate the config, allocate the encoder and the planar buffer.
    ///
    /// On failure everything acquired so far is released before returning.
    pub fn open(self) -> Result<EncoderSession> {
        let SessionBuilder {
            config,
            converter,
            factory,
        } = self;

        config.validate()?;
        if !factory.supports(&config.codec) {
            return Err(Error::Config(format!(
                "codec identifier '{}' is not resolvable",
                config.codec
            )));
        }

        let converter =
            converter.unwrap_or_else(|| Box::new(Yuv420Converter::new(config.chroma_filter)));

        let backend = factory.create(&config).map_err(|e| match e {
            Error::Config(_) | Error::Open(_) => e,
            other => Error::Open(other.to_string()),
        })?;

        // `backend` is dropped here if this allocation fails
        let planar = PixelBuffer::alloc(
            PixelFormat::Yuv420p,
            config.width,
            config.height,
            DEFAULT_ALIGN,
        )?;

        log::info!(
            "Session opened: codec={} backend={} {}x{} bitrate={} gop={} b_frames={} threads={} latency={:?}",
            config.codec,
            backend.name(),
            config.width,
            config.height,
            config.bitrate,
            config.gop_size,
            config.effective_b_frames(),
            config.threads,
            config.latency
        );

        Ok(EncoderSession {
            staging: None,
            planar: FrameDescriptor::new(planar, 0),
            backend,
            converter,
            codec: Codec::from_name(&config.codec),
            config,
            state: SessionState::Open,
            next_pts: 0,
            last_pts: None,
            stats: SessionStats::default(),
        })
    }
}

/// A single-stream encoding session.
///
/// Calls must be serialized by the caller; the session does no locking.
pub struct EncoderSession {
    // Fields drop in declaration order, the reverse of acquisition.
    staging: Option<PixelBuffer>,
    planar: FrameDescriptor,
    backend: Box<dyn EncoderBackend>,
    converter: Box<dyn ColorConverter>,
    codec: Option<Codec>,
    config: SessionConfig,
    state: SessionState,
    next_pts: i64,
    last_pts: Option<i64>,
    stats: SessionStats,
}

impl EncoderSession {
    /// Open a session with the default converter and built-in encoders
    pub fn open(config: SessionConfig) -> Result<Self> {
        SessionBuilder::new(config).open()
    }

    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Built-in codec family, if the codec identifier names one
    pub fn codec(&self) -> Option<Codec> {
        self.codec
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Timestamp [`EncoderSession::submit_pixels`] will assign next
    pub fn next_pts(&self) -> i64 {
        self.next_pts
    }

    /// Submit a frame and return every packet the encoder has ready.
    ///
    /// `None` submits nothing and only drains. Packets returned now may
    /// belong to frames submitted in earlier calls.
    pub fn submit_frame(&mut self, frame: Option<FrameDescriptor>) -> Result<Vec<EncodedPacket>> {
        self.ensure_open("submit_frame")?;

        let Some(frame) = frame else {
            return self.drain(false).map_err(|e| self.fail(e));
        };

        if let Some(previous) = self.last_pts {
            if frame.pts < previous {
                return Err(Error::InvalidTimestamp {
                    previous,
                    got: frame.pts,
                });
            }
        }

        if let Err(e) = self.converter.convert(&frame.buffer, &mut self.planar.buffer) {
            let e = match e {
                Error::Conversion(_) => e,
                other => Error::Conversion(other.to_string()),
            };
            return Err(self.fail(e));
        }
        self.planar.pts = frame.pts;
        self.staging = Some(frame.buffer);

        log::debug!("Send frame {}", self.planar.pts);
        if let Err(e) = self.backend.send_frame(Some(&self.planar)) {
            let e = match e {
                Error::SendFailed(_) => e,
                other => Error::SendFailed(other.to_string()),
            };
            return Err(self.fail(e));
        }
        self.last_pts = Some(self.planar.pts);
        self.next_pts = self.planar.pts.saturating_add(1);
        self.stats.frames_submitted += 1;

        self.drain(false).map_err(|e| self.fail(e))
    }

    /// Submit a buffer stamped with the session's own timestamp counter
    pub fn submit_pixels(&mut self, buffer: PixelBuffer) -> Result<Vec<EncodedPacket>> {
        let pts = self.next_pts;
        self.submit_frame(Some(FrameDescriptor::new(buffer, pts)))
    }

    /// Signal end of stream and drain every buffered packet.
    ///
    /// Valid once; the session is closed afterwards.
    pub fn flush(&mut self) -> Result<Vec<EncodedPacket>> {
        self.ensure_open("flush")?;
        self.state = SessionState::Flushing;

        log::debug!("Flushing {} encoder", self.backend.name());
        if let Err(e) = self.backend.send_frame(None) {
            let e = match e {
                Error::SendFailed(_) => e,
                other => Error::SendFailed(other.to_string()),
            };
            return Err(self.fail(e));
        }

        let packets = self.drain(true).map_err(|e| self.fail(e))?;
        self.state = SessionState::Closed;

        log::info!(
            "Session closed: {} frames in, {} packets out, {} bytes",
            self.stats.frames_submitted,
            self.stats.packets_emitted,
            self.stats.bytes_emitted
        );
        Ok(packets)
    }

    /// Ask for the next submitted frame to be coded as a keyframe
    pub fn request_keyframe(&mut self) -> Result<()> {
        self.ensure_open("request_keyframe")?;
        self.backend.force_keyframe();
        Ok(())
    }

    /// Take back the most recently submitted RGBA buffer for refilling
    pub fn recycle_buffer(&mut self) -> Option<PixelBuffer> {
        self.staging.take()
    }

    /// Pull packets until the encoder has nothing ready, or until end of
    /// stream when flushing.
    fn drain(&mut self, until_end: bool) -> Result<Vec<EncodedPacket>> {
        let mut packets = Vec::new();
        loop {
            match self.backend.receive_packet()? {
                Received::Packet(packet) => {
                    log::debug!(
                        "Write packet {} (size={}, key={})",
                        packet.pts,
                        packet.size(),
                        packet.is_keyframe
                    );
                    self.stats.packets_emitted += 1;
                    self.stats.bytes_emitted += packet.size() as u64;
                    packets.push(packet);
                }
                Received::NotReady if until_end => {
                    return Err(Error::ReceiveFailed(
                        "encoder reported not-ready after end of stream".to_string(),
                    ));
                }
                Received::NotReady | Received::EndOfStream => return Ok(packets),
            }
        }
    }

    fn ensure_open(&self, op: &str) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            state => Err(Error::State(format!("{} called in state {:?}", op, state))),
        }
    }

    /// Close the session after a fatal error and hand the error back
    fn fail(&mut self, err: Error) -> Error {
        let err = match err {
            Error::Conversion(_) | Error::SendFailed(_) | Error::ReceiveFailed(_) => err,
            other => Error::ReceiveFailed(other.to_string()),
        };
        log::warn!("Closing {} session: {}", self.backend.name(), err);
        self.state = SessionState::Closed;
        err
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            log::debug!(
                "Session dropped while {:?}, buffered frames discarded",
                self.state
            );
        }
    }
}
