//! Common test utilities

#![allow(dead_code)]

use avenc::encoder::{EncoderBackend, EncoderFactory, Received};
use avenc::{
    ColorConverter, EncodedPacket, Error, FrameDescriptor, PixelBuffer, PixelFormat, Result,
    SessionConfig, Yuv420Converter,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts live encoder handles so tests can check nothing leaks
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    live: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

impl Tracker {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Handle {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        Handle {
            live: self.live.clone(),
        }
    }
}

/// One tracked resource, released on drop
pub struct Handle {
    live: Arc<AtomicUsize>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Where the stub should fail, if anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Fail inside `create` after acquiring a handle
    Open,
    /// Reject the nth frame sent (0-based)
    Send(u64),
    /// Fail the drain after the nth frame sent (0-based)
    Receive(u64),
    /// Reject the end-of-stream signal
    Flush,
    /// Report not-ready instead of end of stream once flushed
    NotReadyAfterFlush,
}

/// Deterministic encoder stub.
///
/// Holds `b_frames` frames back like a reordering encoder, emits exactly one
/// packet per frame in pts order, never drops frames. Payloads are fake
/// Annex-B units: IDR for keyframes, non-IDR slices otherwise.
pub struct StubEncoder {
    _handle: Handle,
    held: VecDeque<(i64, bool)>,
    depth: usize,
    gop: u64,
    sent: u64,
    force_key: bool,
    flushed: bool,
    fault: Fault,
}

impl StubEncoder {
    fn payload(pts: i64, key: bool) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x01, if key { 0x65 } else { 0x41 }];
        data.extend_from_slice(&pts.to_be_bytes());
        data
    }
}

impl EncoderBackend for StubEncoder {
    fn name(&self) -> &str {
        "stub"
    }

    fn send_frame(&mut self, frame: Option<&FrameDescriptor>) -> Result<()> {
        let Some(frame) = frame else {
            if self.fault == Fault::Flush {
                return Err(Error::SendFailed("stub rejected end of stream".to_string()));
            }
            self.flushed = true;
            return Ok(());
        };
        if self.flushed {
            return Err(Error::SendFailed("frame after flush".to_string()));
        }
        if self.fault == Fault::Send(self.sent) {
            return Err(Error::SendFailed("stub rejected frame".to_string()));
        }
        assert_eq!(frame.buffer.format(), PixelFormat::Yuv420p);

        let key = std::mem::take(&mut self.force_key) || self.sent % self.gop == 0;
        self.held.push_back((frame.pts, key));
        self.sent += 1;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Received> {
        if let Fault::Receive(n) = self.fault {
            if self.sent > n {
                return Err(Error::ReceiveFailed("stub drain failure".to_string()));
            }
        }
        if self.held.len() > self.depth || (self.flushed && !self.held.is_empty()) {
            let (pts, key) = self.held.pop_front().expect("held frame");
            return Ok(Received::Packet(EncodedPacket {
                data: Self::payload(pts, key),
                pts,
                is_keyframe: key,
            }));
        }
        if self.flushed && self.fault != Fault::NotReadyAfterFlush {
            Ok(Received::EndOfStream)
        } else {
            Ok(Received::NotReady)
        }
    }

    fn force_keyframe(&mut self) {
        self.force_key = true;
    }
}

/// Factory producing [`StubEncoder`]s for the codec name "stub"
#[derive(Clone, Default)]
pub struct StubFactory {
    pub tracker: Tracker,
    pub fault: Fault,
}

impl StubFactory {
    pub fn with_fault(fault: Fault) -> Self {
        Self {
            fault,
            ..Default::default()
        }
    }
}

impl EncoderFactory for StubFactory {
    fn supports(&self, codec: &str) -> bool {
        codec == "stub"
    }

    fn create(&self, config: &SessionConfig) -> Result<Box<dyn EncoderBackend>> {
        let handle = self.tracker.acquire();
        if self.fault == Fault::Open {
            // `handle` is released on this early return
            return Err(Error::Open("stub refused to open".to_string()));
        }
        Ok(Box::new(StubEncoder {
            _handle: handle,
            held: VecDeque::new(),
            depth: config.effective_b_frames() as usize,
            gop: config.gop_size as u64,
            sent: 0,
            force_key: false,
            flushed: false,
            fault: self.fault,
        }))
    }
}

/// Converter that counts its calls and delegates to the BT.601 converter
#[derive(Clone, Default)]
pub struct CountingConverter {
    pub calls: Arc<AtomicUsize>,
    inner: Yuv420Converter,
}

impl CountingConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ColorConverter for CountingConverter {
    fn convert(&self, src: &PixelBuffer, dst: &mut PixelBuffer) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.convert(src, dst)
    }
}

/// Stub session config
pub fn stub_config(width: u32, height: u32) -> SessionConfig {
    SessionConfig::new("stub", width, height)
}

/// Solid-color RGBA frame
pub fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> PixelBuffer {
    let data = rgba
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 4)
        .collect();
    PixelBuffer::rgba(width, height, data).expect("valid rgba frame")
}

/// Frame `i` of a solid red ramp, like the reference encoder's dummy image
pub fn ramp_frame(width: u32, height: u32, i: u32) -> PixelBuffer {
    solid_frame(width, height, [(i * 10).min(255) as u8, 0, 0, 255])
}

/// Frame with a horizontal/vertical gradient so chroma filters differ
pub fn gradient_frame(width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 256) as u8,
                255,
            ]);
        }
    }
    PixelBuffer::rgba(width, height, data).expect("valid rgba frame")
}

/// Copy a packed RGBA buffer into one whose rows are padded to `stride`
pub fn with_padding(buffer: &PixelBuffer, stride: usize) -> PixelBuffer {
    let row_bytes = buffer.width() as usize * 4;
    let src = buffer.plane(0).expect("rgba plane");
    let mut data = vec![0xEE; stride * buffer.height() as usize];
    for y in 0..buffer.height() as usize {
        data[y * stride..y * stride + row_bytes].copy_from_slice(src.row(y, row_bytes));
    }
    PixelBuffer::rgba_with_stride(buffer.width(), buffer.height(), data, stride)
        .expect("valid padded frame")
}
