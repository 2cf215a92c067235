//! Pixel buffers, frames and encoded packets

use crate::{Error, Result};
use image::RgbaImage;

/// Row alignment used for buffers the library allocates itself
pub const DEFAULT_ALIGN: usize = 32;

/// Pixel layout of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One interleaved plane, 4 bytes per pixel (R, G, B, A)
    Rgba,
    /// Three planes: full-size Y, half-size Cb and Cr
    Yuv420p,
}

impl PixelFormat {
    /// Number of planes for this format
    pub fn plane_count(&self) -> usize {
        match self {
            PixelFormat::Rgba => 1,
            PixelFormat::Yuv420p => 3,
        }
    }

    /// Width in bytes and height in rows of one plane
    pub fn plane_size(&self, index: usize, width: u32, height: u32) -> (usize, usize) {
        let (w, h) = (width as usize, height as usize);
        match (self, index) {
            (PixelFormat::Rgba, _) => (w * 4, h),
            (PixelFormat::Yuv420p, 0) => (w, h),
            (PixelFormat::Yuv420p, _) => (w.div_ceil(2), h.div_ceil(2)),
        }
    }
}

/// Bytes needed to hold `rows` rows `stride` apart, the last one `row_bytes`
/// long. `None` on overflow.
pub fn plane_len(stride: usize, rows: usize, row_bytes: usize) -> Option<usize> {
    stride.checked_mul(rows.saturating_sub(1))?.checked_add(row_bytes)
}

/// One plane of pixel data. `stride` may exceed the row width due to padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    stride: usize,
}

impl Plane {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes of row `y`, `len` bytes long, excluding padding
    pub fn row(&self, y: usize, len: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + len]
    }

    pub fn row_mut(&mut self, y: usize, len: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + len]
    }
}

/// Raw picture with per-plane strides, exclusively owned by its holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<Plane>,
}

impl PixelBuffer {
    /// Wrap tightly packed RGBA data (`width * height * 4` bytes)
    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::rgba_with_stride(width, height, data, width as usize * 4)
    }

    /// Wrap RGBA data whose rows are `stride` bytes apart
    pub fn rgba_with_stride(width: u32, height: u32, data: Vec<u8>, stride: usize) -> Result<Self> {
        Self::from_planes(PixelFormat::Rgba, width, height, vec![(data, stride)])
    }

    /// Build a buffer from explicit planes, checking strides and lengths
    pub fn from_planes(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<(Vec<u8>, usize)>,
    ) -> Result<Self> {
        Self::from_plane_vec(
            format,
            width,
            height,
            planes
                .into_iter()
                .map(|(data, stride)| Plane { data, stride })
                .collect(),
        )
    }

    fn from_plane_vec(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<Plane>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Conversion(format!(
                "empty picture {}x{}",
                width, height
            )));
        }
        if planes.len() != format.plane_count() {
            return Err(Error::Conversion(format!(
                "{:?} needs {} planes, got {}",
                format,
                format.plane_count(),
                planes.len()
            )));
        }
        for (index, plane) in planes.iter().enumerate() {
            let (row_bytes, rows) = format.plane_size(index, width, height);
            if plane.stride < row_bytes {
                return Err(Error::Conversion(format!(
                    "plane {} stride {} is shorter than row width {}",
                    index, plane.stride, row_bytes
                )));
            }
            let needed = plane_len(plane.stride, rows, row_bytes).ok_or_else(|| {
                Error::Conversion(format!(
                    "plane {} stride {} overflows for {} rows",
                    index, plane.stride, rows
                ))
            })?;
            if plane.data.len() < needed {
                return Err(Error::Conversion(format!(
                    "plane {} holds {} bytes, needs {}",
                    index,
                    plane.data.len(),
                    needed
                )));
            }
        }

        Ok(Self {
            width,
            height,
            format,
            planes,
        })
    }

    /// Allocate a zeroed buffer with rows aligned to `align` bytes.
    ///
    /// Allocation failure is reported instead of aborting.
    pub fn alloc(format: PixelFormat, width: u32, height: u32, align: usize) -> Result<Self> {
        let align = align.max(1).next_power_of_two();
        let mut planes = Vec::with_capacity(format.plane_count());

        for index in 0..format.plane_count() {
            let (row_bytes, rows) = format.plane_size(index, width, height);
            let stride = (row_bytes + align - 1) & !(align - 1);
            let len = stride * rows;

            let mut data = Vec::new();
            data.try_reserve_exact(len).map_err(|e| {
                Error::Open(format!("cannot allocate {} byte plane: {}", len, e))
            })?;
            data.resize(len, 0);
            planes.push(Plane { data, stride });
        }

        Self::from_plane_vec(format, width, height, planes)
    }

    /// Copy an `image` RGBA picture into a tightly packed buffer
    pub fn from_rgba_image(img: &RgbaImage) -> Result<Self> {
        Self::rgba(img.width(), img.height(), img.as_raw().clone())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [Plane] {
        &mut self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }

    pub fn plane_mut(&mut self, index: usize) -> Option<&mut Plane> {
        self.planes.get_mut(index)
    }

    /// Fill every pixel of an RGBA buffer with one color
    pub fn fill_rgba(&mut self, rgba: [u8; 4]) -> Result<()> {
        if self.format != PixelFormat::Rgba {
            return Err(Error::Conversion(format!(
                "cannot fill {:?} buffer with RGBA",
                self.format
            )));
        }
        let row_bytes = self.width as usize * 4;
        let plane = &mut self.planes[0];
        for y in 0..self.height as usize {
            for px in plane.row_mut(y, row_bytes).chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
        Ok(())
    }

    /// Copy the planes into one contiguous, unpadded vector (Y then Cb then Cr)
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (index, plane) in self.planes.iter().enumerate() {
            let (row_bytes, rows) = self.format.plane_size(index, self.width, self.height);
            for y in 0..rows {
                out.extend_from_slice(plane.row(y, row_bytes));
            }
        }
        out
    }
}

/// A picture plus its presentation timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub buffer: PixelBuffer,
    pub pts: i64,
}

impl FrameDescriptor {
    pub fn new(buffer: PixelBuffer, pts: i64) -> Self {
        Self { buffer, pts }
    }
}

/// Compressed output unit; the receiver owns the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Encoder-native access unit bytes
    pub data: Vec<u8>,
    /// Presentation timestamp in time base units
    pub pts: i64,
    /// Is this a keyframe?
    pub is_keyframe: bool,
}

impl EncodedPacket {
    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
