//! RGBA to planar YUV 4:2:0 conversion
//!
//! Uses BT.601 limited-range coefficients in 8.8 fixed point, so output is
//! bit-exact across platforms. Chroma is produced at half resolution in both
//! dimensions, either from the top-left pixel of each 2x2 block or from the
//! block average.

use crate::frame::{PixelBuffer, PixelFormat, DEFAULT_ALIGN};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Chroma downsampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChromaFilter {
    /// Nearest neighbour: top-left pixel of each 2x2 block
    Point,
    /// Average of each 2x2 block
    #[default]
    Bilinear,
}

/// Strategy for turning interleaved RGBA into planar YUV 4:2:0
pub trait ColorConverter: Send {
    /// Convert `src` into `dst`. Both must share width and height.
    fn convert(&self, src: &PixelBuffer, dst: &mut PixelBuffer) -> Result<()>;

    /// Convert into a freshly allocated buffer
    fn convert_new(&self, src: &PixelBuffer) -> Result<PixelBuffer> {
        let mut dst = PixelBuffer::alloc(
            PixelFormat::Yuv420p,
            src.width(),
            src.height(),
            DEFAULT_ALIGN,
        )
        .map_err(|e| Error::Conversion(e.to_string()))?;
        self.convert(src, &mut dst)?;
        Ok(dst)
    }
}

/// BT.601 RGBA to YUV 4:2:0 converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Yuv420Converter {
    filter: ChromaFilter,
}

impl Yuv420Converter {
    pub fn new(filter: ChromaFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> ChromaFilter {
        self.filter
    }
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8
}

#[inline]
fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let u = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
    let v = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
    (u, v)
}

fn check_geometry(src: &PixelBuffer, dst: &PixelBuffer) -> Result<()> {
    if src.format() != PixelFormat::Rgba {
        return Err(Error::Conversion(format!(
            "unsupported source format {:?}",
            src.format()
        )));
    }
    if dst.format() != PixelFormat::Yuv420p {
        return Err(Error::Conversion(format!(
            "unsupported destination format {:?}",
            dst.format()
        )));
    }
    if src.width() % 2 != 0 || src.height() % 2 != 0 {
        return Err(Error::Conversion(format!(
            "4:2:0 needs even dimensions, got {}x{}",
            src.width(),
            src.height()
        )));
    }
    if (src.width(), src.height()) != (dst.width(), dst.height()) {
        return Err(Error::Conversion(format!(
            "source is {}x{} but destination is {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    Ok(())
}

impl ColorConverter for Yuv420Converter {
    fn convert(&self, src: &PixelBuffer, dst: &mut PixelBuffer) -> Result<()> {
        check_geometry(src, dst)?;

        let w = src.width() as usize;
        let h = src.height() as usize;
        let rgba = &src.planes()[0];
        let (y_plane, uv_planes) = dst.planes_mut().split_at_mut(1);
        let y_plane = &mut y_plane[0];
        let (u_plane, v_plane) = uv_planes.split_at_mut(1);
        let (u_plane, v_plane) = (&mut u_plane[0], &mut v_plane[0]);

        // Pass 1: luma, row by row
        for y in 0..h {
            let src_row = rgba.row(y, w * 4);
            let dst_row = y_plane.row_mut(y, w);
            for (px, out) in src_row.chunks_exact(4).zip(dst_row.iter_mut()) {
                *out = luma(px[0] as i32, px[1] as i32, px[2] as i32);
            }
        }

        // Pass 2: chroma, one sample per 2x2 block
        let (cw, ch) = (w / 2, h / 2);
        for cy in 0..ch {
            let top = rgba.row(cy * 2, w * 4);
            let bottom = rgba.row(cy * 2 + 1, w * 4);
            let u_row = u_plane.row_mut(cy, cw);
            let v_row = v_plane.row_mut(cy, cw);
            for cx in 0..cw {
                let i = cx * 8;
                let (r, g, b) = match self.filter {
                    ChromaFilter::Point => (top[i] as i32, top[i + 1] as i32, top[i + 2] as i32),
                    ChromaFilter::Bilinear => {
                        let avg = |c: usize| {
                            (top[i + c] as i32
                                + top[i + 4 + c] as i32
                                + bottom[i + c] as i32
                                + bottom[i + 4 + c] as i32
                                + 2)
                                >> 2
                        };
                        (avg(0), avg(1), avg(2))
                    }
                };
                (u_row[cx], v_row[cx]) = chroma(r, g, b);
            }
        }

        Ok(())
    }
}
