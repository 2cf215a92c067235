//! FFI (Foreign Function Interface) for C interoperability
//!
//! A session is an opaque pointer created by `avenc_open` and released by
//! `avenc_free`. Packets are passed to a caller callback during `avenc_encode`
//! and `avenc_flush`; the payload pointer is only valid inside the callback.

use crate::error::ErrorCode;
use crate::frame::plane_len;
use crate::{EncodedPacket, EncoderSession, LatencyProfile, PixelBuffer, SessionConfig};
use libc::{c_char, c_void, size_t};
use std::ffi::{CStr, CString};
use std::ptr;
use std::slice;

/// FFI result structure
#[repr(C)]
pub struct FfiResult {
    pub code: ErrorCode,
    pub message: *mut c_char,
}

impl FfiResult {
    fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            message: ptr::null_mut(),
        }
    }

    fn error(code: ErrorCode, message: &str) -> Self {
        let c_message =
            CString::new(message).unwrap_or_else(|_| CString::new("Unknown error").unwrap());
        Self {
            code,
            message: c_message.into_raw(),
        }
    }

    fn from_error(err: &crate::Error) -> Self {
        Self::error(ErrorCode::from(err), &err.to_string())
    }
}

/// FFI view of an encoded packet
#[repr(C)]
pub struct FfiPacket {
    pub data: *const u8,
    pub size: size_t,
    pub pts: i64,
    pub is_keyframe: bool,
}

/// Packet callback; `packet` is valid only for the duration of the call
pub type FfiPacketCallback = Option<unsafe extern "C" fn(packet: *const FfiPacket, user_data: *mut c_void)>;

unsafe fn deliver(packets: Vec<EncodedPacket>, callback: FfiPacketCallback, user_data: *mut c_void) {
    let Some(callback) = callback else {
        return;
    };
    for packet in packets {
        let view = FfiPacket {
            data: packet.data.as_ptr(),
            size: packet.data.len(),
            pts: packet.pts,
            is_keyframe: packet.is_keyframe,
        };
        callback(&view, user_data);
    }
}

/// Open an encoding session
///
/// # Safety
/// - `codec_name` must be a valid null-terminated string
/// - `out_session` must be a valid pointer to writable storage
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn avenc_open(
    codec_name: *const c_char,
    width: u32,
    height: u32,
    bitrate: u32,
    fps: u32,
    gop_size: u32,
    max_b_frames: u32,
    threads: u32,
    low_latency: bool,
    out_session: *mut *mut EncoderSession,
) -> FfiResult {
    if codec_name.is_null() {
        return FfiResult::error(ErrorCode::InvalidConfig, "Codec name is null");
    }
    if out_session.is_null() {
        return FfiResult::error(ErrorCode::InvalidConfig, "Output session pointer is null");
    }
    *out_session = ptr::null_mut();

    let codec_name = match CStr::from_ptr(codec_name).to_str() {
        Ok(s) => s,
        Err(_) => return FfiResult::error(ErrorCode::InvalidConfig, "Invalid codec name"),
    };

    let latency = if low_latency {
        LatencyProfile::LowLatency
    } else {
        LatencyProfile::Standard
    };
    let config = SessionConfig::new(codec_name, width, height)
        .with_bitrate(bitrate)
        .with_fps(fps)
        .with_gop_size(gop_size)
        .with_max_b_frames(max_b_frames)
        .with_threads(threads)
        .with_latency(latency);

    match EncoderSession::open(config) {
        Ok(session) => {
            *out_session = Box::into_raw(Box::new(session));
            FfiResult::ok()
        }
        Err(e) => FfiResult::from_error(&e),
    }
}

/// Encode one RGBA frame, timestamped by the session's own counter
///
/// # Safety
/// - `session` must come from `avenc_open` and not have been freed
/// - `rgba` must point to `height` rows of `stride` bytes (the last row may
///   be only `width * 4` bytes long)
#[no_mangle]
pub unsafe extern "C" fn avenc_encode(
    session: *mut EncoderSession,
    rgba: *const u8,
    stride: size_t,
    callback: FfiPacketCallback,
    user_data: *mut c_void,
) -> FfiResult {
    if session.is_null() || rgba.is_null() {
        return FfiResult::error(ErrorCode::InvalidConfig, "Session or pixel pointer is null");
    }
    let session = &mut *session;
    let (width, height) = (session.config().width, session.config().height);

    let row_bytes = width as usize * 4;
    if stride < row_bytes {
        return FfiResult::error(ErrorCode::InvalidConfig, "Stride is shorter than a row");
    }
    let Some(len) = plane_len(stride, height as usize, row_bytes) else {
        return FfiResult::error(ErrorCode::InvalidConfig, "Stride overflows the frame size");
    };
    let pixels = slice::from_raw_parts(rgba, len);

    // Refill the previous frame's buffer when the layout matches
    let buffer = match session.recycle_buffer() {
        Some(mut buffer) if buffer.plane(0).is_some_and(|p| p.stride() == stride) => {
            if let Some(plane) = buffer.plane_mut(0) {
                plane.data_mut()[..len].copy_from_slice(pixels);
            }
            Ok(buffer)
        }
        _ => PixelBuffer::rgba_with_stride(width, height, pixels.to_vec(), stride),
    };

    let result = buffer.and_then(|buffer| session.submit_pixels(buffer));
    match result {
        Ok(packets) => {
            deliver(packets, callback, user_data);
            FfiResult::ok()
        }
        Err(e) => FfiResult::from_error(&e),
    }
}

/// Flush the encoder and deliver every remaining packet
///
/// # Safety
/// - `session` must come from `avenc_open` and not have been freed
#[no_mangle]
pub unsafe extern "C" fn avenc_flush(
    session: *mut EncoderSession,
    callback: FfiPacketCallback,
    user_data: *mut c_void,
) -> FfiResult {
    if session.is_null() {
        return FfiResult::error(ErrorCode::InvalidConfig, "Session is null");
    }
    match (*session).flush() {
        Ok(packets) => {
            deliver(packets, callback, user_data);
            FfiResult::ok()
        }
        Err(e) => FfiResult::from_error(&e),
    }
}

/// Release a session and every encoder resource it holds
///
/// # Safety
/// - `session` must come from `avenc_open` (or be null) and not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn avenc_free(session: *mut EncoderSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Free a result's message string
///
/// # Safety
/// - `result` must point to a valid `FfiResult` that was returned by an avenc function
#[no_mangle]
pub unsafe extern "C" fn avenc_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }

    let result = &mut *result;
    if !result.message.is_null() {
        // Reclaim the CString and let it drop
        let _ = CString::from_raw(result.message);
        result.message = ptr::null_mut();
    }
}

/// Get version string
#[no_mangle]
pub extern "C" fn avenc_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
