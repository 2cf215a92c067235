//! Integration tests for the built-in encoders

mod common;

#[allow(unused_imports)]
use common::*;
use avenc::{available, Codec, Error, EncoderSession, SessionConfig};

/// Compiled-in codecs report as available
#[test]
fn test_codec_availability() {
    let result = available(Codec::Av1);
    #[cfg(feature = "av1")]
    assert!(result.is_ok(), "AV1 should be available: {:?}", result);
    #[cfg(not(feature = "av1"))]
    assert!(matches!(result, Err(Error::CodecUnavailable(_))));

    let result = available(Codec::H264);
    #[cfg(feature = "h264")]
    assert!(result.is_ok(), "H.264 should be available: {:?}", result);
    #[cfg(not(feature = "h264"))]
    assert!(matches!(result, Err(Error::CodecUnavailable(_))));
}

/// Built-in sessions reject bad configs before touching a codec
#[test]
fn test_builtin_rejects_invalid_config() {
    let result = EncoderSession::open(SessionConfig::new("h264", 352, 287));
    assert!(matches!(result, Err(Error::Config(_))));

    let result = EncoderSession::open(SessionConfig::new("h264", 352, 288).with_fps(0));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[cfg(feature = "h264")]
mod h264 {
    use super::common::*;
    use avenc::bitstream::{has_access_unit_prefix, SEQUENCE_END_CODE};
    use avenc::sink::{BitstreamSink, ElementaryStreamWriter};
    use avenc::{Codec, EncodedPacket, EncoderSession, FrameDescriptor, SessionConfig, SessionState};
    use std::fs::File;
    use std::io::BufWriter;

    fn encode_clip(frames: i64) -> Vec<EncodedPacket> {
        let config = SessionConfig::new("H264", 352, 288)
            .with_bitrate(400_000)
            .with_gop_size(10)
            .with_max_b_frames(1);
        let mut session = EncoderSession::open(config).unwrap();
        assert_eq!(session.codec(), Some(Codec::H264));

        let mut packets = Vec::new();
        for pts in 0..frames {
            let frame = FrameDescriptor::new(ramp_frame(352, 288, pts as u32), pts);
            packets.extend(session.submit_frame(Some(frame)).unwrap());
        }
        packets.extend(session.flush().unwrap());
        assert_eq!(session.state(), SessionState::Closed);
        packets
    }

    /// 25 frames of CIF video encode to a decodable-looking stream
    #[test]
    fn test_h264_end_to_end() {
        let packets = encode_clip(25);

        assert!(!packets.is_empty());
        assert!(packets.len() <= 25);
        assert!(packets[0].is_keyframe);
        assert!(has_access_unit_prefix(Codec::H264, &packets[0].data));
        assert!(packets.windows(2).all(|w| w[0].pts <= w[1].pts));
        assert!(packets.iter().map(|p| p.size()).sum::<usize>() > 0);
    }

    /// Packets written back to back form the elementary stream file
    #[test]
    fn test_h264_to_file() {
        let packets = encode_clip(12);
        let total: usize = packets.iter().map(|p| p.size()).sum();
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("plain.h264");
        let mut sink = ElementaryStreamWriter::new(BufWriter::new(File::create(&plain).unwrap()));
        sink.consume_all(packets.clone()).unwrap();
        assert_eq!(sink.bytes_written(), total as u64);
        sink.finish(false).unwrap();

        let bytes = std::fs::read(&plain).unwrap();
        assert_eq!(bytes.len(), total);
        assert_eq!(&bytes[..packets[0].size()], packets[0].data.as_slice());

        let marked = dir.path().join("marked.h264");
        let mut sink = ElementaryStreamWriter::new(BufWriter::new(File::create(&marked).unwrap()));
        sink.consume_all(packets).unwrap();
        sink.finish(true).unwrap();

        let bytes = std::fs::read(&marked).unwrap();
        assert_eq!(bytes.len(), total + SEQUENCE_END_CODE.len());
        assert!(bytes.ends_with(&SEQUENCE_END_CODE));
    }

    /// Forced keyframes land on the requested frame
    #[test]
    fn test_h264_forced_keyframe() {
        let config = SessionConfig::new("openh264", 64, 64).with_gop_size(100);
        let mut session = EncoderSession::open(config).unwrap();

        let mut packets = Vec::new();
        for i in 0..6 {
            if i == 3 {
                session.request_keyframe().unwrap();
            }
            packets.extend(session.submit_pixels(ramp_frame(64, 64, i)).unwrap());
        }
        packets.extend(session.flush().unwrap());

        assert!(packets[0].is_keyframe);
        assert!(packets.iter().any(|p| p.pts == 3 && p.is_keyframe));
    }
}

#[cfg(feature = "av1")]
mod av1 {
    use super::common::*;
    use avenc::bitstream::has_access_unit_prefix;
    use avenc::{Codec, EncoderSession, LatencyProfile, SessionConfig, SessionState};

    /// A short low-latency AV1 clip encodes and flushes cleanly
    #[test]
    fn test_av1_low_latency() {
        let config = SessionConfig::new("av1", 64, 64)
            .with_bitrate(200_000)
            .with_latency(LatencyProfile::LowLatency);
        let mut session = EncoderSession::open(config).unwrap();
        assert_eq!(session.backend_name(), "rav1e");

        let mut packets = Vec::new();
        for i in 0..5 {
            packets.extend(session.submit_pixels(ramp_frame(64, 64, i)).unwrap());
        }
        packets.extend(session.flush().unwrap());

        assert_eq!(session.state(), SessionState::Closed);
        assert!(!packets.is_empty());
        assert!(packets[0].is_keyframe);
        assert!(has_access_unit_prefix(Codec::Av1, &packets[0].data));
        assert!(packets.windows(2).all(|w| w[0].pts <= w[1].pts));
    }
}
