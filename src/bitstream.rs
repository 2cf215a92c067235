//! Elementary stream helpers: start codes, NAL types and OBU headers

use crate::Codec;

/// 4-byte Annex-B start code
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Legacy MPEG-1/2 sequence end code. Not meaningful for H.264 or AV1 streams.
pub const SEQUENCE_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB7];

/// H.264 NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalType {
    Slice,
    Idr,
    Sei,
    Sps,
    Pps,
    Aud,
    EndSeq,
    Other(u8),
}

impl From<u8> for NalType {
    fn from(header: u8) -> Self {
        match header & 0x1F {
            1 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndSeq,
            other => Self::Other(other),
        }
    }
}

/// Find the next start code at or after `start`.
///
/// Returns the offset of the start code and its length (3 or 4).
pub fn find_start_code(data: &[u8], start: usize) -> Option<(usize, usize)> {
    if start + 3 > data.len() {
        return None;
    }

    for i in start..data.len() - 2 {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                return Some((i, 3));
            }
            if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                return Some((i, 4));
            }
        }
    }

    None
}

/// Length of the start code `data` begins with, if any
pub fn start_code_len(data: &[u8]) -> Option<usize> {
    match data {
        [0x00, 0x00, 0x00, 0x01, ..] => Some(4),
        [0x00, 0x00, 0x01, ..] => Some(3),
        _ => None,
    }
}

/// Iterate over the NAL unit payloads (without start codes) of an Annex-B buffer
pub fn nal_units(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut next = find_start_code(data, 0);
    std::iter::from_fn(move || {
        let (pos, len) = next?;
        let body_start = pos + len;
        next = find_start_code(data, body_start);
        let body_end = next.map(|(p, _)| p).unwrap_or(data.len());
        Some(&data[body_start..body_end])
    })
    .filter(|nal| !nal.is_empty())
}

/// Whether an Annex-B access unit carries an IDR slice
pub fn h264_is_keyframe(data: &[u8]) -> bool {
    nal_units(data).any(|nal| NalType::from(nal[0]) == NalType::Idr)
}

/// Whether `data` starts with a well-formed AV1 OBU header.
///
/// Checks the forbidden bit and that the type is one of the defined OBU types.
pub fn av1_has_obu_header(data: &[u8]) -> bool {
    let Some(&header) = data.first() else {
        return false;
    };
    if header & 0x80 != 0 {
        return false;
    }
    let obu_type = (header >> 3) & 0x0F;
    matches!(obu_type, 1..=8 | 15)
}

/// Whether a packet begins with a valid access-unit prefix for `codec`
pub fn has_access_unit_prefix(codec: Codec, data: &[u8]) -> bool {
    match codec {
        Codec::H264 => start_code_len(data).is_some(),
        Codec::Av1 => av1_has_obu_header(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_start_code() {
        let data = [0xAA, 0x00, 0x00, 0x01, 0x67, 0x00, 0x00, 0x00, 0x01, 0x68];
        assert_eq!(find_start_code(&data, 0), Some((1, 3)));
        assert_eq!(find_start_code(&data, 4), Some((5, 4)));
        assert_eq!(find_start_code(&data, 9), None);
    }

    #[test]
    fn test_nal_units_and_keyframe() {
        let mut au = Vec::new();
        au.extend_from_slice(&START_CODE);
        au.extend_from_slice(&[0x67, 0x42]);
        au.extend_from_slice(&START_CODE);
        au.extend_from_slice(&[0x68, 0xCE]);
        au.extend_from_slice(&[0x00, 0x00, 0x01]);
        au.extend_from_slice(&[0x65, 0x88, 0x84]);

        let types: Vec<NalType> = nal_units(&au).map(|nal| NalType::from(nal[0])).collect();
        assert_eq!(types, vec![NalType::Sps, NalType::Pps, NalType::Idr]);
        assert!(h264_is_keyframe(&au));

        let p_slice = [0x00, 0x00, 0x00, 0x01, 0x41, 0x9A];
        assert!(!h264_is_keyframe(&p_slice));
    }

    #[test]
    fn test_access_unit_prefix() {
        assert!(has_access_unit_prefix(Codec::H264, &[0, 0, 0, 1, 0x67]));
        assert!(has_access_unit_prefix(Codec::H264, &[0, 0, 1, 0x67]));
        assert!(!has_access_unit_prefix(Codec::H264, &[0x67, 0, 0, 1]));

        // Temporal delimiter OBU with size field
        assert!(has_access_unit_prefix(Codec::Av1, &[0x12, 0x00]));
        assert!(!has_access_unit_prefix(Codec::Av1, &[0x80]));
        assert!(!has_access_unit_prefix(Codec::Av1, &[]));
    }
}
