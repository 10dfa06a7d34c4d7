//! Keyframe detection on RTP payloads and reassembled frames.
//!
//! Every function here returns `false` for short or malformed input and
//! never panics; detection runs per packet on the receive path.
//!
//! | Input | VP8 | VP9 |
//! |-------|-----|-----|
//! | RTP payload (descriptor first) | [`vp8_is_key_frame`] | [`vp9_is_key_frame`] |
//! | RED-wrapped RTP payload | [`vp8_is_key_frame_red`] | n/a |
//! | reassembled frame | [`vp8_frame_is_key_frame`] | [`vp9_frame_is_key_frame`] |

use crate::media::PayloadDescriptor;
use crate::media::vp8::Vp8Descriptor;
use crate::media::vp9::Vp9Descriptor;

/// VP8 payload is the first packet of a keyframe.
///
/// The descriptor must mark the start of partition 0, and the inverse
/// keyframe bit `P` of the frame tag that follows must be 0 (RFC 7741 §4.3).
pub fn vp8_is_key_frame(payload: &[u8]) -> bool {
    match Vp8Descriptor::parse(payload) {
        Ok(desc) if desc.is_start_of_frame() => payload
            .get(desc.size())
            .is_some_and(|tag| tag & 0x01 == 0),
        _ => false,
    }
}

/// Like [`vp8_is_key_frame`], for a payload wrapped in RED (RFC 2198).
///
/// Only the primary block is inspected, and only when its payload type
/// equals `vp8_pt`.
pub fn vp8_is_key_frame_red(payload: &[u8], vp8_pt: u8) -> bool {
    red_primary_block(payload, vp8_pt).is_some_and(vp8_is_key_frame)
}

/// VP9 payload is the start of a keyframe, judged from the descriptor.
///
/// See [`Vp9Descriptor::is_key_frame`]; this is a heuristic.
pub fn vp9_is_key_frame(payload: &[u8]) -> bool {
    Vp9Descriptor::parse(payload).is_ok_and(|desc| desc.is_key_frame())
}

/// Reassembled VP8 frame starts with a keyframe tag (`P` = 0).
pub fn vp8_frame_is_key_frame(frame: &[u8]) -> bool {
    frame.first().is_some_and(|tag| tag & 0x01 == 0)
}

/// Reassembled VP9 frame is a keyframe according to its uncompressed header.
///
/// ```text
/// frame_marker(2) = 0b10 | profile_low(1) | profile_high(1)
/// [reserved_zero(1) if profile == 3] | show_existing_frame(1) | frame_type(1)
/// ```
///
/// `frame_type` 0 is KEY_FRAME. A frame that only re-shows an existing one
/// is not a keyframe.
pub fn vp9_frame_is_key_frame(frame: &[u8]) -> bool {
    let Some(&b) = frame.first() else {
        return false;
    };
    if b >> 6 != 0b10 {
        return false;
    }
    let profile = (((b >> 4) & 0x01) << 1) | ((b >> 5) & 0x01);
    let shift = if profile == 3 { 2 } else { 3 };
    let show_existing = (b >> shift) & 0x01 != 0;
    let frame_type = (b >> (shift - 1)) & 0x01;
    !show_existing && frame_type == 0
}

/// Locate the primary encoding of a RED payload (RFC 2198 §3).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |F|   block PT  |  timestamp offset         |   block length    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Headers with `F` = 1 describe redundant blocks; the final 1-byte header
/// (`F` = 0) names the primary block, which follows all redundant data.
/// Returns `None` if the headers are truncated, the lengths run past the
/// payload, or the primary payload type is not `pt`.
pub fn red_primary_block(payload: &[u8], pt: u8) -> Option<&[u8]> {
    let mut offset = 0;
    let mut redundant_len = 0usize;
    let primary_pt = loop {
        let b = *payload.get(offset)?;
        if b & 0x80 == 0 {
            offset += 1;
            break b & 0x7F;
        }
        let header = payload.get(offset..offset + 4)?;
        redundant_len += (((header[2] & 0x03) as usize) << 8) | header[3] as usize;
        offset += 4;
    };

    if primary_pt != pt & 0x7F {
        return None;
    }
    payload.get(offset + redundant_len..)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vp8_literal_key_frame() {
        assert!(vp8_is_key_frame(&[0x10, 0x00, 0x9D, 0x01, 0x2A]));
    }

    #[test]
    fn vp8_inter_frame() {
        assert!(!vp8_is_key_frame(&[0x10, 0x01, 0x00]));
    }

    #[test]
    fn vp8_not_start_of_frame() {
        assert!(!vp8_is_key_frame(&[0x00, 0x00]));
        assert!(!vp8_is_key_frame(&[0x11, 0x00]));
    }

    #[test]
    fn vp8_extended_descriptor_is_skipped() {
        // X S, I with 15-bit id, then frame tag with P=0
        assert!(vp8_is_key_frame(&[0x90, 0x80, 0x81, 0x00, 0x00]));
        assert!(!vp8_is_key_frame(&[0x90, 0x80, 0x81, 0x00, 0x01]));
    }

    #[test]
    fn vp8_short_inputs() {
        assert!(!vp8_is_key_frame(&[]));
        assert!(!vp8_is_key_frame(&[0x10]));
        assert!(!vp8_is_key_frame(&[0x90, 0x80]));
    }

    #[test]
    fn red_single_primary_block() {
        let payload = [100, 0x10, 0x00, 0xAA];
        assert!(vp8_is_key_frame_red(&payload, 100));
        assert!(!vp8_is_key_frame_red(&payload, 101));
    }

    #[test]
    fn red_skips_redundant_block() {
        // redundant PT 100, length 2; primary PT 100
        let payload = [0x80 | 100, 0x00, 0x00, 0x02, 100, 0x10, 0x01, 0x10, 0x00];
        assert!(vp8_is_key_frame_red(&payload, 100));
        assert_eq!(red_primary_block(&payload, 100), Some(&payload[7..]));
    }

    #[test]
    fn red_truncated() {
        assert!(!vp8_is_key_frame_red(&[], 100));
        assert!(!vp8_is_key_frame_red(&[0x80 | 100, 0x00], 100));
        assert!(!vp8_is_key_frame_red(&[0x80 | 100, 0x00, 0x00, 0x09, 100, 0x10], 100));
    }

    #[test]
    fn vp9_descriptor_heuristic() {
        assert!(vp9_is_key_frame(&[0x28, 0x00, 0x00, 0x82]));
        assert!(!vp9_is_key_frame(&[0x68, 0x00, 0x00]));
        assert!(!vp9_is_key_frame(&[]));
    }

    #[test]
    fn vp8_frame_tag() {
        assert!(vp8_frame_is_key_frame(&[0x50, 0x2D, 0x01]));
        assert!(!vp8_frame_is_key_frame(&[0x51]));
        assert!(!vp8_frame_is_key_frame(&[]));
    }

    #[test]
    fn vp9_uncompressed_header() {
        // marker 10, profile 0, show_existing 0, frame_type 0
        assert!(vp9_frame_is_key_frame(&[0x80]));
        // frame_type 1
        assert!(!vp9_frame_is_key_frame(&[0x84]));
        // show_existing_frame
        assert!(!vp9_frame_is_key_frame(&[0x88]));
        // profile 3 (low=1, high=1), reserved 0, show_existing 0, frame_type 0
        assert!(vp9_frame_is_key_frame(&[0xB0]));
        // profile 3, frame_type 1
        assert!(!vp9_frame_is_key_frame(&[0xB2]));
        // bad frame marker
        assert!(!vp9_frame_is_key_frame(&[0x00]));
        assert!(!vp9_frame_is_key_frame(&[]));
    }
}
