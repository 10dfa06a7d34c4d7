//! VP8/VP9 payload formats and RTP packetization.
//!
//! This module provides the codec-independent [`PayloadDescriptor`] and
//! [`Packetizer`] traits and the per-codec descriptor types.
//!
//! ## RTP overview (RFC 3550)
//!
//! An encoded video frame is split into one or more RTP packets. The
//! fields of the 12-byte fixed header that matter here are:
//!
//! - **Sequence number** (16-bit, wrapping): reordering and loss detection.
//! - **Timestamp** (32-bit): 90 kHz media clock, identical for all packets
//!   of one frame.
//! - **Marker bit**: set on the last packet of a frame.
//!
//! Each payload starts with a codec-specific *payload descriptor* that
//! marks the start of a frame and optionally carries a picture ID and
//! scalability layer indices.
//!
//! ## Supported codecs
//!
//! | Codec | Module | RFC |
//! |-------|--------|-----|
//! | VP8 | [`vp8`] | [RFC 7741](https://tools.ietf.org/html/rfc7741) |
//! | VP9 | [`vp9`] | [RFC 9628](https://tools.ietf.org/html/rfc9628) |

pub mod packetizer;
pub mod rtp;
pub mod vp8;
pub mod vp9;

use std::fmt;

use crate::error::DescriptorError;

/// Decoded view over the leading bytes of a VP8 or VP9 RTP payload.
///
/// Implementations are stateless, bit-exact parsers. The
/// [`FrameAssembler`](crate::FrameAssembler) and
/// [`FramePacketizer`](packetizer::FramePacketizer) are generic over this
/// trait, so adding a codec with the same framing rules only needs a new
/// descriptor type.
pub trait PayloadDescriptor: Copy + fmt::Debug + Send {
    /// Codec name for the SDP `a=rtpmap` attribute.
    const CODEC_NAME: &'static str;

    /// Parse the descriptor at the start of `payload`.
    ///
    /// Fails if a bit announces a field that is not present.
    fn parse(payload: &[u8]) -> Result<Self, DescriptorError>;

    /// Number of bytes the descriptor occupies; the codec payload
    /// starts at this offset.
    fn size(&self) -> usize;

    /// First packet of a frame.
    fn is_start_of_frame(&self) -> bool;

    /// Picture ID, if the descriptor carries one.
    fn picture_id(&self) -> Option<u16>;

    /// Single-byte descriptor used by the simplified packetizer.
    fn minimal(start: bool, end: bool) -> u8;

    /// Keyframe test on a reassembled, descriptor-free frame.
    fn frame_is_key_frame(frame: &[u8]) -> bool;
}

/// Codec-specific RTP packetizer.
///
/// Each implementation provides:
/// - **Packetization**: splitting encoded data into RTP-sized packets
/// - **SDP attributes**: codec parameters for session descriptions
/// - **RTP metadata**: payload type, clock rate, sequence/timestamp state
///
/// The generic RTP header is handled by [`rtp::RtpHeader`]; packetizers
/// compose it rather than reimplementing header serialization.
pub trait Packetizer: Send {
    /// Packetize one encoded frame into RTP packets.
    ///
    /// Each returned `Vec<u8>` is a complete RTP packet: 12-byte header
    /// (RFC 3550 §5.1) followed by the payload descriptor and codec data.
    ///
    /// `timestamp_increment` advances the RTP timestamp after this frame,
    /// typically `clock_rate / fps` (e.g. 3000 for 30 fps at 90 kHz).
    fn packetize(&mut self, encoded_data: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>>;

    /// Codec name for the SDP `a=rtpmap` attribute (e.g. `"VP8"`).
    fn codec_name(&self) -> &'static str;

    /// RTP clock rate in Hz. Always 90000 for VP8 and VP9.
    fn clock_rate(&self) -> u32;

    /// RTP payload type number (dynamic range 96–127).
    fn payload_type(&self) -> u8;

    /// SDP media-level attribute lines for this codec.
    fn sdp_attributes(&self) -> Vec<String>;

    /// Sequence number the next packet will carry.
    fn next_sequence(&self) -> u16;

    /// RTP timestamp the next frame will carry.
    fn next_rtp_timestamp(&self) -> u32;
}

/// Read a 7- or 15-bit picture ID (shared by VP8 and VP9).
///
/// ```text
///      +-+-+-+-+-+-+-+-+
/// I:   |M| PICTURE ID  |   M:0 => picture id is 7 bits.
///      +-+-+-+-+-+-+-+-+   M:1 => picture id is 15 bits.
/// M:   | EXTENDED PID  |
///      +-+-+-+-+-+-+-+-+
/// ```
///
/// Returns the ID and the number of bytes consumed.
pub(crate) fn read_picture_id(buf: &[u8], offset: usize) -> Result<(u16, usize), DescriptorError> {
    let first = *buf.get(offset).ok_or(DescriptorError::Truncated {
        field: "picture id",
        needed: offset + 1,
        available: buf.len(),
    })?;
    if first & 0x80 == 0 {
        return Ok(((first & 0x7F) as u16, 1));
    }
    let second = *buf.get(offset + 1).ok_or(DescriptorError::Truncated {
        field: "extended picture id",
        needed: offset + 2,
        available: buf.len(),
    })?;
    Ok(((((first & 0x7F) as u16) << 8) | second as u16, 2))
}

/// Write a picture ID, using the 15-bit form when asked or when it does
/// not fit in 7 bits.
pub(crate) fn write_picture_id(picture_id: u16, long: bool, out: &mut Vec<u8>) {
    if long || picture_id > 0x7F {
        out.push(0x80 | ((picture_id >> 8) as u8 & 0x7F));
        out.push(picture_id as u8);
    } else {
        out.push(picture_id as u8);
    }
}
