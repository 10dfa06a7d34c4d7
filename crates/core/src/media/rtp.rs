use rand::Rng;

use crate::error::RtpParseError;

/// Generic RTP fixed header builder (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Used by [`FramePacketizer`](super::packetizer::FramePacketizer) when it
/// emits complete RTP packets. It manages:
/// - **Sequence number**: 16-bit, wrapping, incremented on every packet.
/// - **Timestamp**: 32-bit, wrapping, advanced once per frame.
/// - **SSRC**: randomly generated per RFC 3550 §8.1 unless given.
///
/// Version is always 2. Padding, extension, and CSRC count are always 0.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    /// Create a new RTP header state with explicit SSRC.
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header state created"
        );
        Self {
            pt: pt & 0x7F,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Create with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(pt: u8) -> Self {
        let ssrc = rand::rng().random::<u32>();
        Self::new(pt, ssrc)
    }

    /// Sequence number the next [`write`](Self::write) will use.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp of the frame currently being written.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Serialize a 12-byte RTP fixed header and advance the sequence number.
    ///
    /// The `marker` bit is set on the last packet of a video frame
    /// (RFC 7741 §4.1).
    pub fn write(&mut self, marker: bool) -> [u8; 12] {
        let first_byte: u8 = 2 << 6;
        let second_byte: u8 = ((marker as u8) << 7) | self.pt;

        let mut header = [0u8; 12];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Advance the RTP timestamp by `90000 / fps` ticks.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

/// The fields of one received RTP packet that frame reassembly needs.
///
/// Borrowed from the caller for the duration of
/// [`FrameAssembler::process`](crate::FrameAssembler::process); only the
/// payload bytes are copied out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub sequence: u16,
    pub timestamp: u32,
    pub marker: bool,
    pub payload_type: u8,
    /// Payload after the RTP header (and before any padding), starting
    /// with the payload descriptor.
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Build from fields already decoded by the transport layer.
    pub fn new(sequence: u16, timestamp: u32, marker: bool, payload: &'a [u8]) -> Self {
        Self {
            sequence,
            timestamp,
            marker,
            payload_type: 0,
            payload,
        }
    }

    /// Parse a raw RTP datagram.
    ///
    /// Skips the CSRC list and header extension (RFC 3550 §5.3.1) and
    /// strips trailing padding.
    pub fn parse(buf: &'a [u8]) -> Result<Self, RtpParseError> {
        if buf.len() < 12 {
            return Err(RtpParseError::TooShort);
        }
        let version = buf[0] >> 6;
        if version != 2 {
            return Err(RtpParseError::BadVersion(version));
        }
        let padding = buf[0] & 0x20 != 0;
        let extension = buf[0] & 0x10 != 0;
        let csrc_count = (buf[0] & 0x0F) as usize;

        let mut offset = 12 + csrc_count * 4;
        if extension {
            let words = buf
                .get(offset + 2..offset + 4)
                .ok_or(RtpParseError::TruncatedHeader)?;
            offset += 4 + u16::from_be_bytes([words[0], words[1]]) as usize * 4;
        }
        if offset > buf.len() {
            return Err(RtpParseError::TruncatedHeader);
        }

        let mut end = buf.len();
        if padding {
            let pad = buf[end - 1] as usize;
            if pad == 0 || offset + pad > end {
                return Err(RtpParseError::BadPadding);
            }
            end -= pad;
        }

        Ok(Self {
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            marker: buf[1] & 0x80 != 0,
            payload_type: buf[1] & 0x7F,
            payload: &buf[offset..end],
        })
    }
}
