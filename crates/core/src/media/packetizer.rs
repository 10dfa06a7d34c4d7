use std::marker::PhantomData;

use super::rtp::RtpHeader;
use super::vp8::Vp8Descriptor;
use super::vp9::Vp9Descriptor;
use super::{PayloadDescriptor, Packetizer};
use crate::error::{Result, VpxRtpError};

/// Largest slice of frame data carried by one packet. Keeps the datagram
/// below a 1500-byte MTU after IP, UDP, RTP and descriptor overhead.
pub const MAX_FRAGMENT_SIZE: usize = 1350;

pub type Vp8Packetizer = FramePacketizer<Vp8Descriptor>;
pub type Vp9Packetizer = FramePacketizer<Vp9Descriptor>;

/// Packetizer settings.
#[derive(Debug, Clone)]
pub struct PacketizerConfig {
    /// Frame bytes per packet, excluding the 1-byte descriptor.
    pub max_fragment_size: usize,
    /// RTP payload type used by [`Packetizer::packetize`].
    pub payload_type: u8,
    /// Fixed SSRC; random when `None`.
    pub ssrc: Option<u32>,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: MAX_FRAGMENT_SIZE,
            payload_type: 96,
            ssrc: None,
        }
    }
}

/// One RTP payload produced from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadChunk {
    /// Descriptor byte followed by frame data.
    pub payload: Vec<u8>,
    /// Last chunk of the frame; the sender sets the RTP marker bit.
    pub is_last: bool,
}

/// Splits encoded VP8/VP9 frames into MTU-sized RTP payloads.
///
/// Every payload starts with the codec's minimal 1-byte descriptor:
///
/// ```text
/// VP8:  |X=0|R|N=0|S|PartID=0|   S set on the first chunk only
/// VP9:  |I=0|P|L=0|F=0|B|E|V|Z|  B on the first chunk, E on the last
/// ```
///
/// Picture IDs and layer indices are never emitted.
///
/// Payloads can be pulled one at a time with [`fragments`](Self::fragments),
/// collected with [`process`](Self::process), or wrapped in RTP headers via
/// the [`Packetizer`] trait.
#[derive(Debug)]
pub struct FramePacketizer<D: PayloadDescriptor> {
    header: RtpHeader,
    max_fragment_size: usize,
    _codec: PhantomData<D>,
}

impl<D: PayloadDescriptor> Default for FramePacketizer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: PayloadDescriptor> FramePacketizer<D> {
    /// Default settings, random SSRC.
    pub fn new() -> Self {
        Self {
            header: RtpHeader::with_random_ssrc(96),
            max_fragment_size: MAX_FRAGMENT_SIZE,
            _codec: PhantomData,
        }
    }

    pub fn with_config(config: PacketizerConfig) -> Result<Self> {
        if config.max_fragment_size == 0 {
            return Err(VpxRtpError::InvalidConfig(
                "max_fragment_size must be non-zero".into(),
            ));
        }
        if config.payload_type > 127 {
            return Err(VpxRtpError::InvalidConfig(format!(
                "payload type {} is not 7-bit",
                config.payload_type
            )));
        }
        let header = match config.ssrc {
            Some(ssrc) => RtpHeader::new(config.payload_type, ssrc),
            None => RtpHeader::with_random_ssrc(config.payload_type),
        };
        Ok(Self {
            header,
            max_fragment_size: config.max_fragment_size,
            _codec: PhantomData,
        })
    }

    /// Iterate over the payloads of `frame`, one per call to `next`.
    pub fn fragments<'a>(&self, frame: &'a [u8]) -> Fragments<'a, D> {
        Fragments::new(frame, self.max_fragment_size)
    }

    /// All payloads of `frame`, in sending order.
    pub fn process(&self, frame: &[u8]) -> Vec<PayloadChunk> {
        self.fragments(frame).collect()
    }
}

/// Pull-style cursor over one frame's payloads.
///
/// Tracks the read offset and whether the next chunk is the first of the
/// frame. An empty frame yields nothing.
#[derive(Debug, Clone)]
pub struct Fragments<'a, D> {
    frame: &'a [u8],
    offset: usize,
    first_packet: bool,
    max_fragment_size: usize,
    _codec: PhantomData<D>,
}

impl<'a, D: PayloadDescriptor> Fragments<'a, D> {
    fn new(frame: &'a [u8], max_fragment_size: usize) -> Self {
        Self {
            frame,
            offset: 0,
            first_packet: true,
            max_fragment_size: max_fragment_size.max(1),
            _codec: PhantomData,
        }
    }

    /// Frame bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.frame.len() - self.offset
    }

    pub fn is_consumed(&self) -> bool {
        self.remaining() == 0
    }
}

impl<D: PayloadDescriptor> Iterator for Fragments<'_, D> {
    type Item = PayloadChunk;

    fn next(&mut self) -> Option<PayloadChunk> {
        if self.is_consumed() {
            return None;
        }
        let chunk_size = self.remaining().min(self.max_fragment_size);
        let chunk = &self.frame[self.offset..self.offset + chunk_size];
        self.offset += chunk_size;
        let is_last = self.is_consumed();

        let mut payload = Vec::with_capacity(1 + chunk_size);
        payload.push(D::minimal(self.first_packet, is_last));
        payload.extend_from_slice(chunk);
        self.first_packet = false;

        Some(PayloadChunk { payload, is_last })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining().div_ceil(self.max_fragment_size);
        (n, Some(n))
    }
}

impl<D: PayloadDescriptor> ExactSizeIterator for Fragments<'_, D> {}

impl<D: PayloadDescriptor> Packetizer for FramePacketizer<D> {
    fn packetize(&mut self, encoded_data: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();

        for chunk in Fragments::<D>::new(encoded_data, self.max_fragment_size) {
            let hdr = self.header.write(chunk.is_last);
            let mut packet = Vec::with_capacity(12 + chunk.payload.len());
            packet.extend_from_slice(&hdr);
            packet.extend_from_slice(&chunk.payload);
            packets.push(packet);
        }

        tracing::trace!(
            codec = D::CODEC_NAME,
            rtp_packets = packets.len(),
            frame_bytes = encoded_data.len(),
            seq = self.header.sequence(),
            ts = self.header.timestamp(),
            "frame packetized"
        );

        self.header.advance_timestamp(timestamp_increment);
        packets
    }

    fn codec_name(&self) -> &'static str {
        D::CODEC_NAME
    }

    /// 90 kHz clock rate (RFC 7741 §6.1, RFC 9628 §6.1).
    fn clock_rate(&self) -> u32 {
        90000
    }

    fn payload_type(&self) -> u8 {
        self.header.pt
    }

    /// The `a=rtpmap` line; VP8 and VP9 need no `a=fmtp` parameters.
    fn sdp_attributes(&self) -> Vec<String> {
        vec![format!(
            "a=rtpmap:{} {}/{}",
            self.payload_type(),
            self.codec_name(),
            self.clock_rate()
        )]
    }

    fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    fn next_rtp_timestamp(&self) -> u32 {
        self.header.timestamp()
    }
}
