//! VP8 RTP payload descriptor (RFC 7741 §4.2).
//!
//! ```text
//!       0 1 2 3 4 5 6 7
//!      +-+-+-+-+-+-+-+-+
//!      |X|R|N|S| PartID|  (REQUIRED)
//!      +-+-+-+-+-+-+-+-+
//! X:   |I|L|T|K| RSV   |  (OPTIONAL)
//!      +-+-+-+-+-+-+-+-+
//! I:   |M| PictureID   |  (OPTIONAL)
//!      +-+-+-+-+-+-+-+-+
//!      |   PictureID   |  (present when M = 1)
//!      +-+-+-+-+-+-+-+-+
//! L:   |   TL0PICIDX   |  (OPTIONAL)
//!      +-+-+-+-+-+-+-+-+
//! T/K: |TID|Y| KEYIDX  |  (OPTIONAL)
//!      +-+-+-+-+-+-+-+-+
//! ```
//!
//! The descriptor is 1–6 bytes long. The VP8 payload header (frame tag)
//! follows it; on the first packet of a frame its lowest bit is the
//! inverse keyframe flag `P`.

use super::{PayloadDescriptor, read_picture_id, write_picture_id};
use crate::error::DescriptorError;

const X_BIT: u8 = 0x80;
const N_BIT: u8 = 0x20;
const S_BIT: u8 = 0x10;
const PART_ID_MASK: u8 = 0x0F;

const I_BIT: u8 = 0x80;
const L_BIT: u8 = 0x40;
const T_BIT: u8 = 0x20;
const K_BIT: u8 = 0x10;

const Y_BIT: u8 = 0x20;
const KEY_IDX_MASK: u8 = 0x1F;

/// Largest possible descriptor: 1 + X + 2 (PictureID) + L + T/K.
pub const MAX_DESCRIPTOR_SIZE: usize = 6;

/// Decoded VP8 payload descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vp8Descriptor {
    /// `X` bit. Implied when any optional field is present.
    pub extended: bool,
    /// Non-reference frame.
    pub non_reference: bool,
    /// Start of a VP8 partition.
    pub start_of_partition: bool,
    pub partition_id: u8,
    pub picture_id: Option<u16>,
    pub tl0_pic_idx: Option<u8>,
    /// Temporal layer index.
    pub tid: Option<u8>,
    /// Layer sync bit; meaningful only with `tid`.
    pub layer_sync: bool,
    pub key_idx: Option<u8>,
    /// Picture ID uses the 2-byte form even if it fits in 7 bits.
    pub long_picture_id: bool,
}

impl Vp8Descriptor {
    /// Parse and validate the descriptor at the start of `payload`.
    pub fn parse(payload: &[u8]) -> Result<Self, DescriptorError> {
        let b0 = *payload.first().ok_or(DescriptorError::Empty)?;

        let mut desc = Vp8Descriptor {
            extended: b0 & X_BIT != 0,
            non_reference: b0 & N_BIT != 0,
            start_of_partition: b0 & S_BIT != 0,
            partition_id: b0 & PART_ID_MASK,
            ..Default::default()
        };

        if !desc.extended {
            return Ok(desc);
        }

        let x = byte_at(payload, 1, "extension byte")?;
        let mut offset = 2;

        if x & I_BIT != 0 {
            let (id, used) = read_picture_id(payload, offset)?;
            desc.picture_id = Some(id);
            desc.long_picture_id = used == 2;
            offset += used;
        }
        if x & L_BIT != 0 {
            desc.tl0_pic_idx = Some(byte_at(payload, offset, "TL0PICIDX")?);
            offset += 1;
        }
        if x & (T_BIT | K_BIT) != 0 {
            let b = byte_at(payload, offset, "TID/KEYIDX")?;
            if x & T_BIT != 0 {
                desc.tid = Some(b >> 6);
                desc.layer_sync = b & Y_BIT != 0;
            }
            if x & K_BIT != 0 {
                desc.key_idx = Some(b & KEY_IDX_MASK);
            }
        }

        Ok(desc)
    }

    /// Descriptor length of `payload` without keeping the parsed fields.
    pub fn size_of(payload: &[u8]) -> Result<usize, DescriptorError> {
        Self::parse(payload).map(|d| d.encoded_len())
    }

    /// Bytes this descriptor occupies on the wire (1–6).
    pub fn encoded_len(&self) -> usize {
        if !self.has_extension() {
            return 1;
        }
        let mut len = 2;
        if let Some(id) = self.picture_id {
            len += if self.long_picture_id || id > 0x7F { 2 } else { 1 };
        }
        if self.tl0_pic_idx.is_some() {
            len += 1;
        }
        if self.tid.is_some() || self.key_idx.is_some() {
            len += 1;
        }
        len
    }

    fn has_extension(&self) -> bool {
        self.extended
            || self.picture_id.is_some()
            || self.tl0_pic_idx.is_some()
            || self.tid.is_some()
            || self.key_idx.is_some()
    }

    /// Whether `payload` starts with a well-formed descriptor.
    pub fn is_valid(payload: &[u8]) -> bool {
        Self::parse(payload).is_ok()
    }

    /// `S` is set on partition 0.
    pub fn is_start_of_frame(&self) -> bool {
        self.start_of_partition && self.partition_id == 0
    }

    /// Single-byte descriptor: `PartID = 0`, `S` on the first packet only.
    pub fn minimal(start: bool) -> u8 {
        if start { S_BIT } else { 0 }
    }

    /// Serialize all present fields.
    pub fn write(&self, out: &mut Vec<u8>) {
        let mut x = 0u8;
        if self.picture_id.is_some() {
            x |= I_BIT;
        }
        if self.tl0_pic_idx.is_some() {
            x |= L_BIT;
        }
        if self.tid.is_some() {
            x |= T_BIT;
        }
        if self.key_idx.is_some() {
            x |= K_BIT;
        }

        let mut b0 = self.partition_id & PART_ID_MASK;
        if self.non_reference {
            b0 |= N_BIT;
        }
        if self.start_of_partition {
            b0 |= S_BIT;
        }
        let extended = self.has_extension();
        if extended {
            b0 |= X_BIT;
        }
        out.push(b0);
        if !extended {
            return;
        }

        out.push(x);
        if let Some(id) = self.picture_id {
            write_picture_id(id & 0x7FFF, self.long_picture_id, out);
        }
        if let Some(idx) = self.tl0_pic_idx {
            out.push(idx);
        }
        if self.tid.is_some() || self.key_idx.is_some() {
            let mut b = 0u8;
            if let Some(tid) = self.tid {
                b |= (tid & 0x03) << 6;
                if self.layer_sync {
                    b |= Y_BIT;
                }
            }
            if let Some(k) = self.key_idx {
                b |= k & KEY_IDX_MASK;
            }
            out.push(b);
        }
    }
}

impl PayloadDescriptor for Vp8Descriptor {
    const CODEC_NAME: &'static str = "VP8";

    fn parse(payload: &[u8]) -> Result<Self, DescriptorError> {
        Vp8Descriptor::parse(payload)
    }

    fn size(&self) -> usize {
        self.encoded_len()
    }

    fn is_start_of_frame(&self) -> bool {
        Vp8Descriptor::is_start_of_frame(self)
    }

    fn picture_id(&self) -> Option<u16> {
        self.picture_id
    }

    fn minimal(start: bool, _end: bool) -> u8 {
        Vp8Descriptor::minimal(start)
    }

    fn frame_is_key_frame(frame: &[u8]) -> bool {
        crate::keyframe::vp8_frame_is_key_frame(frame)
    }
}

fn byte_at(buf: &[u8], offset: usize, field: &'static str) -> Result<u8, DescriptorError> {
    buf.get(offset).copied().ok_or(DescriptorError::Truncated {
        field,
        needed: offset + 1,
        available: buf.len(),
    })
}
