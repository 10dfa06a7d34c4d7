//! VP9 RTP payload descriptor (RFC 9628 §4.2).
//!
//! ```text
//!       0 1 2 3 4 5 6 7
//!      +-+-+-+-+-+-+-+-+
//!      |I|P|L|F|B|E|V|Z| (REQUIRED)
//!      +-+-+-+-+-+-+-+-+
//! I:   |M| PICTURE ID  | (RECOMMENDED)
//!      +-+-+-+-+-+-+-+-+
//! M:   | EXTENDED PID  | (RECOMMENDED)
//!      +-+-+-+-+-+-+-+-+
//! L:   |  T  |U|  S  |D| (CONDITIONALLY RECOMMENDED)
//!      +-+-+-+-+-+-+-+-+
//!      |   TL0PICIDX   | (CONDITIONALLY REQUIRED, F = 0)
//!      +-+-+-+-+-+-+-+-+                             -\
//! P,F: | P_DIFF      |N| (CONDITIONALLY REQUIRED)    - up to 3 times
//!      +-+-+-+-+-+-+-+-+                             -/
//! V:   | SS            |
//!      | ..            |
//!      +-+-+-+-+-+-+-+-+
//! ```
//!
//! Only the fields needed for frame boundaries, picture identity and the
//! keyframe heuristic are kept; the remaining variable-length parts are
//! walked to find where the VP9 payload starts.

use super::{PayloadDescriptor, read_picture_id};
use crate::error::DescriptorError;

const I_BIT: u8 = 0x80;
const P_BIT: u8 = 0x40;
const L_BIT: u8 = 0x20;
const F_BIT: u8 = 0x10;
const B_BIT: u8 = 0x08;
const E_BIT: u8 = 0x04;
const V_BIT: u8 = 0x02;
const Z_BIT: u8 = 0x01;

const MAX_REF_PICS: usize = 3;

/// Decoded VP9 payload descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vp9Descriptor {
    /// Inter-picture predicted frame.
    pub inter_predicted: bool,
    /// Flexible mode; reference indices are walked but not decoded.
    pub flexible: bool,
    /// Start of a frame.
    pub start_of_frame: bool,
    /// End of a frame.
    pub end_of_frame: bool,
    /// Scalability structure present.
    pub has_scalability_structure: bool,
    /// Not a reference for upper spatial layers.
    pub not_upper_reference: bool,
    pub picture_id: Option<u16>,
    pub layers: Option<LayerIndices>,
    /// Only present in non-flexible mode with layer indices.
    pub tl0_pic_idx: Option<u8>,
    size: usize,
}

impl Default for Vp9Descriptor {
    /// All flags clear; the 1-byte mandatory header only.
    fn default() -> Self {
        Self {
            inter_predicted: false,
            flexible: false,
            start_of_frame: false,
            end_of_frame: false,
            has_scalability_structure: false,
            not_upper_reference: false,
            picture_id: None,
            layers: None,
            tl0_pic_idx: None,
            size: 1,
        }
    }
}

/// Layer indices byte: `T(3) | U | S(3) | D`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerIndices {
    pub tid: u8,
    /// Switching up point.
    pub switching_up: bool,
    pub sid: u8,
    /// Inter-layer dependency used.
    pub inter_layer_dependency: bool,
}

impl Vp9Descriptor {
    /// Parse and validate the descriptor at the start of `payload`.
    pub fn parse(payload: &[u8]) -> Result<Self, DescriptorError> {
        let b0 = *payload.first().ok_or(DescriptorError::Empty)?;

        let mut desc = Vp9Descriptor {
            inter_predicted: b0 & P_BIT != 0,
            flexible: b0 & F_BIT != 0,
            start_of_frame: b0 & B_BIT != 0,
            end_of_frame: b0 & E_BIT != 0,
            has_scalability_structure: b0 & V_BIT != 0,
            not_upper_reference: b0 & Z_BIT != 0,
            ..Default::default()
        };
        let mut offset = 1;

        if b0 & I_BIT != 0 {
            let (id, used) = read_picture_id(payload, offset)?;
            desc.picture_id = Some(id);
            offset += used;
        }

        if b0 & L_BIT != 0 {
            let b = byte_at(payload, offset, "layer indices")?;
            desc.layers = Some(LayerIndices {
                tid: b >> 5,
                switching_up: b & 0x10 != 0,
                sid: (b >> 1) & 0x07,
                inter_layer_dependency: b & 0x01 != 0,
            });
            offset += 1;

            if !desc.flexible {
                desc.tl0_pic_idx = Some(byte_at(payload, offset, "TL0PICIDX")?);
                offset += 1;
            }
        }

        if desc.flexible && desc.inter_predicted {
            offset = skip_reference_indices(payload, offset)?;
        }

        if desc.has_scalability_structure {
            offset = skip_scalability_structure(payload, offset)?;
        }

        desc.size = offset;
        Ok(desc)
    }

    /// Descriptor length of `payload` without keeping the parsed fields.
    pub fn size_of(payload: &[u8]) -> Result<usize, DescriptorError> {
        Self::parse(payload).map(|d| d.size)
    }

    /// Best-effort keyframe heuristic: `¬P ∧ B ∧ L ∧ (SID = 0 ∨ ¬D)`.
    ///
    /// This reads descriptor bits only; it is not verified against the
    /// VP9 uncompressed header.
    pub fn is_key_frame(&self) -> bool {
        match self.layers {
            Some(layers) => {
                !self.inter_predicted
                    && self.start_of_frame
                    && (layers.sid == 0 || !layers.inter_layer_dependency)
            }
            None => false,
        }
    }

    /// Single-byte descriptor: `B` on the first packet, `E` on the last.
    pub fn minimal(start: bool, end: bool) -> u8 {
        let mut b = 0;
        if start {
            b |= B_BIT;
        }
        if end {
            b |= E_BIT;
        }
        b
    }
}

impl PayloadDescriptor for Vp9Descriptor {
    const CODEC_NAME: &'static str = "VP9";

    fn parse(payload: &[u8]) -> Result<Self, DescriptorError> {
        Vp9Descriptor::parse(payload)
    }

    fn size(&self) -> usize {
        self.size
    }

    fn is_start_of_frame(&self) -> bool {
        self.start_of_frame
    }

    fn picture_id(&self) -> Option<u16> {
        self.picture_id
    }

    fn minimal(start: bool, end: bool) -> u8 {
        Vp9Descriptor::minimal(start, end)
    }

    fn frame_is_key_frame(frame: &[u8]) -> bool {
        crate::keyframe::vp9_frame_is_key_frame(frame)
    }
}

// P_DIFF bytes; the low bit N announces another one.
fn skip_reference_indices(buf: &[u8], mut offset: usize) -> Result<usize, DescriptorError> {
    for _ in 0..MAX_REF_PICS {
        let b = byte_at(buf, offset, "P_DIFF")?;
        offset += 1;
        if b & 0x01 == 0 {
            return Ok(offset);
        }
    }
    Err(DescriptorError::TooManyReferences { max: MAX_REF_PICS })
}

// Scalability structure:
//
//      +-+-+-+-+-+-+-+-+
// V:   | N_S |Y|G|-|-|-|
//      +-+-+-+-+-+-+-+-+
// Y:   | WIDTH, HEIGHT | 4 bytes, N_S + 1 times
//      +-+-+-+-+-+-+-+-+
// G:   |      N_G      |
//      +-+-+-+-+-+-+-+-+
// N_G: |  T  |U| R |-|-| followed by R P_DIFF bytes, N_G times
//      +-+-+-+-+-+-+-+-+
fn skip_scalability_structure(buf: &[u8], mut offset: usize) -> Result<usize, DescriptorError> {
    let b = byte_at(buf, offset, "scalability structure")?;
    offset += 1;

    let spatial_layers = ((b >> 5) + 1) as usize;
    if b & 0x10 != 0 {
        offset += 4 * spatial_layers;
        if offset > buf.len() {
            return Err(DescriptorError::Truncated {
                field: "layer resolutions",
                needed: offset,
                available: buf.len(),
            });
        }
    }

    if b & 0x08 != 0 {
        let groups = byte_at(buf, offset, "N_G")?;
        offset += 1;
        for _ in 0..groups {
            let g = byte_at(buf, offset, "picture group")?;
            offset += 1 + ((g >> 2) & 0x03) as usize;
        }
        if offset > buf.len() {
            return Err(DescriptorError::Truncated {
                field: "picture group P_DIFF",
                needed: offset,
                available: buf.len(),
            });
        }
    }

    Ok(offset)
}

fn byte_at(buf: &[u8], offset: usize, field: &'static str) -> Result<u8, DescriptorError> {
    buf.get(offset).copied().ok_or(DescriptorError::Truncated {
        field,
        needed: offset + 1,
        available: buf.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_single_byte() {
        let d = Vp9Descriptor::parse(&[0x0C, 0xAA]).unwrap();
        assert!(d.start_of_frame);
        assert!(d.end_of_frame);
        assert_eq!(d.size(), 1);
    }

    #[test]
    fn picture_id_and_layers_non_flexible() {
        // I L B, 15-bit pid 0x0203, T=1 U S=0 D=0, TL0PICIDX
        let buf = [0xA8, 0x82, 0x03, 0x30, 0x07, 0xFF];
        let d = Vp9Descriptor::parse(&buf).unwrap();
        assert_eq!(d.picture_id, Some(0x0203));
        let layers = d.layers.unwrap();
        assert_eq!(layers.tid, 1);
        assert!(layers.switching_up);
        assert_eq!(layers.sid, 0);
        assert_eq!(d.tl0_pic_idx, Some(7));
        assert_eq!(d.size(), 5);
        assert!(d.is_key_frame());
    }

    #[test]
    fn flexible_mode_skips_p_diff() {
        // I P L F B, 7-bit pid, layers, two P_DIFF (first has N)
        let buf = [0xF8, 0x05, 0x00, 0x03, 0x04, 0xEE];
        let d = Vp9Descriptor::parse(&buf).unwrap();
        assert_eq!(d.tl0_pic_idx, None);
        assert_eq!(d.size(), 5);
        assert!(!d.is_key_frame());
    }

    #[test]
    fn too_many_p_diff() {
        let buf = [0x50, 0x01, 0x01, 0x01, 0x00];
        assert_eq!(
            Vp9Descriptor::parse(&buf),
            Err(DescriptorError::TooManyReferences { max: 3 })
        );
    }

    #[test]
    fn scalability_structure_with_resolutions_and_groups() {
        // V B, N_S=1 Y G, 2 x (w,h), N_G=1, group with R=1, one P_DIFF
        let mut buf = vec![0x0A, 0x38];
        buf.extend_from_slice(&[0x01, 0x40, 0x00, 0xB4, 0x02, 0x80, 0x01, 0x68]);
        buf.extend_from_slice(&[0x01, 0x14, 0x01]);
        buf.push(0x99);
        let d = Vp9Descriptor::parse(&buf).unwrap();
        assert!(d.has_scalability_structure);
        assert_eq!(d.size(), buf.len() - 1);
    }

    #[test]
    fn truncated_scalability_structure() {
        assert!(Vp9Descriptor::parse(&[0x02, 0x10, 0x00]).is_err());
    }

    #[test]
    fn keyframe_heuristic() {
        // L B, SID=1 D=1 -> depends on lower layer, not a keyframe
        let d = Vp9Descriptor::parse(&[0x28, 0x03, 0x00]).unwrap();
        assert!(!d.is_key_frame());
        // SID=1 D=0
        let d = Vp9Descriptor::parse(&[0x28, 0x02, 0x00]).unwrap();
        assert!(d.is_key_frame());
        // no layer indices
        let d = Vp9Descriptor::parse(&[0x08]).unwrap();
        assert!(!d.is_key_frame());
        // inter predicted
        let d = Vp9Descriptor::parse(&[0x68, 0x00, 0x00]).unwrap();
        assert!(!d.is_key_frame());
    }

    #[test]
    fn default_is_one_byte() {
        let d = Vp9Descriptor::default();
        assert_eq!(d.size(), 1);
        assert_eq!(Vp9Descriptor::parse(&[0x00]), Ok(d));
    }

    #[test]
    fn minimal_bits() {
        assert_eq!(Vp9Descriptor::minimal(true, false), 0x08);
        assert_eq!(Vp9Descriptor::minimal(false, true), 0x04);
        assert_eq!(Vp9Descriptor::minimal(true, true), 0x0C);
    }
}
