pub mod assembler;
pub mod error;
pub mod keyframe;
pub mod media;
pub mod seq;

pub use assembler::{
    AssembledFrame, AssemblerConfig, Assembly, DiscardReason, FrameAssembler, Vp8FrameAssembler,
    Vp9FrameAssembler,
};
pub use error::{DescriptorError, Result, VpxRtpError};
pub use media::packetizer::{
    FramePacketizer, MAX_FRAGMENT_SIZE, PacketizerConfig, PayloadChunk, Vp8Packetizer,
    Vp9Packetizer,
};
pub use media::rtp::RtpPacket;
pub use media::{Packetizer, PayloadDescriptor};
