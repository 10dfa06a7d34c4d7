//! Error types for the VP8/VP9 RTP library.

use std::fmt;

/// Errors that can occur in the VP8/VP9 RTP library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Payload**: [`Descriptor`](Self::Descriptor), when a payload descriptor
///   could not be decoded.
/// - **RTP**: [`Rtp`](Self::Rtp), for a malformed RTP fixed header.
/// - **Setup**: [`InvalidConfig`](Self::InvalidConfig),
///   [`EmptyFrame`](Self::EmptyFrame).
/// - **I/O**: [`Io`](Self::Io), for file access from the CLI.
///
/// Discarded packets inside the [`FrameAssembler`](crate::FrameAssembler)
/// are not errors; they are reported as
/// [`Assembly::Discarded`](crate::assembler::Assembly::Discarded).
#[derive(Debug, thiserror::Error)]
pub enum VpxRtpError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload descriptor could not be parsed.
    #[error("payload descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// RTP fixed header could not be parsed (RFC 3550 §5.1).
    #[error("RTP parse error: {kind}")]
    Rtp { kind: RtpParseError },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attempted to packetize a zero-length frame.
    #[error("empty frame")]
    EmptyFrame,
}

/// Failure to decode a VP8 or VP9 payload descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// The payload has no bytes at all.
    #[error("empty payload")]
    Empty,

    /// A bit in the descriptor announced a field that is not present.
    #[error("truncated {field}: need {needed} bytes, have {available}")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// VP9 flexible mode announced more than three reference indices.
    #[error("more than {max} reference indices")]
    TooManyReferences { max: usize },
}

/// Specific kind of RTP header parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpParseError {
    /// Fewer than 12 bytes.
    TooShort,
    /// Version field is not 2.
    BadVersion(u8),
    /// CSRC list or header extension runs past the end of the datagram.
    TruncatedHeader,
    /// Padding length is zero or larger than the payload.
    BadPadding,
}

impl fmt::Display for RtpParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "packet shorter than fixed header"),
            Self::BadVersion(v) => write!(f, "unsupported version {v}"),
            Self::TruncatedHeader => write!(f, "truncated CSRC list or extension"),
            Self::BadPadding => write!(f, "invalid padding length"),
        }
    }
}

impl From<RtpParseError> for VpxRtpError {
    fn from(kind: RtpParseError) -> Self {
        Self::Rtp { kind }
    }
}

/// Convenience alias for `Result<T, VpxRtpError>`.
pub type Result<T> = std::result::Result<T, VpxRtpError>;
