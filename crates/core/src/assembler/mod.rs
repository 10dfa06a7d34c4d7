//! Reassembly of VP8/VP9 frames from RTP packets.
//!
//! The [`FrameAssembler`] holds at most one in-progress frame. Packets are
//! copied into pooled [`Fragment`](pool::Fragment)s and stored in a
//! [`FragmentWindow`](window::FragmentWindow) keyed by sequence number.
//! A frame is emitted as soon as it is complete:
//!
//! ```text
//! have_start && have_end && every seq in [first_seq, last_seq] present
//! ```
//!
//! ## Packet handling
//!
//! | Situation | Result |
//! |-----------|--------|
//! | descriptor does not parse | [`DiscardReason::Malformed`] |
//! | idle, seq not after the last emitted seq | [`DiscardReason::Stale`] |
//! | other frame, seq not after `first_seq` | [`DiscardReason::Superseded`] |
//! | other frame, seq after `first_seq` | held frame dropped, packet starts a new one |
//! | idle, start-of-frame + marker | emitted directly without buffering |
//! | seq already held | [`DiscardReason::Duplicate`] |
//! | frame outgrows size cap or window | [`DiscardReason::Overflow`], wait for next start |
//!
//! "Other frame" means the RTP timestamp differs, or both sides carry a
//! picture ID and the IDs differ.
//!
//! An assembler serves one RTP stream and is not internally synchronized.

pub mod pool;
pub mod window;

use std::marker::PhantomData;

use crate::error::{Result, VpxRtpError};
use crate::media::PayloadDescriptor;
use crate::media::rtp::RtpPacket;
use crate::media::vp8::Vp8Descriptor;
use crate::media::vp9::Vp9Descriptor;
use crate::seq;
use pool::FragmentPool;
use window::FragmentWindow;

/// Default cap on the size of one reassembled frame (4 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;
/// Default number of sequence-number slots in the fragment window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1024;
/// Default number of spare fragment buffers kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

pub type Vp8FrameAssembler = FrameAssembler<Vp8Descriptor>;
pub type Vp9FrameAssembler = FrameAssembler<Vp9Descriptor>;

/// Reassembly limits and behavior switches.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Largest frame, in bytes, that will be accumulated.
    pub max_frame_size: usize,
    /// Slots in the fragment window; rounded up to a power of two.
    /// Bounds the number of packets one frame may span.
    pub window_capacity: usize,
    /// Spare fragment buffers retained between frames.
    pub pool_capacity: usize,
    /// Emit single-packet frames without copying them into the window.
    pub single_packet_fast_path: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            single_packet_fast_path: true,
        }
    }
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(VpxRtpError::InvalidConfig(
                "max_frame_size must be non-zero".into(),
            ));
        }
        if !(2..=1 << 15).contains(&self.window_capacity) {
            return Err(VpxRtpError::InvalidConfig(format!(
                "window_capacity {} outside 2..=32768",
                self.window_capacity
            )));
        }
        Ok(())
    }
}

/// Outcome of [`FrameAssembler::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// A complete frame was reconstructed.
    Frame(AssembledFrame),
    /// The packet was buffered; the frame is not complete yet.
    Pending,
    /// The packet was dropped.
    Discarded(DiscardReason),
}

/// Why a packet was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Malformed,
    Stale,
    Superseded,
    Duplicate,
    /// The frame outgrew the size cap or the window and was dropped.
    Overflow,
    /// Waiting for a start-of-frame packet after an overflow.
    AwaitingStart,
}

/// One reconstructed frame, payload descriptors removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    pub data: Vec<u8>,
    pub timestamp: u32,
    pub picture_id: Option<u16>,
    pub first_seq: u16,
    pub last_seq: u16,
    pub is_key_frame: bool,
}

/// Running counters, reset only with the assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames_emitted: u64,
    /// Partial frames thrown away (superseded or overflowed).
    pub frames_dropped: u64,
    pub packets_buffered: u64,
    pub packets_discarded: u64,
}

#[derive(Debug)]
struct PendingFrame {
    window: FragmentWindow,
    /// `(first_seq, last_seq)`; `None` while empty.
    bounds: Option<(u16, u16)>,
    timestamp: u32,
    picture_id: Option<u16>,
    have_start: bool,
    have_end: bool,
    total_length: usize,
}

impl PendingFrame {
    fn new(window_capacity: usize) -> Self {
        Self {
            window: FragmentWindow::new(window_capacity),
            bounds: None,
            timestamp: 0,
            picture_id: None,
            have_start: false,
            have_end: false,
            total_length: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    fn is_other_frame(&self, timestamp: u32, picture_id: Option<u16>) -> bool {
        if self.timestamp != timestamp {
            return true;
        }
        matches!((self.picture_id, picture_id), (Some(held), Some(new)) if held != new)
    }

    /// Bounds after adding `seq`.
    fn extended_bounds(&self, seq: u16) -> (u16, u16) {
        match self.bounds {
            None => (seq, seq),
            Some((first, last)) => (
                if seq::is_before(seq, first) { seq } else { first },
                if seq::is_after(seq, last) { seq } else { last },
            ),
        }
    }

    fn is_complete(&self) -> bool {
        match self.bounds {
            Some((first, last)) => {
                self.have_start && self.have_end && self.window.is_contiguous(first, last)
            }
            None => false,
        }
    }

    /// Return every fragment to `pool` and clear the scalar state.
    fn clear(&mut self, pool: &mut FragmentPool) {
        if let Some((first, last)) = self.bounds.take() {
            for fragment in self.window.drain_range(first, last) {
                pool.release(fragment);
            }
        }
        self.timestamp = 0;
        self.picture_id = None;
        self.have_start = false;
        self.have_end = false;
        self.total_length = 0;
    }
}

/// Frame reassembly state machine for one RTP stream.
///
/// Feed every received packet to [`process`](Self::process); complete
/// frames come back as [`Assembly::Frame`].
#[derive(Debug)]
pub struct FrameAssembler<D: PayloadDescriptor> {
    config: AssemblerConfig,
    pending: PendingFrame,
    pool: FragmentPool,
    last_sent_seq: Option<u16>,
    awaiting_start: bool,
    stats: AssemblerStats,
    _codec: PhantomData<D>,
}

impl<D: PayloadDescriptor> Default for FrameAssembler<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: PayloadDescriptor> FrameAssembler<D> {
    pub fn new() -> Self {
        Self::build(AssemblerConfig::default())
    }

    pub fn with_config(config: AssemblerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AssemblerConfig) -> Self {
        tracing::debug!(
            codec = D::CODEC_NAME,
            max_frame_size = config.max_frame_size,
            window = config.window_capacity,
            "frame assembler created"
        );
        Self {
            pending: PendingFrame::new(config.window_capacity),
            pool: FragmentPool::new(config.pool_capacity),
            last_sent_seq: None,
            awaiting_start: false,
            stats: AssemblerStats::default(),
            config,
            _codec: PhantomData,
        }
    }

    /// Consume one RTP packet.
    pub fn process(&mut self, packet: &RtpPacket<'_>) -> Assembly {
        let seq = packet.sequence;

        let desc = match D::parse(packet.payload) {
            Ok(desc) => desc,
            Err(error) => {
                tracing::debug!(codec = D::CODEC_NAME, seq, %error, "malformed payload descriptor");
                return self.discard(seq, DiscardReason::Malformed);
            }
        };
        let start = desc.is_start_of_frame();
        let payload = &packet.payload[desc.size()..];

        if self.awaiting_start && !start {
            return self.discard(seq, DiscardReason::AwaitingStart);
        }

        if self.pending.is_empty() {
            if let Some(last_sent) = self.last_sent_seq
                && !seq::is_after(seq, last_sent)
            {
                return self.discard(seq, DiscardReason::Stale);
            }
        } else if let Some((first, last)) = self.pending.bounds
            && self
                .pending
                .is_other_frame(packet.timestamp, desc.picture_id())
        {
            if !seq::is_after(seq, first) {
                return self.discard(seq, DiscardReason::Superseded);
            }
            // No loss feedback is sent; the newer frame simply replaces it.
            tracing::debug!(
                codec = D::CODEC_NAME,
                seq,
                dropped_first = first,
                dropped_last = last,
                held_timestamp = self.pending.timestamp,
                new_timestamp = packet.timestamp,
                "newer frame started, dropping incomplete frame"
            );
            self.drop_pending();
        }

        // Only an accepted start-of-frame packet ends the wait.
        self.awaiting_start = false;

        if self.pending.is_empty() && start && packet.marker && self.config.single_packet_fast_path
        {
            if payload.len() > self.config.max_frame_size {
                return self.overflow(seq, (seq, seq), payload.len());
            }
            self.last_sent_seq = Some(seq);
            return self.emitted(AssembledFrame {
                is_key_frame: D::frame_is_key_frame(payload),
                data: payload.to_vec(),
                timestamp: packet.timestamp,
                picture_id: desc.picture_id(),
                first_seq: seq,
                last_seq: seq,
            });
        }

        if self.pending.window.contains(seq) {
            return self.discard(seq, DiscardReason::Duplicate);
        }

        let (first, last) = self.pending.extended_bounds(seq);
        let total_length = self.pending.total_length + payload.len();
        if seq::span(first, last) as usize >= self.pending.window.capacity()
            || total_length > self.config.max_frame_size
        {
            return self.overflow(seq, (first, last), total_length);
        }

        let mut fragment = self.pool.acquire();
        fragment.fill(seq, payload);
        if let Some(displaced) = self.pending.window.insert(fragment) {
            self.pool.release(displaced);
        }

        if self.pending.is_empty() {
            self.pending.timestamp = packet.timestamp;
            self.pending.picture_id = desc.picture_id();
        }
        self.pending.bounds = Some((first, last));
        self.pending.total_length = total_length;
        self.pending.have_start |= start;
        self.pending.have_end |= packet.marker;
        self.stats.packets_buffered += 1;

        tracing::trace!(
            codec = D::CODEC_NAME,
            seq,
            first,
            last,
            bytes = payload.len(),
            total_length,
            "fragment buffered"
        );

        if self.pending.is_complete() {
            self.emit_pending()
        } else {
            Assembly::Pending
        }
    }

    /// Discard the in-progress frame. The last emitted sequence number is
    /// kept, so stale packets are still rejected.
    pub fn reset(&mut self) {
        tracing::debug!(codec = D::CODEC_NAME, "assembler reset");
        self.pending.clear(&mut self.pool);
        self.awaiting_start = false;
    }

    /// Discard everything, including the last emitted sequence number.
    /// Use on stream renegotiation.
    pub fn reset_all(&mut self) {
        self.reset();
        self.last_sent_seq = None;
    }

    /// A partial frame is being held.
    pub fn is_accumulating(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Bytes accumulated for the in-progress frame.
    pub fn pending_len(&self) -> usize {
        self.pending.total_length
    }

    /// Sequence number of the last packet of the last emitted frame.
    pub fn last_sent_seq(&self) -> Option<u16> {
        self.last_sent_seq
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    fn emit_pending(&mut self) -> Assembly {
        let Some((first, last)) = self.pending.bounds else {
            return Assembly::Pending;
        };

        let mut data = Vec::with_capacity(self.pending.total_length);
        for fragment in self.pending.window.drain_range(first, last) {
            data.extend_from_slice(fragment.data());
            self.pool.release(fragment);
        }

        let frame = AssembledFrame {
            is_key_frame: D::frame_is_key_frame(&data),
            data,
            timestamp: self.pending.timestamp,
            picture_id: self.pending.picture_id,
            first_seq: first,
            last_seq: last,
        };
        self.last_sent_seq = Some(last);
        self.pending.clear(&mut self.pool);
        self.emitted(frame)
    }

    fn emitted(&mut self, frame: AssembledFrame) -> Assembly {
        self.stats.frames_emitted += 1;
        tracing::trace!(
            codec = D::CODEC_NAME,
            first_seq = frame.first_seq,
            last_seq = frame.last_seq,
            bytes = frame.data.len(),
            key_frame = frame.is_key_frame,
            "frame assembled"
        );
        Assembly::Frame(frame)
    }

    fn overflow(&mut self, seq: u16, (first, last): (u16, u16), total_length: usize) -> Assembly {
        tracing::warn!(
            codec = D::CODEC_NAME,
            seq,
            first,
            last,
            total_length,
            max_frame_size = self.config.max_frame_size,
            "frame exceeds buffer capacity, waiting for next start of frame"
        );
        self.drop_pending();
        self.awaiting_start = true;
        self.discard(seq, DiscardReason::Overflow)
    }

    fn drop_pending(&mut self) {
        if !self.pending.is_empty() {
            self.stats.frames_dropped += 1;
            self.pending.clear(&mut self.pool);
        }
    }

    fn discard(&mut self, seq: u16, reason: DiscardReason) -> Assembly {
        self.stats.packets_discarded += 1;
        tracing::trace!(codec = D::CODEC_NAME, seq, ?reason, "packet discarded");
        Assembly::Discarded(reason)
    }
}
