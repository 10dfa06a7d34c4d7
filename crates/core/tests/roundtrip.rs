//! Integration tests: packetize frames, deliver the payloads in various
//! orders, and check the reassembled output.

use std::cmp::Ordering;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use vpx_rtp::keyframe;
use vpx_rtp::media::vp8::Vp8Descriptor;
use vpx_rtp::seq;
use vpx_rtp::{
    AssembledFrame, AssemblerConfig, Assembly, DiscardReason, MAX_FRAGMENT_SIZE, Packetizer,
    PayloadChunk, RtpPacket, Vp8FrameAssembler, Vp8Packetizer, Vp9FrameAssembler, Vp9Packetizer,
};

fn test_frame(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

/// Assign consecutive sequence numbers starting at `first_seq`.
fn numbered(chunks: Vec<PayloadChunk>, first_seq: u16) -> Vec<(u16, PayloadChunk)> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, c)| (first_seq.wrapping_add(i as u16), c))
        .collect()
}

/// Feed packets in the given order; return every frame produced.
fn deliver(
    assembler: &mut Vp8FrameAssembler,
    packets: &[(u16, PayloadChunk)],
    timestamp: u32,
) -> Vec<AssembledFrame> {
    packets
        .iter()
        .filter_map(|(seq, chunk)| {
            let packet = RtpPacket::new(*seq, timestamp, chunk.is_last, &chunk.payload);
            match assembler.process(&packet) {
                Assembly::Frame(f) => Some(f),
                _ => None,
            }
        })
        .collect()
}

#[test]
fn sequence_order_is_antisymmetric_and_transitive() {
    let mut rng = StdRng::seed_from_u64(7);
    for base in [0u16, 1000, 32760, 65000, 65535] {
        let mut values: Vec<u16> = (0..20_000u16).map(|i| base.wrapping_add(i)).collect();
        values.shuffle(&mut rng);
        let sample = &values[..40];

        for &a in sample {
            for &b in sample {
                assert_eq!(seq::compare(a, b), seq::compare(b, a).reverse());
                for &c in sample {
                    if seq::compare(a, b) == Ordering::Less && seq::compare(b, c) == Ordering::Less
                    {
                        assert_eq!(
                            seq::compare(a, c),
                            Ordering::Less,
                            "transitivity failed for {a} < {b} < {c}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn round_trip_around_fragment_boundary() {
    let packetizer = Vp8Packetizer::new();
    for len in [1, 1349, 1350, 1351, 4000] {
        let frame = test_frame(len);
        let packets = numbered(packetizer.process(&frame), 65534);
        let mut assembler = Vp8FrameAssembler::new();

        let frames = deliver(&mut assembler, &packets, 9000);
        assert_eq!(frames.len(), 1, "size {len}: expected exactly one frame");
        assert_eq!(frames[0].data, frame, "size {len}: payload mismatch");
        assert!(!assembler.is_accumulating());
    }
}

#[test]
fn reverse_order_delivery() {
    let frame = test_frame(4000);
    let mut packets = numbered(Vp8Packetizer::new().process(&frame), 100);
    packets.reverse();

    let mut assembler = Vp8FrameAssembler::new();
    let frames = deliver(&mut assembler, &packets, 0);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, frame);
    assert_eq!((frames[0].first_seq, frames[0].last_seq), (100, 102));
}

#[test]
fn permuted_delivery() {
    let frame = test_frame(20_000);
    let packets = numbered(Vp8Packetizer::new().process(&frame), 65530);

    for seed in 0..16 {
        let mut shuffled = packets.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut assembler = Vp8FrameAssembler::new();
        let frames = deliver(&mut assembler, &shuffled, 0);
        assert_eq!(frames.len(), 1, "seed {seed}");
        assert_eq!(frames[0].data, frame, "seed {seed}");
    }
}

#[test]
fn fast_path_matches_buffered_path() {
    let frame = test_frame(MAX_FRAGMENT_SIZE);
    let packets = numbered(Vp8Packetizer::new().process(&frame), 42);
    assert_eq!(packets.len(), 1);

    let mut fast = Vp8FrameAssembler::new();
    let mut buffered = Vp8FrameAssembler::with_config(AssemblerConfig {
        single_packet_fast_path: false,
        ..Default::default()
    })
    .unwrap();

    let a = deliver(&mut fast, &packets, 0);
    let b = deliver(&mut buffered, &packets, 0);
    assert_eq!(a, b);
    assert_eq!(a[0].data, frame);
    assert_eq!(fast.stats().packets_buffered, 0);
    assert_eq!(buffered.stats().packets_buffered, 1);
}

#[test]
fn duplicates_do_not_change_output() {
    let frame = test_frame(4000);
    let packets = numbered(Vp8Packetizer::new().process(&frame), 7);
    let mut assembler = Vp8FrameAssembler::new();

    let (first, rest) = packets.split_at(1);
    deliver(&mut assembler, first, 0);
    let len = assembler.pending_len();
    let again = &first[0];
    assert_eq!(
        assembler.process(&RtpPacket::new(again.0, 0, false, &again.1.payload)),
        Assembly::Discarded(DiscardReason::Duplicate)
    );
    assert_eq!(assembler.pending_len(), len);

    let mut doubled: Vec<_> = rest.iter().flat_map(|p| [p.clone(), p.clone()]).collect();
    doubled.insert(0, first[0].clone());
    let frames = deliver(&mut assembler, &doubled, 0);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, frame);
}

#[test]
fn missing_fragment_stalls_until_delivered() {
    let frame = test_frame(3000);
    let packets = numbered(Vp8Packetizer::new().process(&frame), 500);
    assert_eq!(packets.len(), 3);

    let mut assembler = Vp8FrameAssembler::new();
    let outer = [packets[0].clone(), packets[2].clone()];
    assert!(deliver(&mut assembler, &outer, 0).is_empty());
    assert!(assembler.is_accumulating());

    let frames = deliver(&mut assembler, &packets[1..2], 0);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, frame);
}

fn vp8_payload(picture_id: u16, start: bool, data: &[u8]) -> Vec<u8> {
    let desc = Vp8Descriptor {
        start_of_partition: start,
        picture_id: Some(picture_id),
        ..Default::default()
    };
    let mut out = Vec::new();
    desc.write(&mut out);
    out.extend_from_slice(data);
    out
}

#[test]
fn newer_picture_id_supersedes_partial_frame() {
    let mut assembler = Vp8FrameAssembler::new();

    let a0 = vp8_payload(5, true, &[0xA0; 10]);
    let a1 = vp8_payload(5, false, &[0xA1; 10]);
    assert_eq!(assembler.process(&RtpPacket::new(10, 0, false, &a0)), Assembly::Pending);
    assert_eq!(assembler.process(&RtpPacket::new(11, 0, false, &a1)), Assembly::Pending);
    assert_eq!(assembler.pending_len(), 20);

    let b0 = vp8_payload(6, true, &[0xB0; 4]);
    assert_eq!(assembler.process(&RtpPacket::new(12, 0, false, &b0)), Assembly::Pending);
    assert_eq!(assembler.pending_len(), 4);
    assert_eq!(assembler.stats().frames_dropped, 1);

    // A straggler from frame 5 is now older than the held frame.
    let a2 = vp8_payload(5, false, &[0xA2; 10]);
    assert_eq!(
        assembler.process(&RtpPacket::new(9, 0, true, &a2)),
        Assembly::Discarded(DiscardReason::Superseded)
    );

    let b1 = vp8_payload(6, false, &[0xB1; 4]);
    match assembler.process(&RtpPacket::new(13, 0, true, &b1)) {
        Assembly::Frame(f) => {
            assert_eq!(f.picture_id, Some(6));
            assert_eq!(f.data, [[0xB0; 4], [0xB1; 4]].concat());
        }
        other => panic!("expected frame 6, got {other:?}"),
    }
}

#[test]
fn late_packet_after_emission_is_stale() {
    let frame = test_frame(3000);
    let packets = numbered(Vp8Packetizer::new().process(&frame), 1);
    let mut assembler = Vp8FrameAssembler::new();
    assert_eq!(deliver(&mut assembler, &packets, 0).len(), 1);

    let (seq, chunk) = &packets[1];
    assert_eq!(
        assembler.process(&RtpPacket::new(*seq, 0, false, &chunk.payload)),
        Assembly::Discarded(DiscardReason::Stale)
    );
}

#[test]
fn literal_key_frame_bytes() {
    let mut payload = vec![0x10, 0x00, 0x9D, 0x01, 0x2A];
    assert!(keyframe::vp8_is_key_frame(&payload));
    payload[1] |= 0x01;
    assert!(!keyframe::vp8_is_key_frame(&payload));
}

#[test]
fn rtp_stream_of_frames() {
    let mut packetizer = Vp8Packetizer::new();
    let mut assembler = Vp8FrameAssembler::new();

    let frames: Vec<Vec<u8>> = (0..5)
        .map(|i| {
            let mut f = test_frame(1000 + i * 900);
            f[0] = if i == 0 { 0x00 } else { 0x01 };
            f
        })
        .collect();

    let mut out = Vec::new();
    for frame in &frames {
        for datagram in packetizer.packetize(frame, 3000) {
            let packet = RtpPacket::parse(&datagram).unwrap();
            if let Assembly::Frame(f) = assembler.process(&packet) {
                out.push(f);
            }
        }
    }

    assert_eq!(out.len(), frames.len());
    for (i, (got, want)) in out.iter().zip(&frames).enumerate() {
        assert_eq!(&got.data, want, "frame {i}");
        assert_eq!(got.timestamp, 3000 * i as u32);
        assert_eq!(got.is_key_frame, i == 0);
    }
    assert_eq!(assembler.stats().frames_emitted, 5);
    assert_eq!(assembler.stats().packets_discarded, 0);
}

#[test]
fn vp9_round_trip_shuffled() {
    let packetizer = Vp9Packetizer::new();
    let frame = test_frame(6000);
    let mut packets = numbered(packetizer.process(&frame), 65535);
    packets.shuffle(&mut StdRng::seed_from_u64(3));

    let mut assembler = Vp9FrameAssembler::new();
    let mut frames = Vec::new();
    for (seq, chunk) in &packets {
        let packet = RtpPacket::new(*seq, 0, chunk.is_last, &chunk.payload);
        if let Assembly::Frame(f) = assembler.process(&packet) {
            frames.push(f);
        }
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, frame);
}
