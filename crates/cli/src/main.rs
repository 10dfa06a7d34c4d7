use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use rand::seq::SliceRandom;
use vpx_rtp::assembler::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_WINDOW_CAPACITY};
use vpx_rtp::media::vp8::Vp8Descriptor;
use vpx_rtp::media::vp9::Vp9Descriptor;
use vpx_rtp::{
    AssemblerConfig, Assembly, FrameAssembler, FramePacketizer, PacketizerConfig,
    PayloadDescriptor, RtpPacket, VpxRtpError, keyframe,
};

#[derive(Parser)]
#[command(name = "vpx-rtp", about = "VP8/VP9 RTP packetization and reassembly tools")]
struct Args {
    /// Maximum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Packetize a file as one frame, reassemble it and compare
    Roundtrip {
        /// Encoded frame to packetize
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = Codec::Vp8)]
        codec: Codec,
        /// Deliver packets in random order
        #[arg(long)]
        shuffle: bool,
        /// Deliver every packet twice
        #[arg(long)]
        duplicate: bool,
        /// Frame bytes per packet
        #[arg(long, default_value_t = vpx_rtp::MAX_FRAGMENT_SIZE)]
        max_fragment_size: usize,
    },
    /// Check whether an RTP payload starts a keyframe
    Keyframe {
        /// RTP payload as hex, descriptor first
        #[arg(long)]
        hex: String,
        #[arg(long, value_enum, default_value_t = Codec::Vp8)]
        codec: Codec,
        /// Payload is RED-wrapped; primary block must carry this payload type
        #[arg(long)]
        red_pt: Option<u8>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Codec {
    Vp8,
    Vp9,
}

struct RoundtripOptions {
    shuffle: bool,
    duplicate: bool,
    max_fragment_size: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    match args.command {
        Command::Roundtrip {
            input,
            codec,
            shuffle,
            duplicate,
            max_fragment_size,
        } => {
            let options = RoundtripOptions {
                shuffle,
                duplicate,
                max_fragment_size,
            };
            let result = std::fs::read(&input)
                .map_err(VpxRtpError::from)
                .and_then(|frame| match codec {
                    Codec::Vp8 => roundtrip::<Vp8Descriptor>(&frame, &options),
                    Codec::Vp9 => roundtrip::<Vp9Descriptor>(&frame, &options),
                });
            match result {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    eprintln!("Round trip failed for {}: {}", input.display(), e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Keyframe { hex, codec, red_pt } => {
            let Some(payload) = decode_hex(&hex) else {
                eprintln!("Invalid hex payload: {}", hex);
                return ExitCode::FAILURE;
            };
            check_keyframe(&payload, codec, red_pt);
            ExitCode::SUCCESS
        }
    }
}

/// Returns whether the reassembled frame matched the input.
fn roundtrip<D: PayloadDescriptor>(
    frame: &[u8],
    options: &RoundtripOptions,
) -> vpx_rtp::Result<bool> {
    if frame.is_empty() {
        return Err(VpxRtpError::EmptyFrame);
    }

    let packetizer = FramePacketizer::<D>::with_config(PacketizerConfig {
        max_fragment_size: options.max_fragment_size,
        ..Default::default()
    })?;

    let mut rng = rand::rng();
    let first_seq: u16 = rng.random();
    let mut packets: Vec<_> = packetizer
        .process(frame)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| (first_seq.wrapping_add(i as u16), chunk))
        .collect();
    let sent = packets.len();

    if options.duplicate {
        packets = packets
            .into_iter()
            .flat_map(|p| [p.clone(), p])
            .collect();
    }
    if options.shuffle {
        packets.shuffle(&mut rng);
    }

    let mut assembler = FrameAssembler::<D>::with_config(AssemblerConfig {
        max_frame_size: frame.len().max(DEFAULT_MAX_FRAME_SIZE),
        window_capacity: (sent + 1).max(DEFAULT_WINDOW_CAPACITY),
        ..Default::default()
    })?;

    let timestamp: u32 = rng.random();
    let mut frames = Vec::new();
    for (seq, chunk) in &packets {
        let packet = RtpPacket::new(*seq, timestamp, chunk.is_last, &chunk.payload);
        if let Assembly::Frame(f) = assembler.process(&packet) {
            frames.push(f);
        }
    }

    let stats = assembler.stats();
    tracing::info!(
        codec = D::CODEC_NAME,
        packets = sent,
        delivered = packets.len(),
        first_seq,
        frames = frames.len(),
        discarded = stats.packets_discarded,
        "round trip finished"
    );

    let matched = matches!(frames.as_slice(), [f] if f.data == frame);
    println!(
        "{}: {} bytes, {} packets ({} delivered), {} frame(s), {} discarded",
        D::CODEC_NAME,
        frame.len(),
        sent,
        packets.len(),
        frames.len(),
        stats.packets_discarded
    );
    if let [f] = frames.as_slice() {
        println!(
            "seq {}..={}, keyframe: {}",
            f.first_seq, f.last_seq, f.is_key_frame
        );
    }
    println!("{}", if matched { "OK" } else { "MISMATCH" });
    Ok(matched)
}

fn check_keyframe(payload: &[u8], codec: Codec, red_pt: Option<u8>) {
    let inner = match red_pt {
        Some(pt) => match keyframe::red_primary_block(payload, pt) {
            Some(block) => block,
            None => {
                println!("no primary block with payload type {}", pt);
                println!("keyframe: no");
                return;
            }
        },
        None => payload,
    };

    let is_key = match codec {
        Codec::Vp8 => {
            describe(Vp8Descriptor::parse(inner));
            keyframe::vp8_is_key_frame(inner)
        }
        Codec::Vp9 => {
            describe(Vp9Descriptor::parse(inner));
            keyframe::vp9_is_key_frame(inner)
        }
    };
    println!("keyframe: {}", if is_key { "yes" } else { "no" });
}

fn describe<D: std::fmt::Debug>(desc: Result<D, vpx_rtp::DescriptorError>) {
    match desc {
        Ok(d) => println!("{:?}", d),
        Err(e) => println!("descriptor: {}", e),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let digits: String = s
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}
