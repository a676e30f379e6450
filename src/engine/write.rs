// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Write IQ engine (C7).
//!
//! Grounded on `wl_write_baseband_buffer` and `wl_process_write_iq_response`
//! in `examples/original_source/mex/wl_mex_udp_transport.c` lines
//! 3158-3941: send packets fast (unacknowledged) except for the last one,
//! verify its checksum, and fall back to a slow mode that acknowledges and
//! checksums every packet if the fast-mode checksum ever disagrees.

use std::net::SocketAddr;
use std::time::Duration;

use log::warn;

use crate::checksum::FletcherChecksum;
use crate::codec::SampleCodec;
use crate::context::Context;
use crate::engine::RetryLimits;
use crate::error::{Error, Result};
use crate::pacing::{busy_wait_time_us, write_wait_time_us};
use crate::transport::{reliable_send, try_recv, SocketHandle, SocketPool, Transport};
use crate::wire::{
    Buffer, CommandHeader, SampleHeader, TransportHeader, FLAG_ROBUST, SAMPLE_FLAG_CHKSUM_RESET,
    SAMPLE_FLAG_LAST_WRITE,
};

const CMD_WRITE_IQ: u32 = 3;

/// Node response status codes, mirroring `SAMPLE_IQ_ERROR` /
/// `SAMPLE_IQ_NOT_READY` / `CMD_PARAM_SUCCESS` in the original.
const STATUS_IQ_ERROR: u32 = 1;
const STATUS_IQ_NOT_READY: u32 = 2;
const STATUS_SUCCESS: u32 = 0;

/// A Write IQ request for one buffer.
pub struct WriteRequest {
    /// Buffer to write to.
    pub buffer: Buffer,
    /// First sample index to write.
    pub start: u32,
    /// Maximum samples carried per packet.
    pub max_samples_per_pkt: u32,
    /// Node id this request targets.
    pub dest_id: u16,
    /// Host id originating this request.
    pub src_id: u16,
    /// Whether to verify the node's checksum of the last (fast-mode)
    /// packet, falling back to a fully-acknowledged slow write on
    /// mismatch.
    pub verify_checksum: bool,
}

/// Result of a completed Write IQ request.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOutcome {
    /// Total packets sent, including any slow-mode retransmission.
    pub packets_sent: u32,
    /// Whether the engine fell back to fully-acknowledged slow mode.
    pub slow_mode_used: bool,
}

fn decode_busy_status(payload: &[u8]) -> (u32, u32) {
    let tx = payload.get(12..16).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])).unwrap_or(0);
    let rx = payload.get(16..20).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])).unwrap_or(0);
    (tx, rx)
}

struct ResponseArgs {
    status: u32,
    sample_iq_id: u32,
    checksum: u32,
}

fn decode_response_args(payload: &[u8]) -> Option<ResponseArgs> {
    if payload.len() < 12 {
        return None;
    }
    let word = |off: usize| u32::from_be_bytes([payload[off], payload[off + 1], payload[off + 2], payload[off + 3]]);
    Some(ResponseArgs { status: word(0), sample_iq_id: word(4), checksum: word(8) })
}

/// One packet's worth of encoded payload plus its checksum contribution.
struct EncodedPacket {
    bytes: Vec<u8>,
    start: u32,
    count: u32,
}

#[allow(clippy::too_many_arguments)]
fn build_packets<C: SampleCodec>(
    req: &WriteRequest,
    real: &[C::Elem],
    imag: Option<&[C::Elem]>,
    sample_iq_id: u8,
    seq_base: u16,
    robust_all: bool,
    check_chksum: bool,
) -> (Vec<EncodedPacket>, u32) {
    let num_samples = real.len() as u32;
    let num_pkts = num_samples.div_ceil(req.max_samples_per_pkt).max(1);
    let mut packets = Vec::with_capacity(num_pkts as usize);
    let mut checksum = FletcherChecksum::new();

    let mut offset = req.start;
    for i in 0..num_pkts {
        let base = (offset - req.start) as usize;
        let count = req.max_samples_per_pkt.min(num_samples - base as u32);

        let flags = if i == 0 && num_pkts == 1 {
            SAMPLE_FLAG_CHKSUM_RESET | SAMPLE_FLAG_LAST_WRITE
        } else if i == 0 {
            SAMPLE_FLAG_CHKSUM_RESET
        } else if i == num_pkts - 1 {
            SAMPLE_FLAG_LAST_WRITE
        } else {
            0
        };

        let need_resp = robust_all || (i == num_pkts - 1 && check_chksum);

        let mut buf = vec![
            0u8;
            TransportHeader::SIZE
                + CommandHeader::SIZE
                + SampleHeader::SIZE
                + count as usize * 4
        ];

        let transport = TransportHeader {
            dest_id: req.dest_id,
            src_id: req.src_id,
            pkt_type: 0,
            length: (CommandHeader::SIZE + SampleHeader::SIZE + count as usize * 4) as u16,
            seq_num: seq_base.wrapping_add(i as u16),
            flags: if need_resp { FLAG_ROBUST } else { 0 },
        };
        let command = CommandHeader {
            command_id: CMD_WRITE_IQ,
            length: (SampleHeader::SIZE + count as usize * 4) as u16,
            num_args: 1,
        };
        let sample = SampleHeader {
            buffer_id: req.buffer.bits() as u16,
            flags,
            sample_iq_id,
            start: offset,
            num_samples: count,
        };

        transport.encode(&mut buf[0..TransportHeader::SIZE]).expect("buffer sized for header");
        command
            .encode(&mut buf[TransportHeader::SIZE..TransportHeader::SIZE + CommandHeader::SIZE])
            .expect("buffer sized for header");
        sample
            .encode(&mut buf[TransportHeader::SIZE + CommandHeader::SIZE
                ..TransportHeader::SIZE + CommandHeader::SIZE + SampleHeader::SIZE])
            .expect("buffer sized for header");

        let payload_start =
            TransportHeader::SIZE + CommandHeader::SIZE + SampleHeader::SIZE;
        checksum.feed_packet_start(offset, flags & SAMPLE_FLAG_CHKSUM_RESET != 0);

        let mut last_i = 0i16;
        let mut last_q = 0i16;
        for j in 0..count as usize {
            let re = real[base + j];
            let im = imag.map(|a| a[base + j]);
            let word = C::encode_sample(re, im);
            buf[payload_start + j * 4..payload_start + j * 4 + 4]
                .copy_from_slice(&word.to_be_bytes());
            last_i = (word >> 16) as i16;
            last_q = (word & 0xFFFF) as i16;
        }
        if flags & SAMPLE_FLAG_LAST_WRITE != 0 {
            checksum.feed_last_sample(last_i, last_q);
        }

        packets.push(EncodedPacket { bytes: buf, start: offset, count });
        offset += count;
    }

    (packets, checksum.finish())
}

/// Run a Write IQ request to completion against one node, encoding
/// samples with codec `C`. `imag` is `None` for real-only ([`crate::wire::DataType::Raw`])
/// payloads.
#[allow(clippy::too_many_arguments)]
pub fn write_samples<T: Transport, C: SampleCodec>(
    ctx: &mut Context,
    pool: &mut SocketPool<T>,
    handle: SocketHandle,
    peer: SocketAddr,
    req: WriteRequest,
    real: &[C::Elem],
    imag: Option<&[C::Elem]>,
    limits: RetryLimits,
    sleep: impl Fn(Duration),
) -> Result<WriteOutcome> {
    if real.is_empty() {
        return Err(Error::ZeroLengthRequest);
    }
    if let Some(im) = imag {
        if im.len() != real.len() {
            return Err(Error::ShapeMismatch { expected: real.len(), actual: im.len() });
        }
    }

    let sample_iq_id = ctx.current_write_id(req.buffer);
    let wait_time_us = ctx
        .write_wait_override()
        .unwrap_or_else(|| write_wait_time_us(ctx.hw_version(), req.buffer.bits(), req.max_samples_per_pkt));

    let mut outcome = WriteOutcome::default();
    let mut slow_mode = false;
    let mut not_ready_retries = 0u32;

    loop {
        let (packets, local_checksum) =
            build_packets::<C>(&req, real, imag, sample_iq_id, 0, slow_mode, req.verify_checksum);

        let mut mismatch = false;
        let mut node_not_ready = false;

        for (idx, pkt) in packets.iter().enumerate() {
            reliable_send(pool.get_mut(handle)?, &pkt.bytes, peer, &sleep)?;
            outcome.packets_sent += 1;
            if idx + 1 < packets.len() {
                sleep(Duration::from_micros(wait_time_us as u64));
            }

            let needs_ack = slow_mode || (idx == packets.len() - 1 && req.verify_checksum);
            if !needs_ack {
                // Opportunistically drain the socket once to pick up any
                // unsolicited status (e.g. IQ_ERROR) the node sends mid-stream.
                let mut drain_buf = vec![0u8; pool.get_mut(handle)?.mtu().max(2048)];
                if let Some((len, _from)) = try_recv(pool.get_mut(handle)?, &mut drain_buf)? {
                    let hdr_size = TransportHeader::SIZE + CommandHeader::SIZE + SampleHeader::SIZE;
                    if len > hdr_size {
                        if let Some(args) = decode_response_args(&drain_buf[hdr_size..len]) {
                            if args.sample_iq_id == sample_iq_id as u32
                                && args.status == STATUS_IQ_ERROR
                            {
                                return Err(Error::NodeContinuousTx);
                            }
                        }
                    }
                }
                continue;
            }

            let mut recv_buf = vec![0u8; pool.get_mut(handle)?.mtu().max(2048)];
            let resp = loop {
                match try_recv(pool.get_mut(handle)?, &mut recv_buf)? {
                    Some((len, _from)) => break Some((len, recv_buf.clone())),
                    None => sleep(Duration::from_micros(50)),
                }
            };
            let (len, buf) = resp.expect("loop only exits with a packet");
            let hdr_size = TransportHeader::SIZE + CommandHeader::SIZE + SampleHeader::SIZE;
            if len <= hdr_size {
                continue;
            }
            let args = match decode_response_args(&buf[hdr_size..len]) {
                Some(a) => a,
                None => continue,
            };
            if args.sample_iq_id != sample_iq_id as u32 {
                continue;
            }

            match args.status {
                STATUS_IQ_ERROR => return Err(Error::NodeContinuousTx),
                STATUS_IQ_NOT_READY => {
                    node_not_ready = true;
                    let (tx, rx) = decode_busy_status(&buf[hdr_size..len]);
                    let wait = busy_wait_time_us(tx, rx);
                    if wait != 0 {
                        sleep(Duration::from_micros(wait as u64 + 100));
                    }
                    break;
                }
                STATUS_SUCCESS => {
                    if idx == packets.len() - 1 && args.checksum != local_checksum {
                        mismatch = true;
                    }
                }
                _ => {}
            }
        }

        if node_not_ready {
            not_ready_retries += 1;
            if not_ready_retries > limits.max_not_ready_retries {
                return Err(Error::RetriesExhausted { attempted: not_ready_retries });
            }
            if !ctx.warnings_suppressed() {
                warn!("node was not ready for write IQ on buffer {:?}; retrying", req.buffer);
            }
            continue;
        }

        if !mismatch {
            ctx.advance_write_id(req.buffer);
            outcome.slow_mode_used = slow_mode;
            return Ok(outcome);
        }

        if slow_mode {
            return Err(Error::ChecksumMismatchInSlowMode);
        }

        slow_mode = true;
    }
}
