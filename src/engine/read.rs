// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read IQ / Read RSSI engine (C6).
//!
//! Grounded on `wl_read_baseband_buffer` and its helpers
//! `wl_read_iq_sample_error` / `wl_read_iq_find_error` in
//! `examples/original_source/mex/wl_mex_udp_transport.c` lines 2319-2993:
//! send one request, then loop receiving packets, tracking which sample
//! ranges have arrived, and re-requesting from the first gap on a
//! timeout, up to a bounded retry count.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::warn;

use crate::codec::SampleCodec;
use crate::context::Context;
use crate::engine::RetryLimits;
use crate::error::{Error, Result};
use crate::pacing::busy_wait_time_us;
use crate::tracker::{SampleTracker, SeqNumTracker};
use crate::transport::{reliable_send, try_recv, SocketHandle, SocketPool, Transport};
use crate::wire::{
    Buffer, CommandHeader, Operation, SampleHeader, Severity, TransportHeader,
    FLAG_NODE_NOT_READY, SAMPLE_FLAG_IQ_ERROR, SAMPLE_FLAG_IQ_NOT_READY,
};

const CMD_READ_IQ: u32 = 1;
const CMD_READ_RSSI: u32 = 2;

/// How long to wait for the next packet before treating the request as
/// timed out and retrying, matching the original's `TRANSPORT_TIMEOUT`.
const TIMEOUT: Duration = Duration::from_millis(500);

/// How long to back off after a transport-level `NODE_NOT_READY` before
/// resending, matching the original's `NOT_READY_WAIT_TIME`.
const NOT_READY_WAIT_TIME: Duration = Duration::from_millis(100);

/// A Read IQ or Read RSSI request for one buffer.
pub struct ReadRequest {
    /// Buffer to read from.
    pub buffer: Buffer,
    /// Whether this is an IQ or RSSI read.
    pub operation: Operation,
    /// First sample index to read.
    pub start: u32,
    /// Number of samples to read.
    pub num_samples: u32,
    /// Node id this request targets.
    pub dest_id: u16,
    /// Host id originating this request.
    pub src_id: u16,
    /// Action to take if the node's `sample_iq_id` matches the last read
    /// id recorded for this `(operation, buffer)`.
    pub duplicate_severity: Severity,
}

/// Read-only telemetry accumulated while servicing one Read request.
/// Supplemental to spec.md (SPEC_FULL §10): not exported beyond the
/// call's own return value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadStats {
    /// Number of data packets received (excluding not-ready/error packets).
    pub packets_received: u32,
    /// Number of timeout-driven gap-fill retries issued.
    pub gap_retries: u32,
    /// Number of "node not ready" retries issued.
    pub not_ready_retries: u32,
    /// Number of idle poll iterations with no packet available.
    pub idle_spins: u64,
}

/// Result of a completed Read IQ / Read RSSI request.
pub struct ReadOutcome<E> {
    /// Real (or I) component, one entry per requested sample.
    pub real: Vec<E>,
    /// Imaginary (or Q) component. Empty for [`crate::wire::DataType::Raw`].
    pub imag: Vec<E>,
    /// Telemetry for this request.
    pub stats: ReadStats,
}

fn command_id(operation: Operation) -> u32 {
    match operation {
        Operation::ReadIq => CMD_READ_IQ,
        Operation::ReadRssi => CMD_READ_RSSI,
    }
}

fn encode_request(
    req: &ReadRequest,
    seq_num: u16,
    sample_iq_id: u8,
    start: u32,
    num_samples: u32,
) -> Vec<u8> {
    let mut buf = vec![0u8; TransportHeader::SIZE + CommandHeader::SIZE + SampleHeader::SIZE];

    let transport = TransportHeader {
        dest_id: req.dest_id,
        src_id: req.src_id,
        pkt_type: 0,
        length: (CommandHeader::SIZE + SampleHeader::SIZE) as u16,
        seq_num,
        flags: 0,
    };
    let command = CommandHeader {
        command_id: command_id(req.operation),
        length: SampleHeader::SIZE as u16,
        num_args: 1,
    };
    let sample = SampleHeader {
        buffer_id: req.buffer.bits() as u16,
        flags: 0,
        sample_iq_id,
        start,
        num_samples,
    };

    transport.encode(&mut buf[0..TransportHeader::SIZE]).expect("buffer sized for header");
    command
        .encode(&mut buf[TransportHeader::SIZE..TransportHeader::SIZE + CommandHeader::SIZE])
        .expect("buffer sized for header");
    sample
        .encode(&mut buf[TransportHeader::SIZE + CommandHeader::SIZE..])
        .expect("buffer sized for header");
    buf
}

/// Decode the busy-status payload a `SAMPLE_FLAG_IQ_NOT_READY` response
/// carries: two big-endian `u32` words, outstanding tx and rx byte
/// counts, per `wl_compute_sample_wait_time`.
fn decode_busy_status(payload: &[u8]) -> (u32, u32) {
    let tx = payload.get(0..4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])).unwrap_or(0);
    let rx = payload.get(4..8).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])).unwrap_or(0);
    (tx, rx)
}

/// Run a Read IQ / Read RSSI request to completion against one node,
/// decoding samples with codec `C`.
#[allow(clippy::too_many_arguments)]
pub fn read_samples<T: Transport, C: SampleCodec>(
    ctx: &mut Context,
    pool: &mut SocketPool<T>,
    handle: SocketHandle,
    peer: SocketAddr,
    req: ReadRequest,
    seq_tracker: &mut SeqNumTracker,
    limits: RetryLimits,
    sleep: impl Fn(Duration),
) -> Result<ReadOutcome<C::Elem>> {
    if req.num_samples == 0 {
        return Err(Error::ZeroLengthRequest);
    }

    let elems_per_sample = match req.operation {
        Operation::ReadRssi => req.num_samples as usize * 2,
        Operation::ReadIq => req.num_samples as usize,
    };
    let mut real = vec![C::Elem::default(); elems_per_sample];
    let mut imag = vec![C::Elem::default(); elems_per_sample];
    let mut stats = ReadStats::default();

    let sample_iq_id = ctx.current_read_id(req.operation, req.buffer);
    let mut seq_num: u16 = 0;
    let mut cur_start = req.start;
    let mut cur_count = req.num_samples;

    let mut tracker = SampleTracker::new();
    let mut recv_buf = vec![0u8; pool.get_mut(handle)?.mtu().max(2048)];

    let mut packet =
        encode_request(&req, seq_num, sample_iq_id, cur_start, cur_count);
    reliable_send(pool.get_mut(handle)?, &packet, peer, &sleep)?;

    let mut timeout_retries = 0u32;
    let mut not_ready_retries = 0u32;
    let mut last_poll = Instant::now();
    let mut not_ready_warned = false;
    let mut last_seq_num: u16 = 0;

    loop {
        match try_recv(pool.get_mut(handle)?, &mut recv_buf)? {
            None => {
                stats.idle_spins += 1;
                if last_poll.elapsed() >= TIMEOUT {
                    timeout_retries += 1;
                    if timeout_retries > limits.max_timeout_retries {
                        return Err(Error::RetriesExhausted { attempted: timeout_retries });
                    }
                    if !ctx.warnings_suppressed() {
                        warn!(
                            "read {:?} request on buffer {:?} timed out; retrying from first gap",
                            req.operation, req.buffer
                        );
                    }
                    let gap = tracker.first_gap(req.start, req.num_samples).unwrap_or(req.start);
                    cur_start = gap;
                    cur_count = req.start + req.num_samples - gap;
                    seq_num = seq_num.wrapping_add(1);
                    packet = encode_request(&req, seq_num, sample_iq_id, cur_start, cur_count);
                    reliable_send(pool.get_mut(handle)?, &packet, peer, &sleep)?;
                    stats.gap_retries += 1;
                    last_poll = Instant::now();
                } else {
                    sleep(Duration::from_micros(50));
                }
                continue;
            }
            Some((len, _from)) => {
                last_poll = Instant::now();
                let hdr_size = TransportHeader::SIZE + CommandHeader::SIZE;
                let all_hdr_size = hdr_size + SampleHeader::SIZE;
                if len < all_hdr_size {
                    continue;
                }
                let transport = TransportHeader::decode(&recv_buf[0..TransportHeader::SIZE])?;

                if transport.flags & FLAG_NODE_NOT_READY != 0 {
                    not_ready_retries += 1;
                    if not_ready_retries > limits.max_not_ready_retries {
                        return Err(Error::RetriesExhausted { attempted: not_ready_retries });
                    }
                    if !not_ready_warned && !ctx.warnings_suppressed() {
                        warn!(
                            "node was not ready (transport-level) for read {:?} on buffer {:?}; waiting",
                            req.operation, req.buffer
                        );
                        not_ready_warned = true;
                    }
                    sleep(NOT_READY_WAIT_TIME);
                    stats.not_ready_retries += 1;
                    reliable_send(pool.get_mut(handle)?, &packet, peer, &sleep)?;
                    continue;
                }

                let sample_hdr = SampleHeader::decode(&recv_buf[hdr_size..all_hdr_size])?;
                let payload = &recv_buf[all_hdr_size..len];

                if sample_hdr.flags & SAMPLE_FLAG_IQ_ERROR != 0 {
                    return Err(Error::NodeContinuousTx);
                }

                if sample_hdr.flags & SAMPLE_FLAG_IQ_NOT_READY != 0 {
                    not_ready_retries += 1;
                    if not_ready_retries > limits.max_not_ready_retries {
                        return Err(Error::RetriesExhausted { attempted: not_ready_retries });
                    }
                    if !not_ready_warned && !ctx.warnings_suppressed() {
                        warn!(
                            "node was not ready for read {:?} on buffer {:?}; waiting",
                            req.operation, req.buffer
                        );
                        not_ready_warned = true;
                    }
                    let (tx, rx) = decode_busy_status(payload);
                    let wait = busy_wait_time_us(tx, rx);
                    if wait != 0 {
                        sleep(Duration::from_micros(wait as u64 + 100));
                    }
                    stats.not_ready_retries += 1;
                    reliable_send(pool.get_mut(handle)?, &packet, peer, &sleep)?;
                    continue;
                }

                let pkt_start = sample_hdr.start;
                let pkt_count = sample_hdr.num_samples;
                if pkt_start < req.start || pkt_start + pkt_count > req.start + req.num_samples {
                    continue;
                }

                let out_offset_samples = (pkt_start - req.start) as usize;
                let word_count = pkt_count as usize;
                for i in 0..word_count {
                    let word_bytes = &payload[i * 4..i * 4 + 4];
                    let word = u32::from_be_bytes([
                        word_bytes[0],
                        word_bytes[1],
                        word_bytes[2],
                        word_bytes[3],
                    ]);
                    match req.operation {
                        Operation::ReadIq => {
                            let (re, im) = C::decode_iq_sample(word);
                            real[out_offset_samples + i] = re;
                            imag[out_offset_samples + i] = im;
                        }
                        Operation::ReadRssi => {
                            let (a, b) = C::decode_rssi_pair(word);
                            real[(out_offset_samples + i) * 2] = a;
                            real[(out_offset_samples + i) * 2 + 1] = b;
                        }
                    }
                }

                tracker.record(pkt_start, pkt_count);
                stats.packets_received += 1;
                timeout_retries = 0;
                last_seq_num = transport.seq_num;

                if tracker.is_complete(req.start, req.num_samples) {
                    seq_tracker.check(
                        req.operation,
                        req.buffer,
                        last_seq_num,
                        req.duplicate_severity,
                    )?;
                    seq_tracker.update(req.operation, req.buffer, last_seq_num);
                    ctx.advance_read_id(req.operation, req.buffer);
                    return Ok(ReadOutcome { real, imag, stats });
                }
            }
        }
    }
}
