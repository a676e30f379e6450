// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatcher (C8): public entry points. Validates arguments, iterates
//! over a (possibly multi-buffer) request, splits large Read requests
//! into chunks bounded by [`Context::read_max_request_bytes`], and keeps
//! the [`SeqNumTracker`] current.
//!
//! Grounded on the buffer-iteration and chunk-size logic implied by the
//! `mexFunction` dispatch body (the `for` loop over `buffer_ids` and the
//! receive-buffer-derived chunk size) and on
//! `wl_update_seq_num`/`wl_check_seq_num`
//! (`examples/original_source/mex/wl_mex_udp_transport.c` lines 3006-3093).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::codec::SampleCodec;
use crate::context::Context;
use crate::engine::{read_samples, write_samples, ReadOutcome, ReadRequest, ReadStats, RetryLimits, WriteOutcome, WriteRequest};
use crate::error::{Error, Result};
use crate::tracker::SeqNumTracker;
use crate::transport::{SocketHandle, SocketPool, Transport};
use crate::wire::{Buffer, Operation, Severity};

/// A Read IQ / Read RSSI request spanning one or more buffers.
pub struct ReadArgs {
    /// Buffer mask; decomposed into individual buffers in `Buffer::ALL`
    /// order.
    pub buffer_mask: u32,
    /// Read IQ vs. Read RSSI.
    pub operation: Operation,
    /// First sample index to read.
    pub start: u32,
    /// Number of samples to read, per buffer.
    pub num_samples: u32,
    /// Node id this request targets.
    pub dest_id: u16,
    /// Host id originating this request.
    pub src_id: u16,
    /// Action on a detected re-read of the same captured waveform.
    pub duplicate_severity: Severity,
}

/// Combined outcome of a (possibly multi-buffer, possibly chunked) Read
/// request: one [`ReadOutcome`] per buffer, merged across chunks.
pub struct ReadResult<E> {
    /// Per-buffer decoded samples, in `Buffer::ALL` order restricted to
    /// the requested mask.
    pub per_buffer: Vec<(Buffer, Vec<E>, Vec<E>)>,
    /// Aggregated telemetry across all buffers and chunks.
    pub stats: ReadStats,
}

fn merge_stats(acc: &mut ReadStats, other: ReadStats) {
    acc.packets_received += other.packets_received;
    acc.gap_retries += other.gap_retries;
    acc.not_ready_retries += other.not_ready_retries;
    acc.idle_spins += other.idle_spins;
}

/// Run a Read IQ / Read RSSI request, validating arguments, iterating
/// over every buffer in `args.buffer_mask`, and chunking each buffer's
/// request according to [`Context::read_max_request_bytes`].
#[allow(clippy::too_many_arguments)]
pub fn read_iq<T: Transport, C: SampleCodec>(
    ctx: &mut Context,
    pool: &mut SocketPool<T>,
    handle: SocketHandle,
    peer: SocketAddr,
    args: ReadArgs,
    seq_tracker: &mut SeqNumTracker,
    limits: RetryLimits,
    sleep: impl Fn(Duration) + Copy,
) -> Result<ReadResult<C::Elem>> {
    if args.num_samples == 0 {
        return Err(Error::ZeroLengthRequest);
    }
    let buffers = Buffer::decompose_mask(args.buffer_mask);
    if buffers.is_empty() {
        return Err(Error::NonSingularBufferId(args.buffer_mask));
    }

    let elem_size = 4usize; // one 32-bit sample word
    let max_chunk_samples =
        (ctx.read_max_request_bytes() / elem_size).max(1) as u32;

    let mut per_buffer = Vec::with_capacity(buffers.len());
    let mut total_stats = ReadStats::default();

    for buffer in buffers {
        let mut real_all = Vec::new();
        let mut imag_all = Vec::new();
        let mut cursor = args.start;
        let end = args.start + args.num_samples;

        while cursor < end {
            let chunk = max_chunk_samples.min(end - cursor);
            let req = ReadRequest {
                buffer,
                operation: args.operation,
                start: cursor,
                num_samples: chunk,
                dest_id: args.dest_id,
                src_id: args.src_id,
                duplicate_severity: args.duplicate_severity,
            };
            let outcome: ReadOutcome<C::Elem> = read_samples::<T, C>(
                ctx, pool, handle, peer, req, seq_tracker, limits, sleep,
            )?;
            real_all.extend(outcome.real);
            imag_all.extend(outcome.imag);
            merge_stats(&mut total_stats, outcome.stats);
            cursor += chunk;
        }

        per_buffer.push((buffer, real_all, imag_all));
    }

    Ok(ReadResult { per_buffer, stats: total_stats })
}

/// A Write IQ request spanning one or more buffers. Each buffer receives
/// the same sample data (mirroring the original's behavior of writing
/// identical waveforms to every selected buffer in one call).
pub struct WriteArgs {
    /// Buffer mask; decomposed into individual buffers in `Buffer::ALL`
    /// order.
    pub buffer_mask: u32,
    /// First sample index to write.
    pub start: u32,
    /// Maximum samples carried per packet.
    pub max_samples_per_pkt: u32,
    /// Node id this request targets.
    pub dest_id: u16,
    /// Host id originating this request.
    pub src_id: u16,
    /// Whether to verify the node's checksum, falling back to slow mode
    /// on mismatch.
    pub verify_checksum: bool,
}

/// Run a Write IQ request across every buffer in `args.buffer_mask`.
#[allow(clippy::too_many_arguments)]
pub fn write_iq<T: Transport, C: SampleCodec>(
    ctx: &mut Context,
    pool: &mut SocketPool<T>,
    handle: SocketHandle,
    peer: SocketAddr,
    args: WriteArgs,
    real: &[C::Elem],
    imag: Option<&[C::Elem]>,
    limits: RetryLimits,
    sleep: impl Fn(Duration) + Copy,
) -> Result<HashMap<Buffer, WriteOutcome>> {
    if real.is_empty() {
        return Err(Error::ZeroLengthRequest);
    }
    let buffers = Buffer::decompose_mask(args.buffer_mask);
    if buffers.is_empty() {
        return Err(Error::NonSingularBufferId(args.buffer_mask));
    }

    let mut outcomes = HashMap::with_capacity(buffers.len());
    for buffer in buffers {
        let req = WriteRequest {
            buffer,
            start: args.start,
            max_samples_per_pkt: args.max_samples_per_pkt,
            dest_id: args.dest_id,
            src_id: args.src_id,
            verify_checksum: args.verify_checksum,
        };
        let outcome =
            write_samples::<T, C>(ctx, pool, handle, peer, req, real, imag, limits, sleep)?;
        outcomes.insert(buffer, outcome);
    }

    Ok(outcomes)
}
