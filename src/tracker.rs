// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Duplicate-read and gap-detection bookkeeping: [`SeqNumTracker`] (mirrors
//! the original's 8-entry `seq_num_tracker` array and
//! `wl_update_seq_num`/`wl_check_seq_num` index arithmetic,
//! `examples/original_source/mex/wl_mex_udp_transport.c` lines 3006-3093)
//! and [`SampleTracker`] (the in-flight Read gap tracker of spec.md §3).

use log::{error, warn};

use crate::error::{Error, Result};
use crate::wire::{Buffer, Operation, Severity};

fn seq_num_slot(op: Operation, buffer: Buffer) -> usize {
    let base = match buffer {
        Buffer::A => 0,
        Buffer::B => 2,
        Buffer::C => 4,
        Buffer::D => 6,
    };
    base + match op {
        Operation::ReadIq => 0,
        Operation::ReadRssi => 1,
    }
}

/// Tracks the last-seen transport sequence number for each of the eight
/// `(Operation, Buffer)` pairs, detecting a re-read of an already-consumed
/// captured waveform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeqNumTracker {
    slots: [Option<u16>; 8],
}

impl SeqNumTracker {
    /// A fresh tracker with no recorded sequence numbers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `seq_num` as the last sequence number observed for
    /// `(op, buffer)`.
    pub fn update(&mut self, op: Operation, buffer: Buffer, seq_num: u16) {
        self.slots[seq_num_slot(op, buffer)] = Some(seq_num);
    }

    /// Check whether `seq_num` matches the previously recorded value for
    /// `(op, buffer)` and act according to `severity`: silently allow,
    /// log a warning and allow, or fail with
    /// [`Error::DuplicateWaveform`].
    pub fn check(
        &self,
        op: Operation,
        buffer: Buffer,
        seq_num: u16,
        severity: Severity,
    ) -> Result<()> {
        let matches = self.slots[seq_num_slot(op, buffer)] == Some(seq_num);
        if !matches {
            return Ok(());
        }
        match severity {
            Severity::Ignore => Ok(()),
            Severity::Warning => {
                warn!(
                    "detected repeated read of the same {:?} waveform on buffer {:?}; \
                     if unintentional, check the node's trigger configuration",
                    op, buffer
                );
                Ok(())
            }
            Severity::Error => {
                error!("repeated read of the same {:?} waveform on buffer {:?}", op, buffer);
                Err(Error::DuplicateWaveform { buffer, operation: op })
            }
        }
    }
}

/// One contiguous run of sample indices already received for an in-flight
/// Read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u32,
    count: u32,
}

/// Tracks which sample indices have been received for one in-flight Read
/// IQ / Read RSSI operation, merging contiguous runs so a gap can be
/// identified by the arithmetic-progression identity: a request for
/// `num_pkts` packets of `max_samples` starting at `start` is complete
/// iff the tracker holds exactly one run `(start, num_pkts * max_samples)`
/// — any other shape means a packet was lost.
#[derive(Debug, Clone, Default)]
pub struct SampleTracker {
    runs: Vec<Run>,
}

impl SampleTracker {
    /// A fresh tracker with nothing received yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record receipt of `count` samples starting at `start`, merging
    /// with any adjacent existing run.
    pub fn record(&mut self, start: u32, count: u32) {
        if count == 0 {
            return;
        }
        let end = start + count;
        self.runs.push(Run { start, count });
        self.runs.sort_by_key(|r| r.start);

        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if let Some(last) = merged.last_mut() {
                let last_end = last.start + last.count;
                if run.start <= last_end {
                    let new_end = last_end.max(run.start + run.count);
                    last.count = new_end - last.start;
                    continue;
                }
            }
            merged.push(run);
        }
        self.runs = merged;
        debug_assert!(self.runs.iter().all(|r| r.start + r.count <= end || r.start >= start));
    }

    /// Whether exactly `total` contiguous samples starting at `start`
    /// have been received, with no gaps.
    pub fn is_complete(&self, start: u32, total: u32) -> bool {
        self.runs.len() == 1 && self.runs[0] == Run { start, count: total }
    }

    /// The first missing sample index within `[start, start + total)`, if
    /// any, for use as the restart point of a gap-fill retry.
    pub fn first_gap(&self, start: u32, total: u32) -> Option<u32> {
        if self.is_complete(start, total) {
            return None;
        }
        let mut cursor = start;
        for run in &self.runs {
            if run.start > cursor {
                return Some(cursor);
            }
            cursor = cursor.max(run.start + run.count);
        }
        if cursor < start + total {
            Some(cursor)
        } else {
            None
        }
    }
}
