// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explicit per-session state (§9 redesign flag: "process-wide rolling IDs
//! and overrides become an explicit `Context` value" instead of the
//! original's file-scope static globals, e.g. `sample_iq_id`,
//! `write_wait_time_override`, `suppress_warnings` in
//! `examples/original_source/mex/wl_mex_udp_transport.c`).
//!
//! A `Context` is owned by the caller and threaded through every
//! `read_iq`/`read_rssi`/`write_iq` call; nothing in this crate reaches
//! for a global or thread-local in its place.

use crate::pacing::HwVersion;
use crate::wire::{Buffer, Operation};

/// Rolling 8-bit ids, one per `(Operation, Buffer)` pair, incremented each
/// time that operation completes against that buffer. Mirrors the
/// original's per-buffer `sample_iq_id` arrays (one for read, one for
/// write) rather than a single crate-wide counter.
#[derive(Debug, Clone, Copy, Default)]
struct RollingIds {
    read_iq: [u8; 4],
    read_rssi: [u8; 4],
    write_iq: [u8; 4],
}

impl RollingIds {
    fn slot(&mut self, op: Operation, buffer: Buffer) -> &mut u8 {
        let table = match op {
            Operation::ReadIq => &mut self.read_iq,
            Operation::ReadRssi => &mut self.read_rssi,
        };
        &mut table[buffer_index(buffer)]
    }
}

fn buffer_index(buffer: Buffer) -> usize {
    match buffer {
        Buffer::A => 0,
        Buffer::B => 1,
        Buffer::C => 2,
        Buffer::D => 3,
    }
}

/// Owned session state for one host's Read/Write IQ traffic: rolling
/// per-buffer ids, user pacing overrides, and the warning-suppression
/// flag. Not `Clone`/`Copy` — callers hold one `Context` per logical
/// session and pass `&mut Context` into each operation.
pub struct Context {
    read_ids: RollingIds,
    write_id: [u8; 4],
    hw_version: HwVersion,
    write_wait_override_us: Option<u32>,
    read_max_request_bytes: usize,
    suppress_iq_warnings: bool,
}

/// Default chunk size cap for a single Read request before the
/// dispatcher splits it into multiple packets, matching the original's
/// default receive-buffer-derived chunk size.
const DEFAULT_READ_MAX_REQUEST_BYTES: usize = 1 << 20;

impl Context {
    /// Create a new session context for a node of the given hardware
    /// revision, with all rolling ids at zero and no overrides set.
    pub fn new(hw_version: HwVersion) -> Self {
        Self {
            read_ids: RollingIds::default(),
            write_id: [0; 4],
            hw_version,
            write_wait_override_us: None,
            read_max_request_bytes: DEFAULT_READ_MAX_REQUEST_BYTES,
            suppress_iq_warnings: false,
        }
    }

    /// Current rolling id for `(op, buffer)`, for comparison against a
    /// newly observed `sample_iq_id`.
    pub fn current_read_id(&mut self, op: Operation, buffer: Buffer) -> u8 {
        *self.read_ids.slot(op, buffer)
    }

    /// Advance the rolling read id for `(op, buffer)` after a successful
    /// read, wrapping at 8 bits exactly as the node's own counter does.
    pub fn advance_read_id(&mut self, op: Operation, buffer: Buffer) {
        let slot = self.read_ids.slot(op, buffer);
        *slot = slot.wrapping_add(1);
    }

    /// Current rolling write id for `buffer`.
    pub fn current_write_id(&self, buffer: Buffer) -> u8 {
        self.write_id[buffer_index(buffer)]
    }

    /// Advance the rolling write id for `buffer` after a successful write.
    pub fn advance_write_id(&mut self, buffer: Buffer) {
        let slot = &mut self.write_id[buffer_index(buffer)];
        *slot = slot.wrapping_add(1);
    }

    /// The node's hardware revision, used by the pacing estimator.
    pub fn hw_version(&self) -> HwVersion {
        self.hw_version
    }

    /// Override the computed write wait time with a fixed value in
    /// microseconds, bypassing [`crate::pacing::write_wait_time_us`].
    pub fn set_write_wait_time(&mut self, micros: Option<u32>) {
        self.write_wait_override_us = micros;
    }

    /// The current write-wait override, if any.
    pub fn write_wait_override(&self) -> Option<u32> {
        self.write_wait_override_us
    }

    /// Set the maximum number of sample bytes requested in a single Read
    /// packet before the dispatcher chunks the request.
    pub fn set_read_max_request_size(&mut self, bytes: usize) {
        self.read_max_request_bytes = bytes;
    }

    /// The current Read chunk-size cap, in bytes.
    pub fn read_max_request_bytes(&self) -> usize {
        self.read_max_request_bytes
    }

    /// Suppress (or re-enable) the one-time-per-operation warnings the
    /// Read/Write engines log via [`log::warn!`].
    pub fn suppress_iq_warnings(&mut self, suppress: bool) {
        self.suppress_iq_warnings = suppress;
    }

    /// Whether IQ warnings are currently suppressed.
    pub fn warnings_suppressed(&self) -> bool {
        self.suppress_iq_warnings
    }
}
