// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the IQ/RSSI transport core.

use crate::wire::{Buffer, Operation};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the Read IQ / Read RSSI / Write IQ engines.
///
/// Fatal-protocol conditions (§7 of SPEC_FULL) unwind the whole operation;
/// retried-locally conditions never surface here because the engines
/// absorb them internally up to their retry caps.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Node reported `SAMPLE_IQ_ERROR` / `IQ_ERROR`: it is in continuous-TX
    /// mode and cannot service the request.
    #[error("node is in continuous-TX mode and cannot service this request")]
    NodeContinuousTx,

    /// A Read or Write operation exhausted its retry budget.
    #[error("exceeded {attempted} retries without a valid response from the node")]
    RetriesExhausted {
        /// Number of retries attempted before giving up.
        attempted: u32,
    },

    /// A Write IQ checksum mismatch occurred while already in slow mode.
    #[error("checksum mismatch in slow-write mode; node and host disagree on packet contents")]
    ChecksumMismatchInSlowMode,

    /// The number of bytes handed to the transport did not match the
    /// packet's declared length.
    #[error("packet length mismatch: declared {expected} bytes, transport sent {actual}")]
    PacketLengthMismatch {
        /// Declared packet length.
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// The node's `sample_iq_id` for this (buffer, operation) matches the
    /// previous read, i.e. the same captured waveform would be read twice.
    #[error("duplicate read of buffer {buffer:?} ({operation:?}): waveform already consumed")]
    DuplicateWaveform {
        /// Buffer the duplicate was detected on.
        buffer: Buffer,
        /// Read operation kind.
        operation: Operation,
    },

    /// An unrecognized wire data-type code was supplied.
    #[error("invalid data-type code: {0}")]
    InvalidDataType(u8),

    /// A buffer-id mask did not select exactly one buffer where one was
    /// required.
    #[error("buffer id {0:#x} is not a singular buffer selection")]
    NonSingularBufferId(u32),

    /// An input/output array did not have the expected shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count observed.
        actual: usize,
    },

    /// A read or write for zero samples was requested.
    #[error("zero-length sample request")]
    ZeroLengthRequest,

    /// A transport-level (socket) error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by the socket-handle pool / send-recv primitive.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The handle pool has no free slots (`MAX_SOCKETS` already in use).
    #[error("socket handle pool exhausted")]
    PoolExhausted,

    /// The handle index passed by the caller is out of range or closed.
    #[error("invalid or closed socket handle")]
    InvalidHandle,

    /// A non-recoverable socket error surfaced from the underlying OS call.
    #[error("fatal socket error (os code {0})")]
    Fatal(i32),
}
