// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # sdr-iq-transport
//!
//! A reliable chunked Read IQ / Read RSSI / Write IQ protocol over UDP for
//! software-defined-radio testbed nodes.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------+
//! |  dispatcher (multi-buffer, chunking)     |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  engine::read / engine::write            |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  wire (headers) / codec / checksum       |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  transport (socket pool, send/recv)      |
//! +-----------------------------------------+
//! ```
//!
//! The crate is single-threaded and cooperative: no locks, no async
//! runtime, no background tasks. Callers own a [`context::Context`] and
//! pass it (along with a [`transport::SocketPool`]) into every call.
//!
//! ## Design constraints
//!
//! - No panics on the request path; every fallible operation returns
//!   [`error::Result`].
//! - No process-wide globals; rolling ids and pacing overrides live in an
//!   explicit [`context::Context`] value the caller owns.
//! - Per-sample decode/encode is generic over [`codec::SampleCodec`]
//!   rather than dispatched on a runtime data-type tag.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Fletcher-32 checksum with domain-specific reinforcement.
pub mod checksum;
/// Byte codec: saturating Fix_16_15 conversion and the `SampleCodec` trait.
pub mod codec;
/// Explicit per-session state: rolling ids, pacing overrides, warning suppression.
pub mod context;
/// Multi-buffer, chunking entry points.
pub mod dispatcher;
/// Read IQ / Read RSSI and Write IQ engines.
pub mod engine;
/// Crate-wide error type.
pub mod error;
/// Wait-time estimation for Write IQ pacing and busy-node backoff.
pub mod pacing;
/// Socket handle pool and reliable send/recv primitive.
pub mod transport;
/// Duplicate-read and sample-gap tracking.
pub mod tracker;
/// Wire format: headers and the enums that index into them.
pub mod wire;

pub use codec::{DoubleCodec, Int16Codec, RawCodec, SampleCodec, SingleCodec};
pub use context::Context;
pub use dispatcher::{read_iq, write_iq, ReadArgs, ReadResult, WriteArgs};
pub use engine::{ReadOutcome, ReadStats, RetryLimits, WriteOutcome};
pub use error::{Error, Result, TransportError};
pub use pacing::HwVersion;
pub use tracker::{SampleTracker, SeqNumTracker};
pub use transport::{SocketHandle, SocketPool, Transport, MAX_SOCKETS};
pub use wire::{Buffer, DataType, Operation, Severity};
