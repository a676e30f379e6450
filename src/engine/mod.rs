// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Read IQ / Read RSSI engine (C6) and Write IQ engine (C7).

pub mod read;
pub mod write;

pub use read::{read_samples, ReadOutcome, ReadRequest, ReadStats};
pub use write::{write_samples, WriteOutcome, WriteRequest};

/// Per-call retry limits shared by the Read and Write engines, mirroring
/// the original's `TRANSPORT_MAX_RETRY` / `SAMPLE_IQ_MAX_RETRY` constants.
#[derive(Debug, Clone, Copy)]
pub struct RetryLimits {
    /// Maximum timeout-driven retransmissions before giving up.
    pub max_timeout_retries: u32,
    /// Maximum "node not ready" retries before giving up.
    pub max_not_ready_retries: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self { max_timeout_retries: 2, max_not_ready_retries: 50 }
    }
}
