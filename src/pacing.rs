// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wait-time estimation (C3): how long the host should sleep before
//! polling again after sending a Write IQ packet, or before retrying a
//! busy node.
//!
//! Grounded on `wl_compute_write_wait_time` (hw v2/v3 split) and
//! `wl_compute_sample_wait_time` in
//! `examples/original_source/mex/wl_mex_udp_transport.c` lines 3794-3999.

/// Node hardware revision, which changes the write pacing formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwVersion {
    /// WARP v2-class node.
    V2,
    /// WARP v3-class node.
    V3,
}

/// Estimate the wait time, in microseconds, the host should sleep after
/// sending one Write IQ packet before polling for the node's response.
///
/// `buffer_mask` is the set of buffers targeted by this write;
/// `samples_per_pkt` is the packet's sample count.
pub fn write_wait_time_us(hw: HwVersion, buffer_mask: u32, samples_per_pkt: u32) -> u32 {
    match hw {
        HwVersion::V2 => {
            let buffer_count = (buffer_mask & 0xF).count_ones();
            80 + 80 * buffer_count
        }
        HwVersion::V3 => {
            if samples_per_pkt < 2048 {
                if buffer_mask & 0xF == 0xF {
                    50
                } else {
                    40
                }
            } else {
                0
            }
        }
    }
}

/// Bytes per microsecond the node's radio front end can sustain; used to
/// derive a busy-wait time from outstanding tx/rx byte counts.
const BYTES_PER_US: u32 = 160;

/// Estimate the wait time, in microseconds, before a node reporting
/// `IQ_NOT_READY`/busy is likely to have drained its outstanding tx/rx
/// work, given the byte counts it last reported.
pub fn busy_wait_time_us(tx_bytes_outstanding: u32, rx_bytes_outstanding: u32) -> u32 {
    let tx_wait = tx_bytes_outstanding / BYTES_PER_US;
    let rx_wait = rx_bytes_outstanding / BYTES_PER_US;
    tx_wait.max(rx_wait)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_wait_time_scales_with_buffer_count() {
        assert_eq!(write_wait_time_us(HwVersion::V2, 0x1, 512), 160);
        assert_eq!(write_wait_time_us(HwVersion::V2, 0xF, 512), 400);
        assert_eq!(write_wait_time_us(HwVersion::V2, 0x0, 512), 80);
    }

    #[test]
    fn v3_wait_time_depends_on_packet_size_and_mask() {
        assert_eq!(write_wait_time_us(HwVersion::V3, 0xF, 1024), 50);
        assert_eq!(write_wait_time_us(HwVersion::V3, 0x3, 1024), 40);
        assert_eq!(write_wait_time_us(HwVersion::V3, 0xF, 4096), 0);
    }

    #[test]
    fn busy_wait_picks_the_longer_of_tx_and_rx() {
        assert_eq!(busy_wait_time_us(1600, 320), 10);
        assert_eq!(busy_wait_time_us(160, 3200), 20);
        assert_eq!(busy_wait_time_us(0, 0), 0);
    }
}
