// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic in-process stand-in for a testbed node, implementing
//! [`sdr_iq_transport::Transport`] so the end-to-end tests can drive the
//! Read/Write engines without a real socket.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use sdr_iq_transport::checksum::FletcherChecksum;
use sdr_iq_transport::{Buffer, Result, Transport};

/// Programmable behavior a [`NodeSim`] exhibits for the next request it
/// services.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeScript {
    /// Drop (do not respond to) the first data packet that would be sent,
    /// forcing the host to hit its gap-retry path.
    pub drop_first_packet_once: bool,
    /// Report `SAMPLE_IQ_NOT_READY` this many times before succeeding.
    pub not_ready_count: u32,
    /// Report a checksum mismatch on the first Write IQ fast-mode ack,
    /// forcing a fall back to slow mode.
    pub force_checksum_mismatch_once: bool,
}

/// A simulated node: serves Read IQ / Read RSSI from pre-loaded sample
/// data, and records incoming Write IQ payloads.
pub struct NodeSim {
    addr: SocketAddr,
    read_samples: HashMap<Buffer, Vec<u32>>,
    write_samples: HashMap<Buffer, Vec<u32>>,
    write_checksum: HashMap<Buffer, FletcherChecksum>,
    outbox: VecDeque<(Vec<u8>, SocketAddr)>,
    script: NodeScript,
    not_ready_remaining: u32,
    dropped_once: bool,
    mismatch_remaining: bool,
}

const TPORT_HDR: usize = 14;
const CMD_HDR: usize = 8;
const SAMPLE_HDR: usize = 12;
const ALL_HDR: usize = TPORT_HDR + CMD_HDR + SAMPLE_HDR;

const SAMPLE_FLAG_IQ_NOT_READY: u8 = 0x02;

impl NodeSim {
    /// Create a simulator at the given loopback-style address with no
    /// preloaded data and a default (no-op) script.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            read_samples: HashMap::new(),
            write_samples: HashMap::new(),
            write_checksum: HashMap::new(),
            outbox: VecDeque::new(),
            script: NodeScript::default(),
            not_ready_remaining: 0,
            dropped_once: false,
            mismatch_remaining: false,
        }
    }

    /// Install a behavior script for subsequent requests.
    pub fn set_script(&mut self, script: NodeScript) {
        self.script = script;
        self.not_ready_remaining = script.not_ready_count;
        self.dropped_once = false;
        self.mismatch_remaining = script.force_checksum_mismatch_once;
    }

    /// Preload the samples the node will serve for a Read IQ request on
    /// `buffer`: each `u32` is one big-endian I/Q word.
    pub fn load_read_samples(&mut self, buffer: Buffer, words: Vec<u32>) {
        self.read_samples.insert(buffer, words);
    }

    /// Words received via Write IQ for `buffer`, in arrival order.
    pub fn received_write_samples(&self, buffer: Buffer) -> Option<&[u32]> {
        self.write_samples.get(&buffer).map(|v| v.as_slice())
    }

    fn buffer_from_bits(bits: u16) -> Option<Buffer> {
        Buffer::ALL.into_iter().find(|b| b.bits() as u16 == bits)
    }

    fn handle_read(&mut self, buf: &[u8], from: SocketAddr) {
        let dest_id = u16::from_be_bytes([buf[2], buf[3]]);
        let src_id = u16::from_be_bytes([buf[4], buf[5]]);
        let seq_num = u16::from_be_bytes([buf[10], buf[11]]);
        let buffer_id = u16::from_be_bytes([buf[TPORT_HDR + CMD_HDR], buf[TPORT_HDR + CMD_HDR + 1]]);
        let sample_iq_id = buf[TPORT_HDR + CMD_HDR + 3];
        let start = u32::from_be_bytes([
            buf[TPORT_HDR + CMD_HDR + 4],
            buf[TPORT_HDR + CMD_HDR + 5],
            buf[TPORT_HDR + CMD_HDR + 6],
            buf[TPORT_HDR + CMD_HDR + 7],
        ]);
        let num_samples = u32::from_be_bytes([
            buf[TPORT_HDR + CMD_HDR + 8],
            buf[TPORT_HDR + CMD_HDR + 9],
            buf[TPORT_HDR + CMD_HDR + 10],
            buf[TPORT_HDR + CMD_HDR + 11],
        ]);

        let buffer = match Self::buffer_from_bits(buffer_id) {
            Some(b) => b,
            None => return,
        };

        if self.not_ready_remaining > 0 {
            self.not_ready_remaining -= 1;
            self.outbox.push_back((
                self.encode_response(dest_id, src_id, seq_num, buffer_id, sample_iq_id, 0, SAMPLE_FLAG_IQ_NOT_READY, start, 0, &[]),
                from,
            ));
            return;
        }

        let data = self.read_samples.get(&buffer).cloned().unwrap_or_default();
        let avail = data.len() as u32;
        let count = num_samples.min(avail.saturating_sub(start));
        if count == 0 {
            return;
        }

        if self.script.drop_first_packet_once && !self.dropped_once {
            self.dropped_once = true;
            return;
        }

        let words = &data[start as usize..(start + count) as usize];
        let mut payload = Vec::with_capacity(words.len() * 4);
        for w in words {
            payload.extend_from_slice(&w.to_be_bytes());
        }
        self.outbox.push_back((
            self.encode_response(dest_id, src_id, seq_num, buffer_id, sample_iq_id, 0, 0, start, count, &payload),
            from,
        ));
    }

    fn handle_write(&mut self, buf: &[u8], from: SocketAddr) {
        let dest_id = u16::from_be_bytes([buf[2], buf[3]]);
        let src_id = u16::from_be_bytes([buf[4], buf[5]]);
        let seq_num = u16::from_be_bytes([buf[10], buf[11]]);
        let transport_flags = u16::from_be_bytes([buf[12], buf[13]]);
        let buffer_id = u16::from_be_bytes([buf[TPORT_HDR + CMD_HDR], buf[TPORT_HDR + CMD_HDR + 1]]);
        let sample_flags = buf[TPORT_HDR + CMD_HDR + 2];
        let sample_iq_id = buf[TPORT_HDR + CMD_HDR + 3];
        let start = u32::from_be_bytes([
            buf[TPORT_HDR + CMD_HDR + 4],
            buf[TPORT_HDR + CMD_HDR + 5],
            buf[TPORT_HDR + CMD_HDR + 6],
            buf[TPORT_HDR + CMD_HDR + 7],
        ]);
        let num_samples = u32::from_be_bytes([
            buf[TPORT_HDR + CMD_HDR + 8],
            buf[TPORT_HDR + CMD_HDR + 9],
            buf[TPORT_HDR + CMD_HDR + 10],
            buf[TPORT_HDR + CMD_HDR + 11],
        ]);

        let buffer = match Self::buffer_from_bits(buffer_id) {
            Some(b) => b,
            None => return,
        };

        const SAMPLE_FLAG_CHKSUM_RESET: u8 = 0x10;
        const SAMPLE_FLAG_LAST_WRITE: u8 = 0x20;
        let reset = sample_flags & SAMPLE_FLAG_CHKSUM_RESET != 0;
        if reset {
            self.write_samples.insert(buffer, Vec::new());
        }

        let payload = &buf[ALL_HDR..];
        let entry = self.write_samples.entry(buffer).or_default();
        let checksum = self.write_checksum.entry(buffer).or_insert_with(FletcherChecksum::new);
        checksum.feed_packet_start(start, reset);

        let mut last_i = 0i16;
        let mut last_q = 0i16;
        for i in 0..num_samples as usize {
            let w = u32::from_be_bytes([
                payload[i * 4],
                payload[i * 4 + 1],
                payload[i * 4 + 2],
                payload[i * 4 + 3],
            ]);
            last_i = (w >> 16) as i16;
            last_q = (w & 0xFFFF) as i16;
            entry.push(w);
        }
        if sample_flags & SAMPLE_FLAG_LAST_WRITE != 0 {
            checksum.feed_last_sample(last_i, last_q);
        }

        const FLAG_ROBUST: u16 = 0x0001;
        if transport_flags & FLAG_ROBUST != 0 {
            let node_checksum = if self.mismatch_remaining {
                self.mismatch_remaining = false;
                !checksum.finish()
            } else {
                checksum.finish()
            };

            let mut resp_payload = Vec::with_capacity(20);
            resp_payload.extend_from_slice(&0u32.to_be_bytes()); // status = success
            resp_payload.extend_from_slice(&(sample_iq_id as u32).to_be_bytes());
            resp_payload.extend_from_slice(&node_checksum.to_be_bytes());
            resp_payload.extend_from_slice(&0u32.to_be_bytes());
            resp_payload.extend_from_slice(&0u32.to_be_bytes());

            self.outbox.push_back((
                self.encode_response(dest_id, src_id, seq_num, buffer_id, sample_iq_id, 0, 0, start, 0, &resp_payload),
                from,
            ));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_response(
        &self,
        dest_id: u16,
        src_id: u16,
        seq_num: u16,
        buffer_id: u16,
        sample_iq_id: u8,
        _unused: u8,
        sample_flags: u8,
        start: u32,
        num_samples: u32,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut buf = vec![0u8; ALL_HDR + payload.len()];
        buf[2..4].copy_from_slice(&src_id.to_be_bytes());
        buf[4..6].copy_from_slice(&dest_id.to_be_bytes());
        buf[8..10].copy_from_slice(&((CMD_HDR + SAMPLE_HDR + payload.len()) as u16).to_be_bytes());
        buf[10..12].copy_from_slice(&seq_num.to_be_bytes());
        buf[TPORT_HDR..TPORT_HDR + 4].copy_from_slice(&0u32.to_be_bytes());
        buf[TPORT_HDR + 4..TPORT_HDR + 6].copy_from_slice(&((SAMPLE_HDR + payload.len()) as u16).to_be_bytes());
        buf[TPORT_HDR + 6..TPORT_HDR + 8].copy_from_slice(&1u16.to_be_bytes());
        buf[TPORT_HDR + CMD_HDR..TPORT_HDR + CMD_HDR + 2].copy_from_slice(&buffer_id.to_be_bytes());
        buf[TPORT_HDR + CMD_HDR + 2] = sample_flags;
        buf[TPORT_HDR + CMD_HDR + 3] = sample_iq_id;
        buf[TPORT_HDR + CMD_HDR + 4..TPORT_HDR + CMD_HDR + 8].copy_from_slice(&start.to_be_bytes());
        buf[TPORT_HDR + CMD_HDR + 8..TPORT_HDR + CMD_HDR + 12].copy_from_slice(&num_samples.to_be_bytes());
        buf[ALL_HDR..].copy_from_slice(payload);
        buf
    }
}

impl Transport for NodeSim {
    fn send_to(&mut self, data: &[u8], _dest: SocketAddr) -> Result<usize> {
        if data.len() < ALL_HDR {
            return Ok(data.len());
        }
        let command_id = u32::from_be_bytes([
            data[TPORT_HDR],
            data[TPORT_HDR + 1],
            data[TPORT_HDR + 2],
            data[TPORT_HDR + 3],
        ]);
        let from = self.addr;
        match command_id {
            1 | 2 => self.handle_read(data, from),
            3 => self.handle_write(data, from),
            _ => {}
        }
        Ok(data.len())
    }

    fn try_recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.outbox.pop_front() {
            Some((bytes, from)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(Some((len, from)))
            }
            None => Ok(None),
        }
    }

    fn mtu(&self) -> usize {
        9000
    }
}
