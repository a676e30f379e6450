// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire format: transport/command/sample headers and the small enums that
//! index into them (buffer id, operation kind, severity, data type).
//!
//! Grounded on `wl_transport_header` / `wl_command_header` /
//! `wl_sample_header` in `examples/original_source/mex/wl_mex_udp_transport.c`
//! and on the encode/decode style of `hdds-micro`'s `rtps::header::RtpsHeader`.

use crate::error::{Error, Result};

/// Transport header flag: request an acknowledgement.
pub const FLAG_ROBUST: u16 = 0x0001;
/// Transport header flag: node signals it cannot service the request yet.
pub const FLAG_NODE_NOT_READY: u16 = 0x8000;

/// Sample header flag: node is in continuous-TX and cannot supply samples.
pub const SAMPLE_FLAG_IQ_ERROR: u8 = 0x01;
/// Sample header flag: node is busy; retry after the estimated wait time.
pub const SAMPLE_FLAG_IQ_NOT_READY: u8 = 0x02;
/// Sample header flag: first packet of a Write IQ operation (checksum reset).
pub const SAMPLE_FLAG_CHKSUM_RESET: u8 = 0x10;
/// Sample header flag: last packet of a Write IQ operation.
pub const SAMPLE_FLAG_LAST_WRITE: u8 = 0x20;

/// On-node memory buffer associated with one RF chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Buffer {
    /// RF chain A.
    A,
    /// RF chain B.
    B,
    /// RF chain C.
    C,
    /// RF chain D.
    D,
}

impl Buffer {
    /// All four buffers, in bit order.
    pub const ALL: [Buffer; 4] = [Buffer::A, Buffer::B, Buffer::C, Buffer::D];

    /// Bitmask used on the wire (`buffer_id` command argument).
    pub const fn bits(self) -> u32 {
        match self {
            Buffer::A => 0x1,
            Buffer::B => 0x2,
            Buffer::C => 0x4,
            Buffer::D => 0x8,
        }
    }

    /// Decode a singular buffer selection from a mask, rejecting masks
    /// that select zero or more than one buffer.
    pub fn from_singular_mask(mask: u32) -> Result<Buffer> {
        for b in Self::ALL {
            if mask == b.bits() {
                return Ok(b);
            }
        }
        Err(Error::NonSingularBufferId(mask))
    }

    /// Decompose a (possibly multi-buffer) mask into its constituent
    /// buffers, in A..D order.
    pub fn decompose_mask(mask: u32) -> Vec<Buffer> {
        Self::ALL.into_iter().filter(|b| mask & b.bits() != 0).collect()
    }
}

/// Read operation kind; selects which rolling IQ id and sequence-number
/// slot an operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read IQ samples.
    ReadIq,
    /// Read RSSI samples.
    ReadRssi,
}

/// Severity used when a sequence-number match (re-read of the same
/// captured waveform) is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Silently allow the re-read.
    Ignore,
    /// Emit one warning and allow the re-read.
    Warning,
    /// Fail the operation with [`Error::DuplicateWaveform`].
    Error,
}

/// Host sample representation selecting both the decode path for reads
/// and the encode path for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Complex double precision in `[-1, +1]`.
    Double,
    /// Complex single precision in `[-1, +1]`.
    Single,
    /// Complex signed 16-bit fixed point.
    Int16,
    /// Real raw 32-bit words, opaque pass-through.
    Raw,
}

impl DataType {
    /// Decode the wire data-type code (0..3).
    pub fn from_code(code: u8) -> Result<DataType> {
        match code {
            0 => Ok(DataType::Double),
            1 => Ok(DataType::Single),
            2 => Ok(DataType::Int16),
            3 => Ok(DataType::Raw),
            other => Err(Error::InvalidDataType(other)),
        }
    }

    /// Wire data-type code.
    pub const fn code(self) -> u8 {
        match self {
            DataType::Double => 0,
            DataType::Single => 1,
            DataType::Int16 => 2,
            DataType::Raw => 3,
        }
    }
}

/// Transport header: 2 bytes padding, then six big-endian fields.
///
/// `padding(2) dest_id(2) src_id(2) reserved(1) pkt_type(1) length(2)
/// seq_num(2) flags(2)` — 14 bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportHeader {
    /// Destination node id.
    pub dest_id: u16,
    /// Source (host) id.
    pub src_id: u16,
    /// Packet type, protocol-defined.
    pub pkt_type: u8,
    /// Payload length in bytes (command header + sample header + samples).
    pub length: u16,
    /// Monotone sequence number for this transport stream.
    pub seq_num: u16,
    /// Flag bits: [`FLAG_ROBUST`] / [`FLAG_NODE_NOT_READY`].
    pub flags: u16,
}

impl TransportHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 14;

    /// Encode into `buf`, which must be at least [`Self::SIZE`] bytes.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < Self::SIZE {
            return Err(Error::ShapeMismatch { expected: Self::SIZE, actual: buf.len() });
        }
        buf[0..2].copy_from_slice(&[0, 0]); // padding
        buf[2..4].copy_from_slice(&self.dest_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.src_id.to_be_bytes());
        buf[6] = 0; // reserved
        buf[7] = self.pkt_type;
        buf[8..10].copy_from_slice(&self.length.to_be_bytes());
        buf[10..12].copy_from_slice(&self.seq_num.to_be_bytes());
        buf[12..14].copy_from_slice(&self.flags.to_be_bytes());
        Ok(())
    }

    /// Decode from `buf`, which must be at least [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<TransportHeader> {
        if buf.len() < Self::SIZE {
            return Err(Error::ShapeMismatch { expected: Self::SIZE, actual: buf.len() });
        }
        Ok(TransportHeader {
            dest_id: u16::from_be_bytes([buf[2], buf[3]]),
            src_id: u16::from_be_bytes([buf[4], buf[5]]),
            pkt_type: buf[7],
            length: u16::from_be_bytes([buf[8], buf[9]]),
            seq_num: u16::from_be_bytes([buf[10], buf[11]]),
            flags: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }
}

/// Command header: `command_id(4) length(2) num_args(2)` — 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandHeader {
    /// Protocol-defined command identifier.
    pub command_id: u32,
    /// Payload length in bytes following this header.
    pub length: u16,
    /// Number of 32-bit command arguments.
    pub num_args: u16,
}

impl CommandHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Encode into `buf`, which must be at least [`Self::SIZE`] bytes.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < Self::SIZE {
            return Err(Error::ShapeMismatch { expected: Self::SIZE, actual: buf.len() });
        }
        buf[0..4].copy_from_slice(&self.command_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.length.to_be_bytes());
        buf[6..8].copy_from_slice(&self.num_args.to_be_bytes());
        Ok(())
    }

    /// Decode from `buf`, which must be at least [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<CommandHeader> {
        if buf.len() < Self::SIZE {
            return Err(Error::ShapeMismatch { expected: Self::SIZE, actual: buf.len() });
        }
        Ok(CommandHeader {
            command_id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            num_args: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }
}

/// Sample header: `buffer_id(2) flags(1) sample_iq_id(1) start(4)
/// num_samples(4)` — 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleHeader {
    /// Buffer-id mask this packet concerns.
    pub buffer_id: u16,
    /// Flag bits: error/not-ready for reads, checksum-reset/last for writes.
    pub flags: u8,
    /// Rolling 8-bit id of the current Read/Write IQ operation.
    pub sample_iq_id: u8,
    /// Starting sample index of this packet.
    pub start: u32,
    /// Sample count carried by this packet.
    pub num_samples: u32,
}

impl SampleHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 12;

    /// Encode into `buf`, which must be at least [`Self::SIZE`] bytes.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < Self::SIZE {
            return Err(Error::ShapeMismatch { expected: Self::SIZE, actual: buf.len() });
        }
        buf[0..2].copy_from_slice(&self.buffer_id.to_be_bytes());
        buf[2] = self.flags;
        buf[3] = self.sample_iq_id;
        buf[4..8].copy_from_slice(&self.start.to_be_bytes());
        buf[8..12].copy_from_slice(&self.num_samples.to_be_bytes());
        Ok(())
    }

    /// Decode from `buf`, which must be at least [`Self::SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<SampleHeader> {
        if buf.len() < Self::SIZE {
            return Err(Error::ShapeMismatch { expected: Self::SIZE, actual: buf.len() });
        }
        Ok(SampleHeader {
            buffer_id: u16::from_be_bytes([buf[0], buf[1]]),
            flags: buf[2],
            sample_iq_id: buf[3],
            start: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            num_samples: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_header_round_trips() {
        let hdr = TransportHeader {
            dest_id: 1,
            src_id: 2,
            pkt_type: 7,
            length: 300,
            seq_num: 42,
            flags: FLAG_ROBUST,
        };
        let mut buf = [0u8; TransportHeader::SIZE];
        hdr.encode(&mut buf).unwrap();
        assert_eq!(TransportHeader::decode(&buf).unwrap(), hdr);
    }

    #[test]
    fn sample_header_round_trips() {
        let hdr = SampleHeader {
            buffer_id: Buffer::A.bits() as u16,
            flags: SAMPLE_FLAG_CHKSUM_RESET | SAMPLE_FLAG_LAST_WRITE,
            sample_iq_id: 5,
            start: 1024,
            num_samples: 256,
        };
        let mut buf = [0u8; SampleHeader::SIZE];
        hdr.encode(&mut buf).unwrap();
        assert_eq!(SampleHeader::decode(&buf).unwrap(), hdr);
    }

    #[test]
    fn buffer_singular_mask() {
        assert_eq!(Buffer::from_singular_mask(0x4).unwrap(), Buffer::C);
        assert!(Buffer::from_singular_mask(0x3).is_err());
        assert!(Buffer::from_singular_mask(0).is_err());
    }

    #[test]
    fn buffer_decompose_mask() {
        assert_eq!(Buffer::decompose_mask(0xF), vec![Buffer::A, Buffer::B, Buffer::C, Buffer::D]);
        assert_eq!(Buffer::decompose_mask(0x5), vec![Buffer::A, Buffer::C]);
    }

    #[test]
    fn data_type_round_trips() {
        for code in 0..=3u8 {
            let dt = DataType::from_code(code).unwrap();
            assert_eq!(dt.code(), code);
        }
        assert!(DataType::from_code(4).is_err());
    }
}
