// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte codec (C1): big-endian 16/32-bit swap, saturating Fix_16_15
//! conversion, RSSI unpack, and a [`SampleCodec`] trait monomorphized per
//! host sample representation instead of switching on a data-type tag in
//! the hot loop (SPEC_FULL §9 / §3).
//!
//! The saturating conversion is grounded on the derivation in
//! `examples/original_source/mex/wl_mex_udp_transport.c` lines 3445-3478:
//! truncate the naive `value * 2^15` toward zero, then clamp `>= 1.0` to
//! `0x7FFF` and `< -1.0` to `0x8000`.

/// Convert a double/float sample in roughly `[-1, +1]` to a saturating
/// Fix_16_15 (`0x7FFF` at `+1.0` and above, `0x8000` below `-1.0`).
#[inline]
pub fn saturating_to_fix16_15(value: f64) -> i16 {
    if value >= 1.0 {
        0x7FFF
    } else if value < -1.0 {
        -0x8000
    } else {
        (value * 32768.0) as i32 as i16
    }
}

/// Decode a Fix_16_15 value back to a float in `[-1, +0.999969...]`.
#[inline]
pub fn fix16_15_to_f64(raw: i16) -> f64 {
    raw as f64 / 32768.0
}

/// Unpack the two 10-bit RSSI fields carried by one 32-bit wire word.
#[inline]
pub fn unpack_rssi(word: u32) -> (u16, u16) {
    (((word >> 16) & 0x3FF) as u16, (word & 0x3FF) as u16)
}

/// Pack a 32-bit wire word carrying an I/Q pair: high 16 bits = I, low 16
/// bits = Q, both Fix_16_15.
#[inline]
pub fn pack_iq_word(i: i16, q: i16) -> u32 {
    ((i as u16 as u32) << 16) | (q as u16 as u32)
}

/// Unpack a 32-bit wire word into its I/Q Fix_16_15 halves.
#[inline]
pub fn unpack_iq_word(word: u32) -> (i16, i16) {
    ((word >> 16) as i16, (word & 0xFFFF) as i16)
}

/// Capability set implemented by one concrete codec per host sample
/// representation. The Read/Write engines are generic over `C: SampleCodec`
/// so the per-sample conversion monomorphizes instead of branching on a
/// runtime [`crate::wire::DataType`] tag inside the hot loop.
pub trait SampleCodec {
    /// The host-side real component type (`f64`, `f32`, `i16`, or `u32`).
    type Elem: Copy + Default;

    /// Encode one host sample (`re`, optional `im`) into its on-wire
    /// 32-bit big-endian word for a Write IQ packet.
    fn encode_sample(re: Self::Elem, im: Option<Self::Elem>) -> u32;

    /// Decode one wire IQ word into (real, imaginary) host values.
    fn decode_iq_sample(word: u32) -> (Self::Elem, Self::Elem);

    /// Decode one wire word into its two packed RSSI host values.
    fn decode_rssi_pair(word: u32) -> (Self::Elem, Self::Elem);
}

/// Complex double precision, values in `[-1, +1]`.
pub struct DoubleCodec;

impl SampleCodec for DoubleCodec {
    type Elem = f64;

    fn encode_sample(re: f64, im: Option<f64>) -> u32 {
        let i = saturating_to_fix16_15(re);
        let q = im.map(saturating_to_fix16_15).unwrap_or(0);
        pack_iq_word(i, q)
    }

    fn decode_iq_sample(word: u32) -> (f64, f64) {
        let (i, q) = unpack_iq_word(word);
        (fix16_15_to_f64(i), fix16_15_to_f64(q))
    }

    fn decode_rssi_pair(word: u32) -> (f64, f64) {
        let (a, b) = unpack_rssi(word);
        (a as f64, b as f64)
    }
}

/// Complex single precision, values in `[-1, +1]`.
pub struct SingleCodec;

impl SampleCodec for SingleCodec {
    type Elem = f32;

    fn encode_sample(re: f32, im: Option<f32>) -> u32 {
        let i = saturating_to_fix16_15(re as f64);
        let q = im.map(|v| saturating_to_fix16_15(v as f64)).unwrap_or(0);
        pack_iq_word(i, q)
    }

    fn decode_iq_sample(word: u32) -> (f32, f32) {
        let (i, q) = unpack_iq_word(word);
        (fix16_15_to_f64(i) as f32, fix16_15_to_f64(q) as f32)
    }

    fn decode_rssi_pair(word: u32) -> (f32, f32) {
        let (a, b) = unpack_rssi(word);
        (a as f32, b as f32)
    }
}

/// Complex signed 16-bit fixed point, passed through without scaling.
pub struct Int16Codec;

impl SampleCodec for Int16Codec {
    type Elem = i16;

    fn encode_sample(re: i16, im: Option<i16>) -> u32 {
        pack_iq_word(re, im.unwrap_or(0))
    }

    fn decode_iq_sample(word: u32) -> (i16, i16) {
        unpack_iq_word(word)
    }

    fn decode_rssi_pair(word: u32) -> (i16, i16) {
        let (a, b) = unpack_rssi(word);
        (a as i16, b as i16)
    }
}

/// Real raw 32-bit words, opaque pass-through (no RSSI unpack applies).
pub struct RawCodec;

impl SampleCodec for RawCodec {
    type Elem = u32;

    fn encode_sample(re: u32, _im: Option<u32>) -> u32 {
        re
    }

    fn decode_iq_sample(word: u32) -> (u32, u32) {
        (word, 0)
    }

    fn decode_rssi_pair(word: u32) -> (u32, u32) {
        (word, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_at_positive_one() {
        assert_eq!(saturating_to_fix16_15(1.0), 0x7FFF);
        assert_eq!(saturating_to_fix16_15(2.5), 0x7FFF);
    }

    #[test]
    fn saturates_below_negative_one() {
        assert_eq!(saturating_to_fix16_15(-1.0001), -0x8000);
        assert_eq!(saturating_to_fix16_15(-50.0), -0x8000);
    }

    #[test]
    fn negative_one_is_not_saturated() {
        // -1.0 is in range and must not hit the saturation branch.
        assert_eq!(saturating_to_fix16_15(-1.0), -0x8000);
    }

    #[test]
    fn decode_matches_encode_at_plus_one() {
        let raw = saturating_to_fix16_15(1.0);
        assert_eq!(raw, 0x7FFF);
        assert_eq!(fix16_15_to_f64(raw), 32767.0 / 32768.0);
    }

    #[test]
    fn round_trip_int16_via_double_decode() {
        for v in [-32768i16, -1, 0, 1, 32767] {
            let encoded = saturating_to_fix16_15(fix16_15_to_f64(v));
            assert_eq!(encoded, v);
        }
    }

    #[test]
    fn rssi_unpack_extracts_low_ten_bits_each_half() {
        let word = 0x03FF_0155u32;
        let (a, b) = unpack_rssi(word);
        assert_eq!(a, 0x3FF);
        assert_eq!(b, 0x155);
    }

    #[test]
    fn iq_word_pack_unpack_round_trip() {
        let word = pack_iq_word(-12345, 6789);
        assert_eq!(unpack_iq_word(word), (-12345, 6789));
    }
}
