//! Prefix integer encoding and decoding.
//!
//! Implements the variable-length integer encoding defined in RFC 7541
//! Section 5.1, used by every HPACK representation. An integer is encoded in
//! two parts: an N-bit prefix sharing a byte with the representation's tag
//! bits (1 <= N <= 8), and continuation bytes when the value does not fit.
//!
//! If I < 2^N - 1, the integer is encoded entirely in the prefix. Otherwise
//! the prefix is saturated and the remainder follows as little-endian
//! base-128 groups with the high bit marking continuation.

use bytes::{BufMut, BytesMut};

use crate::error::{HpackError, Result};

/// Continuation octets beyond this can only encode values past 2^64 and are
/// treated as malformed rather than looping forever on zero padding.
const MAX_CONTINUATION_OCTETS: u8 = 10;

fn prefix_max(prefix_size: u8) -> u64 {
    debug_assert!((1..=8).contains(&prefix_size), "prefix size must be 1-8");
    if prefix_size == 8 {
        0xFF
    } else {
        (1u64 << prefix_size) - 1
    }
}

/// Encodes `value` with an N-bit prefix, appending to `out`.
///
/// `starting_bits` carries the representation's tag bits in the octet's
/// high-order positions and must not intersect the prefix.
pub fn encode_integer(value: u64, starting_bits: u8, prefix_size: u8, out: &mut BytesMut) {
    let max_prefix = prefix_max(prefix_size);
    debug_assert_eq!(
        starting_bits as u64 & max_prefix,
        0,
        "tag bits overlap the integer prefix"
    );

    if value < max_prefix {
        out.put_u8(starting_bits | value as u8);
        return;
    }

    out.put_u8(starting_bits | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        out.put_u8((remaining & 0x7F) as u8 | 0x80);
        remaining >>= 7;
    }
    out.put_u8(remaining as u8);
}

#[derive(Debug, Clone, Copy, Default)]
enum State {
    #[default]
    Init,
    Value,
}

/// Restartable prefix-integer decoder.
///
/// `decode` consumes from the front of the input cursor and returns
/// `Ok(None)` when the input ran out mid-value; the accumulated progress is
/// kept so the call can be repeated with more input. On `Ok(Some(_))` the
/// decoder has reset itself and may be reused for the next integer.
#[derive(Debug, Default)]
pub struct IntegerDecoder {
    state: State,
    value: u64,
    continuation_octets: u8,
}

impl IntegerDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, input: &mut &[u8], prefix_size: u8) -> Result<Option<u64>> {
        let max_prefix = prefix_max(prefix_size);

        if matches!(self.state, State::Init) {
            let Some((&first, rest)) = input.split_first() else {
                return Ok(None);
            };
            *input = rest;

            self.value = first as u64 & max_prefix;
            if self.value < max_prefix {
                return Ok(Some(self.finish()));
            }
            self.state = State::Value;
            self.continuation_octets = 0;
        }

        loop {
            let Some((&octet, rest)) = input.split_first() else {
                return Ok(None);
            };
            *input = rest;

            if self.continuation_octets >= MAX_CONTINUATION_OCTETS {
                return Err(HpackError::MalformedInteger);
            }
            let shift = 7 * self.continuation_octets as u32;
            self.continuation_octets += 1;

            let group = (octet & 0x7F) as u64;
            let shifted = group
                .checked_shl(shift)
                .filter(|s| s >> shift == group)
                .ok_or(HpackError::IntegerOverflow)?;
            self.value = self
                .value
                .checked_add(shifted)
                .ok_or(HpackError::IntegerOverflow)?;

            if octet & 0x80 == 0 {
                return Ok(Some(self.finish()));
            }
        }
    }

    fn finish(&mut self) -> u64 {
        let value = self.value;
        *self = Self::default();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(mut encoded: &[u8], prefix_size: u8) -> (u64, usize) {
        let total = encoded.len();
        let mut decoder = IntegerDecoder::new();
        let value = decoder
            .decode(&mut encoded, prefix_size)
            .unwrap()
            .expect("complete");
        (value, total - encoded.len())
    }

    #[test]
    fn test_rfc_example_ten_with_five_bit_prefix() {
        // RFC 7541 Section C.1.1
        let mut buf = BytesMut::new();
        encode_integer(10, 0, 5, &mut buf);
        assert_eq!(&buf[..], &[0b01010]);
        assert_eq!(decode_all(&buf, 5), (10, 1));
    }

    #[test]
    fn test_rfc_example_1337_with_five_bit_prefix() {
        // RFC 7541 Section C.1.2
        let mut buf = BytesMut::new();
        encode_integer(1337, 0b0010_0000, 5, &mut buf);
        assert_eq!(&buf[..], &[0x3F, 0x9A, 0x0A]);
        assert_eq!(decode_all(&buf, 5), (1337, 3));
    }

    #[test]
    fn test_rfc_example_42_with_eight_bit_prefix() {
        // RFC 7541 Section C.1.3
        let mut buf = BytesMut::new();
        encode_integer(42, 0, 8, &mut buf);
        assert_eq!(&buf[..], &[42]);
        assert_eq!(decode_all(&buf, 8), (42, 1));
    }

    #[test]
    fn test_decode_resumes_across_split_input() {
        let mut buf = BytesMut::new();
        encode_integer(1337, 0, 5, &mut buf);

        let mut decoder = IntegerDecoder::new();
        for &byte in &buf[..buf.len() - 1] {
            let mut input: &[u8] = std::slice::from_ref(&byte);
            assert_eq!(decoder.decode(&mut input, 5).unwrap(), None);
        }
        let mut input: &[u8] = std::slice::from_ref(&buf[buf.len() - 1]);
        assert_eq!(decoder.decode(&mut input, 5).unwrap(), Some(1337));
    }

    #[test]
    fn test_overflow_is_detected() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut input = &data[..];
        let mut decoder = IntegerDecoder::new();
        let err = decoder.decode(&mut input, 8).unwrap_err();
        assert!(matches!(
            err,
            HpackError::IntegerOverflow | HpackError::MalformedInteger
        ));
    }

    #[test]
    fn test_zero_padded_continuation_is_malformed() {
        // Saturated prefix followed by endless zero-valued continuation
        // groups never terminates and must be rejected.
        let data = [0xFF, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80];
        let mut input = &data[..];
        let mut decoder = IntegerDecoder::new();
        assert_eq!(
            decoder.decode(&mut input, 8).unwrap_err(),
            HpackError::MalformedInteger
        );
    }

    #[test]
    fn test_round_trip_property() {
        use proptest::prelude::*;

        proptest!(|(value in 0u64..(1u64 << 62), prefix_size in 1u8..=8)| {
            let mut buf = BytesMut::new();
            encode_integer(value, 0, prefix_size, &mut buf);
            let (decoded, consumed) = decode_all(&buf, prefix_size);
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(consumed, buf.len());
        });
    }
}
