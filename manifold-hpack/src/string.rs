//! String literal encoding and decoding per RFC 7541 Section 5.2.
//!
//! A string literal is a 7-bit prefix integer length with the high bit
//! flagging Huffman coding, followed by that many octets.

use bytes::{BufMut, BytesMut};

use crate::error::{HpackError, Result};
use crate::huffman;
use crate::integer::{encode_integer, IntegerDecoder};

const HUFFMAN_FLAG: u8 = 0x80;

/// Controls whether string literals are Huffman coded.
///
/// This is independent of indexing; it only affects how strings are written
/// when they are not replaced by a table reference. In `Smallest` mode the
/// encoder picks whichever of the raw and Huffman forms is shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HuffmanMode {
    #[default]
    Smallest,
    Never,
    Always,
}

/// Encodes a string literal, appending to `out`.
pub fn encode_string(to_encode: &[u8], mode: HuffmanMode, out: &mut BytesMut) {
    let use_huffman = match mode {
        HuffmanMode::Never => false,
        HuffmanMode::Always => true,
        HuffmanMode::Smallest => huffman::encoded_len(to_encode) < to_encode.len(),
    };

    if use_huffman {
        encode_integer(huffman::encoded_len(to_encode) as u64, HUFFMAN_FLAG, 7, out);
        huffman::encode_into(to_encode, out);
    } else {
        encode_integer(to_encode.len() as u64, 0, 7, out);
        out.put_slice(to_encode);
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum State {
    #[default]
    Init,
    Length,
    Value,
}

/// Restartable string-literal decoder.
///
/// `decode` consumes from the front of the input cursor, appending the
/// decoded octets to the caller's output buffer. It returns `Ok(false)`
/// while more input is required and `Ok(true)` once the string is complete,
/// at which point the decoder has reset itself.
#[derive(Debug, Default)]
pub struct StringDecoder {
    state: State,
    integer: IntegerDecoder,
    use_huffman: bool,
    remaining: u64,
    max_length: usize,
    // Huffman octets buffered until the whole string is available.
    huffman_buf: BytesMut,
}

impl StringDecoder {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }

    pub fn decode(&mut self, input: &mut &[u8], out: &mut BytesMut) -> Result<bool> {
        if matches!(self.state, State::Init) {
            let Some(&first) = input.first() else {
                return Ok(false);
            };
            // The flag is the top bit of the length octet; the octet itself
            // is consumed by the integer decoder below.
            self.use_huffman = first & HUFFMAN_FLAG != 0;
            self.state = State::Length;
        }

        if matches!(self.state, State::Length) {
            let Some(length) = self.integer.decode(input, 7)? else {
                return Ok(false);
            };
            if length > self.max_length as u64 {
                return Err(HpackError::StringLengthExceedsLimit {
                    length,
                    limit: self.max_length,
                });
            }
            self.remaining = length;
            self.state = State::Value;
        }

        let take = (self.remaining).min(input.len() as u64) as usize;
        let (chunk, rest) = input.split_at(take);
        *input = rest;
        self.remaining -= take as u64;
        if self.use_huffman {
            self.huffman_buf.put_slice(chunk);
        } else {
            out.put_slice(chunk);
        }

        if self.remaining > 0 {
            return Ok(false);
        }

        if self.use_huffman {
            let encoded = self.huffman_buf.split();
            huffman::decode_into(&encoded, out)?;
        }
        self.state = State::Init;
        Ok(true)
    }
}
