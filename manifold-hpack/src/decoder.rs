//! Header-block decoder (RFC 7541 Section 3).
//!
//! A hand-rolled state machine resumable at byte granularity: each call
//! consumes as much of the input cursor as it can and either produces one
//! decode result or reports that more input is needed. Progress for the
//! entry, the current prefix integer and the current string literal are
//! tracked in separate structs because string decoding nests an integer
//! decode for the length.
//!
//! Header name and value octets are assembled in a scratch buffer owned by
//! the decoder and split off into the emitted field on completion.

use bytes::BytesMut;

use crate::dynamic_table::DynamicTable;
use crate::field::{CompressionHint, HeaderField};
use crate::integer::IntegerDecoder;
use crate::string::StringDecoder;
use crate::{HpackError, Result};

const INDEXED_PREFIX: u8 = 7;
const INCREMENTAL_PREFIX: u8 = 6;
const LITERAL_SHORT_PREFIX: u8 = 4;
const SIZE_UPDATE_PREFIX: u8 = 5;

/// One result of a `Decoder::decode` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The input was exhausted mid-entry; call again with more bytes.
    Ongoing,

    /// A complete header field.
    HeaderField(HeaderField),

    /// The peer announced a new dynamic table size, already applied.
    DynamicTableResize(usize),
}

#[derive(Debug)]
enum EntryState {
    Init,
    Indexed,
    LiteralBegin,
    LiteralNameString,
    LiteralValueString,
    DynamicTableResize,
}

#[derive(Debug)]
struct EntryProgress {
    state: EntryState,
    prefix_size: u8,
    compression: CompressionHint,
    /// Table index the literal's name came from; 0 means the name is a
    /// literal string at the front of scratch.
    name_index: u64,
    name_length: usize,
}

impl Default for EntryProgress {
    fn default() -> Self {
        Self {
            state: EntryState::Init,
            prefix_size: 0,
            compression: CompressionHint::UseCache,
            name_index: 0,
            name_length: 0,
        }
    }
}

/// A stateful HPACK decoder owning one dynamic table.
///
/// Any error poisons the decoder: every later call returns the same error.
/// One instance serves one direction of one connection.
#[derive(Debug)]
pub struct Decoder {
    dynamic_table: DynamicTable,
    progress_integer: IntegerDecoder,
    progress_string: StringDecoder,
    entry: EntryProgress,
    scratch: BytesMut,
    max_field_size: usize,
    header_seen_this_block: bool,
    fatal: Option<HpackError>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_field_size(usize::MAX)
    }

    /// A decoder that rejects any single string literal or assembled field
    /// larger than `max_field_size` octets.
    pub fn with_max_field_size(max_field_size: usize) -> Self {
        Self {
            dynamic_table: DynamicTable::default(),
            progress_integer: IntegerDecoder::new(),
            progress_string: StringDecoder::new(max_field_size),
            entry: EntryProgress::default(),
            scratch: BytesMut::new(),
            max_field_size,
            header_seen_this_block: false,
            fatal: None,
        }
    }

    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic_table
    }

    /// Records the local SETTINGS_HEADER_TABLE_SIZE (call once the peer has
    /// acked the settings frame). Dynamic Table Size Updates above this
    /// bound are a decode error.
    pub fn update_max_table_size(&mut self, setting: usize) {
        self.dynamic_table.set_protocol_max_size_setting(setting);
    }

    /// Marks the end of the current header block. The next block may again
    /// begin with Dynamic Table Size Updates.
    pub fn finish_header_block(&mut self) {
        debug_assert!(
            matches!(self.entry.state, EntryState::Init),
            "header block ended mid-entry"
        );
        self.header_seen_this_block = false;
    }

    /// Decodes the next entry from the front of `input`, consuming what it
    /// uses. Returns `Decoded::Ongoing` when the input ran out mid-entry;
    /// the call can be repeated with more data, down to one byte at a time.
    pub fn decode(&mut self, input: &mut &[u8]) -> Result<Decoded> {
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }
        self.decode_inner(input).map_err(|err| {
            self.fatal = Some(err.clone());
            err
        })
    }

    fn decode_inner(&mut self, input: &mut &[u8]) -> Result<Decoded> {
        loop {
            match self.entry.state {
                EntryState::Init => {
                    let Some(&first) = input.first() else {
                        return Ok(Decoded::Ongoing);
                    };
                    // Dispatch on the representation tag; the octet itself
                    // is consumed by the integer decoder in the next state.
                    self.entry = self.dispatch(first)?;
                }

                EntryState::Indexed => {
                    let Some(index) =
                        self.progress_integer.decode(input, self.entry.prefix_size)?
                    else {
                        return Ok(Decoded::Ongoing);
                    };
                    let header = self
                        .dynamic_table
                        .get(index)
                        .ok_or(HpackError::InvalidTableIndex(index))?;
                    return Ok(self.emit_field(header));
                }

                EntryState::LiteralBegin => {
                    let Some(name_index) =
                        self.progress_integer.decode(input, self.entry.prefix_size)?
                    else {
                        return Ok(Decoded::Ongoing);
                    };
                    if name_index == 0 {
                        self.entry.state = EntryState::LiteralNameString;
                    } else {
                        // Resolve eagerly so a bad index fails before any
                        // string octets are consumed.
                        if self.dynamic_table.get(name_index).is_none() {
                            return Err(HpackError::InvalidTableIndex(name_index));
                        }
                        self.entry.name_index = name_index;
                        self.entry.state = EntryState::LiteralValueString;
                    }
                }

                EntryState::LiteralNameString => {
                    if !self.progress_string.decode(input, &mut self.scratch)? {
                        return Ok(Decoded::Ongoing);
                    }
                    self.entry.name_length = self.scratch.len();
                    self.entry.state = EntryState::LiteralValueString;
                }

                EntryState::LiteralValueString => {
                    if !self.progress_string.decode(input, &mut self.scratch)? {
                        return Ok(Decoded::Ongoing);
                    }
                    let field = self.assemble_literal()?;
                    if field.compression == CompressionHint::UseCache {
                        self.dynamic_table.insert(field.clone());
                    }
                    return Ok(self.emit_field(field));
                }

                EntryState::DynamicTableResize => {
                    let Some(size) =
                        self.progress_integer.decode(input, self.entry.prefix_size)?
                    else {
                        return Ok(Decoded::Ongoing);
                    };
                    let setting = self.dynamic_table.protocol_max_size_setting();
                    if size > setting as u64 {
                        return Err(HpackError::SizeUpdateExceedsSetting { size, setting });
                    }
                    self.dynamic_table.resize(size as usize);
                    self.entry = EntryProgress::default();
                    return Ok(Decoded::DynamicTableResize(size as usize));
                }
            }
        }
    }

    fn dispatch(&self, first: u8) -> Result<EntryProgress> {
        let mut entry = EntryProgress::default();
        if first & 0x80 != 0 {
            entry.state = EntryState::Indexed;
            entry.prefix_size = INDEXED_PREFIX;
        } else if first & 0x40 != 0 {
            entry.state = EntryState::LiteralBegin;
            entry.prefix_size = INCREMENTAL_PREFIX;
            entry.compression = CompressionHint::UseCache;
        } else if first & 0x20 != 0 {
            // Only legal before the first header field of a block
            // (RFC 7541 Section 4.2).
            if self.header_seen_this_block {
                return Err(HpackError::SizeUpdateAfterHeader);
            }
            entry.state = EntryState::DynamicTableResize;
            entry.prefix_size = SIZE_UPDATE_PREFIX;
        } else if first & 0x10 != 0 {
            entry.state = EntryState::LiteralBegin;
            entry.prefix_size = LITERAL_SHORT_PREFIX;
            entry.compression = CompressionHint::NoCacheNoIndex;
        } else {
            entry.state = EntryState::LiteralBegin;
            entry.prefix_size = LITERAL_SHORT_PREFIX;
            entry.compression = CompressionHint::NoCache;
        }
        Ok(entry)
    }

    fn assemble_literal(&mut self) -> Result<HeaderField> {
        let name = if self.entry.name_index == 0 {
            self.scratch.split_to(self.entry.name_length).freeze()
        } else {
            // The index was validated in LiteralBegin and no insertion has
            // happened since, so the entry is still present.
            self.dynamic_table
                .get(self.entry.name_index)
                .ok_or(HpackError::InvalidTableIndex(self.entry.name_index))?
                .name
        };
        let value = self.scratch.split().freeze();

        let size = name.len() + value.len();
        if size > self.max_field_size {
            return Err(HpackError::FieldSizeExceedsLimit {
                size,
                limit: self.max_field_size,
            });
        }

        Ok(HeaderField {
            name,
            value,
            compression: self.entry.compression,
        })
    }

    fn emit_field(&mut self, field: HeaderField) -> Decoded {
        self.header_seen_this_block = true;
        self.entry = EntryProgress::default();
        Decoded::HeaderField(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut Decoder, mut input: &[u8]) -> Vec<Decoded> {
        let mut results = Vec::new();
        while !input.is_empty() {
            match decoder.decode(&mut input).unwrap() {
                Decoded::Ongoing => break,
                other => results.push(other),
            }
        }
        results
    }

    #[test]
    fn test_indexed_static_field() {
        let mut decoder = Decoder::new();
        let results = decode_all(&mut decoder, &[0x82]);
        assert_eq!(
            results,
            vec![Decoded::HeaderField(HeaderField::new(":method", "GET"))]
        );
    }

    #[test]
    fn test_index_zero_is_invalid() {
        let mut decoder = Decoder::new();
        let mut input: &[u8] = &[0x80];
        assert_eq!(
            decoder.decode(&mut input).unwrap_err(),
            HpackError::InvalidTableIndex(0)
        );
    }

    #[test]
    fn test_out_of_range_index_is_invalid() {
        let mut decoder = Decoder::new();
        let mut input: &[u8] = &[0x80 | 70];
        assert_eq!(
            decoder.decode(&mut input).unwrap_err(),
            HpackError::InvalidTableIndex(70)
        );
    }

    #[test]
    fn test_literal_with_indexed_name_inserts_into_table() {
        // Incremental indexing, name :path (4), raw value "/path/hello".
        let mut input = vec![0x44, 0x0B];
        input.extend_from_slice(b"/path/hello");

        let mut decoder = Decoder::new();
        let results = decode_all(&mut decoder, &input);
        assert_eq!(
            results,
            vec![Decoded::HeaderField(HeaderField::new(":path", "/path/hello"))]
        );
        assert_eq!(
            decoder.dynamic_table().get(62).unwrap(),
            HeaderField::new(":path", "/path/hello")
        );
    }

    #[test]
    fn test_never_indexed_literal_carries_hint() {
        // RFC 7541 Section C.2.3 shape.
        let mut input = vec![0x10, 0x08];
        input.extend_from_slice(b"password");
        input.push(0x06);
        input.extend_from_slice(b"secret");

        let mut decoder = Decoder::new();
        let results = decode_all(&mut decoder, &input);
        assert_eq!(
            results,
            vec![Decoded::HeaderField(HeaderField::with_compression(
                "password",
                "secret",
                CompressionHint::NoCacheNoIndex,
            ))]
        );
        assert_eq!(decoder.dynamic_table().len(), 0);
    }

    #[test]
    fn test_without_indexing_literal_skips_table() {
        let mut input = vec![0x04, 0x05];
        input.extend_from_slice(b"/tmp1");

        let mut decoder = Decoder::new();
        let results = decode_all(&mut decoder, &input);
        assert_eq!(
            results,
            vec![Decoded::HeaderField(HeaderField::with_compression(
                ":path",
                "/tmp1",
                CompressionHint::NoCache,
            ))]
        );
        assert_eq!(decoder.dynamic_table().len(), 0);
    }

    #[test]
    fn test_size_update_at_block_start_is_applied() {
        let mut decoder = Decoder::new();
        let results = decode_all(&mut decoder, &[0x3F, 0x01]); // 31 + 1 = 32
        assert_eq!(results, vec![Decoded::DynamicTableResize(32)]);
        assert_eq!(decoder.dynamic_table().max_size(), 32);
    }

    #[test]
    fn test_size_update_after_header_field_fails() {
        let mut decoder = Decoder::new();
        let mut input: &[u8] = &[0x82, 0x20];
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Decoded::HeaderField(HeaderField::new(":method", "GET"))
        );
        assert_eq!(
            decoder.decode(&mut input).unwrap_err(),
            HpackError::SizeUpdateAfterHeader
        );
    }

    #[test]
    fn test_size_update_is_legal_again_after_block_boundary() {
        let mut decoder = Decoder::new();
        let mut input: &[u8] = &[0x82];
        decoder.decode(&mut input).unwrap();
        decoder.finish_header_block();

        let mut input: &[u8] = &[0x20];
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Decoded::DynamicTableResize(0)
        );
    }

    #[test]
    fn test_size_update_above_setting_fails() {
        let mut decoder = Decoder::new();
        decoder.update_max_table_size(16);
        let mut input: &[u8] = &[0x3F, 0x01]; // 32
        assert_eq!(
            decoder.decode(&mut input).unwrap_err(),
            HpackError::SizeUpdateExceedsSetting {
                size: 32,
                setting: 16
            }
        );
    }

    #[test]
    fn test_errors_poison_the_decoder() {
        let mut decoder = Decoder::new();
        let mut input: &[u8] = &[0x80];
        let first = decoder.decode(&mut input).unwrap_err();

        let mut input: &[u8] = &[0x82];
        assert_eq!(decoder.decode(&mut input).unwrap_err(), first);
    }

    #[test]
    fn test_field_size_limit_is_enforced() {
        let mut decoder = Decoder::with_max_field_size(8);
        let mut input = vec![0x40, 0x05];
        input.extend_from_slice(b"abcde");
        input.push(0x05);
        input.extend_from_slice(b"fghij");

        let mut cursor = &input[..];
        assert_eq!(
            decoder.decode(&mut cursor).unwrap_err(),
            HpackError::FieldSizeExceedsLimit { size: 10, limit: 8 }
        );
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_buffer() {
        let mut block = vec![0x82, 0x44, 0x06];
        block.extend_from_slice(b"/index");
        block.extend_from_slice(&[0x40, 0x01, b'k', 0x01, b'v']);

        let mut whole = Decoder::new();
        let expected = decode_all(&mut whole, &block);
        assert_eq!(expected.len(), 3);

        let mut bytewise = Decoder::new();
        let mut results = Vec::new();
        for &byte in &block {
            let mut input: &[u8] = std::slice::from_ref(&byte);
            match bytewise.decode(&mut input).unwrap() {
                Decoded::Ongoing => {}
                other => results.push(other),
            }
        }
        assert_eq!(results, expected);
    }
}
