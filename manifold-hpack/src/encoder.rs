//! Header-block encoder (RFC 7541 Section 6).
//!
//! Each field is emitted as the most compact representation its compression
//! hint permits: an index when the tables hold the exact field, otherwise a
//! literal with an indexed or literal name. Fields hinted `UseCache` are
//! also inserted into the dynamic table so later blocks can reference them.
//!
//! Table size updates announced by the peer's SETTINGS are buffered between
//! blocks and flushed as one or two Dynamic Table Size Update instructions
//! at the start of the next block (RFC 7541 Section 4.2).

use bytes::BytesMut;

use crate::dynamic_table::DynamicTable;
use crate::field::{CompressionHint, HeaderField, Headers};
use crate::integer::encode_integer;
use crate::static_table;
use crate::string::{encode_string, HuffmanMode};
use crate::Result;

// Representation tag bits and prefix sizes (RFC 7541 Section 6).
const INDEXED_BITS: u8 = 0x80;
const INDEXED_PREFIX: u8 = 7;
const INCREMENTAL_BITS: u8 = 0x40;
const INCREMENTAL_PREFIX: u8 = 6;
const WITHOUT_INDEXING_BITS: u8 = 0x00;
const NEVER_INDEXED_BITS: u8 = 0x10;
const LITERAL_SHORT_PREFIX: u8 = 4;
const SIZE_UPDATE_BITS: u8 = 0x20;
const SIZE_UPDATE_PREFIX: u8 = 5;

#[derive(Debug, Default)]
struct PendingSizeUpdate {
    pending: bool,
    last_value: usize,
    smallest_value: usize,
}

/// A stateful HPACK encoder owning one dynamic table.
///
/// One instance serves one direction of one connection and is not shared
/// between threads.
#[derive(Debug, Default)]
pub struct Encoder {
    dynamic_table: DynamicTable,
    huffman_mode: HuffmanMode,
    size_update: PendingSizeUpdate,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_huffman_mode(&mut self, mode: HuffmanMode) {
        self.huffman_mode = mode;
    }

    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic_table
    }

    /// Records a SETTINGS_HEADER_TABLE_SIZE value received from the peer
    /// (call after acking the settings frame).
    ///
    /// All updates observed between header blocks are remembered; the next
    /// block announces the smallest observed value and the final one, so
    /// the peer sees every bound the table shrank through.
    pub fn update_max_table_size(&mut self, new_max_size: usize) {
        let update = &mut self.size_update;
        if update.pending {
            update.smallest_value = update.smallest_value.min(new_max_size);
        } else {
            update.pending = true;
            update.smallest_value = new_max_size;
        }
        update.last_value = new_max_size;
    }

    /// Encodes a complete header block, appending to `out`.
    pub fn encode_header_block(&mut self, headers: &Headers, out: &mut BytesMut) -> Result<()> {
        self.flush_pending_size_update(out);
        for field in headers {
            self.encode_field(field, out);
        }
        Ok(())
    }

    fn flush_pending_size_update(&mut self, out: &mut BytesMut) {
        if !self.size_update.pending {
            return;
        }
        let last = self.size_update.last_value;
        let smallest = self.size_update.smallest_value;

        if smallest < last {
            encode_integer(smallest as u64, SIZE_UPDATE_BITS, SIZE_UPDATE_PREFIX, out);
            self.dynamic_table.resize(smallest);
        }
        encode_integer(last as u64, SIZE_UPDATE_BITS, SIZE_UPDATE_PREFIX, out);
        self.dynamic_table.resize(last);

        self.size_update.pending = false;
        self.size_update.smallest_value = last;
    }

    fn encode_field(&mut self, field: &HeaderField, out: &mut BytesMut) {
        // Search static then dynamic. A full match is only usable when the
        // hint allows cached forms; an indexed name is usable regardless.
        let (index, mut has_value) = {
            let (static_index, static_has_value) = static_table::find_name_and_value(field);
            if static_has_value {
                (static_index as u64, true)
            } else {
                let (dyn_index, dyn_has_value) = self.dynamic_table.find_name_and_value(field);
                if dyn_has_value {
                    (dyn_index, true)
                } else if static_index != 0 {
                    (static_index as u64, false)
                } else {
                    (dyn_index, false)
                }
            }
        };
        if field.compression != CompressionHint::UseCache {
            has_value = false;
        }

        if has_value {
            encode_integer(index, INDEXED_BITS, INDEXED_PREFIX, out);
            return;
        }

        let (tag, prefix) = match field.compression {
            CompressionHint::UseCache => (INCREMENTAL_BITS, INCREMENTAL_PREFIX),
            CompressionHint::NoCache => (WITHOUT_INDEXING_BITS, LITERAL_SHORT_PREFIX),
            CompressionHint::NoCacheNoIndex => (NEVER_INDEXED_BITS, LITERAL_SHORT_PREFIX),
        };

        encode_integer(index, tag, prefix, out);
        if index == 0 {
            encode_string(&field.name, self.huffman_mode, out);
        }
        encode_string(&field.value, self.huffman_mode, out);

        if field.compression == CompressionHint::UseCache {
            self.dynamic_table.insert(field.clone());
        }
    }
}
