//! Header fields and header lists.
//!
//! A header field is a name/value pair of octet sequences plus a compression
//! hint that tells the encoder whether the field may enter the dynamic table
//! (RFC 7541 Section 6.2, RFC 7541 Section 7.1.3).

use bytes::Bytes;

/// Per-entry overhead counted towards the dynamic table size
/// (RFC 7541 Section 4.1).
pub const ENTRY_OVERHEAD: usize = 32;

/// Controls how the encoder is allowed to compress a header field.
///
/// This governs indexing only. Whether literal strings are Huffman coded is
/// a separate, encoder-wide choice (see `HuffmanMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionHint {
    /// The field may be emitted by index and added to the dynamic table.
    #[default]
    UseCache,

    /// The field must not be added to the dynamic table. Intermediaries may
    /// still re-index it.
    NoCache,

    /// The field must be emitted in the never-indexed form. Intermediaries
    /// are forbidden from re-indexing it (RFC 7541 Section 6.2.3).
    NoCacheNoIndex,
}

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
    pub compression: CompressionHint,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            compression: CompressionHint::UseCache,
        }
    }

    pub fn with_compression(
        name: impl Into<Bytes>,
        value: impl Into<Bytes>,
        compression: CompressionHint,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            compression,
        }
    }

    /// The size this field occupies in a dynamic table
    /// (RFC 7541 Section 4.1).
    pub fn hpack_size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

/// An ordered list of header fields, the unit the encoder consumes.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    pub fn get(&self, index: usize) -> Option<&HeaderField> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }
}

impl FromIterator<HeaderField> for Headers {
    fn from_iter<T: IntoIterator<Item = HeaderField>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
