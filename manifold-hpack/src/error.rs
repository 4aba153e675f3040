//! HPACK error types per RFC 7541.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HpackError>;

/// Errors raised by the HPACK codec.
///
/// Any error returned by the decoder poisons it: the same error is returned
/// from every subsequent call. The encoder is likewise unusable after a
/// failed `encode_header_block` call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HpackError {
    /// A prefix integer did not terminate within the permitted number of
    /// continuation octets.
    #[error("malformed prefix integer")]
    MalformedInteger,

    /// A prefix integer overflowed the 64-bit accumulator.
    #[error("prefix integer overflow")]
    IntegerOverflow,

    /// A string literal declared a length above the configured limit.
    #[error("string literal length {length} exceeds limit {limit}")]
    StringLengthExceedsLimit { length: u64, limit: usize },

    /// A Huffman-coded string did not decode to a valid symbol sequence.
    #[error("huffman decoding failed")]
    HuffmanDecode,

    /// An indexed representation referenced index 0 or an index past the
    /// end of the addressable table space.
    #[error("invalid table index {0}")]
    InvalidTableIndex(u64),

    /// A Dynamic Table Size Update arrived after a header-field
    /// representation within the same header block (RFC 7541 Section 4.2).
    #[error("dynamic table size update after header field")]
    SizeUpdateAfterHeader,

    /// A Dynamic Table Size Update exceeded SETTINGS_HEADER_TABLE_SIZE.
    #[error("dynamic table size update {size} exceeds setting {setting}")]
    SizeUpdateExceedsSetting { size: u64, setting: usize },

    /// An assembled header field exceeded the configured size limit.
    #[error("header field size {size} exceeds limit {limit}")]
    FieldSizeExceedsLimit { size: usize, limit: usize },
}
