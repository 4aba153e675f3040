//! HPACK: Header Compression for HTTP/2 (RFC 7541)
//!
//! This crate implements the complete HPACK codec: prefix integers, string
//! literals with optional Huffman coding, the static table, the dynamic
//! table, and the header-block encoder and decoder.
//!
//! # Design
//!
//! - **Stateful**: encoder and decoder each own a dynamic table; one
//!   instance serves one direction of one connection and is never shared
//!   between threads.
//! - **Resumable**: the decoder is a hand-rolled state machine that accepts
//!   input down to one byte at a time, so header-block fragments can be fed
//!   straight off the wire without reassembly.
//! - **Bytes-based**: names, values and scratch storage use [`bytes`]
//!   buffers; emitting a decoded field is a reference-count bump, not a
//!   copy.
//!
//! # Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use manifold_hpack::{Decoded, Decoder, Encoder, HeaderField, Headers};
//!
//! let mut encoder = Encoder::new();
//! let mut decoder = Decoder::new();
//!
//! let headers: Headers = [
//!     HeaderField::new(":method", "GET"),
//!     HeaderField::new(":path", "/"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let mut block = BytesMut::new();
//! encoder.encode_header_block(&headers, &mut block).unwrap();
//!
//! let mut input = &block[..];
//! while !input.is_empty() {
//!     match decoder.decode(&mut input).unwrap() {
//!         Decoded::HeaderField(field) => println!("{:?}", field),
//!         Decoded::DynamicTableResize(size) => println!("resize {size}"),
//!         Decoded::Ongoing => break,
//!     }
//! }
//! decoder.finish_header_block();
//! ```

#![forbid(unsafe_code)]

pub mod decoder;
pub mod dynamic_table;
pub mod encoder;
pub mod error;
pub mod field;
pub mod huffman;
pub mod integer;
pub mod static_table;
pub mod string;

pub use decoder::{Decoded, Decoder};
pub use dynamic_table::DynamicTable;
pub use encoder::Encoder;
pub use error::{HpackError, Result};
pub use field::{CompressionHint, HeaderField, Headers, ENTRY_OVERHEAD};
pub use string::HuffmanMode;
