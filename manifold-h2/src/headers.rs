//! Per-connection header compression plumbing.
//!
//! Each direction of an HTTP/2 connection owns its own HPACK codec: the
//! encoder compresses outgoing header blocks, the decoder consumes incoming
//! header-block fragments. This type pairs the two and wires connection
//! settings through to them.

use bytes::BytesMut;

use manifold_hpack::{Decoded, Decoder, Encoder, HeaderField, Headers, HuffmanMode};

use crate::error::Result;

/// The HPACK state for one connection: one encoder for the send direction,
/// one decoder for the receive direction. Not shared between connections or
/// threads.
pub struct HeaderCodec {
    encoder: Encoder,
    decoder: Decoder,
}

impl Default for HeaderCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderCodec {
    pub fn new() -> Self {
        Self {
            encoder: Encoder::new(),
            decoder: Decoder::new(),
        }
    }

    /// Caps how large a single decoded header field may grow.
    pub fn with_max_field_size(max_field_size: usize) -> Self {
        Self {
            encoder: Encoder::new(),
            decoder: Decoder::with_max_field_size(max_field_size),
        }
    }

    pub fn set_huffman_mode(&mut self, mode: HuffmanMode) {
        self.encoder.set_huffman_mode(mode);
    }

    /// The peer's SETTINGS_HEADER_TABLE_SIZE changed and our ack was sent;
    /// the next encoded block will announce the required size updates.
    pub fn apply_peer_table_size(&mut self, setting: usize) {
        self.encoder.update_max_table_size(setting);
    }

    /// Our SETTINGS_HEADER_TABLE_SIZE was acked by the peer; received size
    /// updates above this bound become decode errors.
    pub fn apply_local_table_size(&mut self, setting: usize) {
        self.decoder.update_max_table_size(setting);
    }

    /// Encodes one outgoing header block, appending to `out`.
    pub fn encode_block(&mut self, headers: &Headers, out: &mut BytesMut) -> Result<()> {
        self.encoder.encode_header_block(headers, out)?;
        Ok(())
    }

    /// Decodes one header-block fragment, appending completed fields to
    /// `fields`. Partial entries are carried over to the next fragment.
    pub fn decode_fragment(
        &mut self,
        mut fragment: &[u8],
        fields: &mut Vec<HeaderField>,
    ) -> Result<()> {
        loop {
            match self.decoder.decode(&mut fragment)? {
                Decoded::Ongoing => return Ok(()),
                Decoded::HeaderField(field) => fields.push(field),
                Decoded::DynamicTableResize(size) => {
                    tracing::trace!(size, "peer resized its encoding table");
                }
            }
            if fragment.is_empty() {
                return Ok(());
            }
        }
    }

    /// The frame carrying END_HEADERS was fully consumed.
    pub fn finish_block(&mut self) {
        self.decoder.finish_header_block();
    }
}
