//! Frame types for the `Content-Length` framed debugger protocol.
//!
//! A frame on the wire is a block of `\r\n`-terminated header lines, an
//! empty line, and then exactly `Content-Length` bytes of UTF-8 JSON:
//!
//! ```text
//! Content-Length: 16\r\n
//! \r\n
//! {"type":"event"}
//! ```
//!
//! # Example
//!
//! ```
//! use node_debug_client::protocol::{build_frame, encode_header};
//!
//! assert_eq!(&encode_header(5)[..], b"Content-Length: 5\r\n\r\n");
//! assert_eq!(&build_frame("hello")[..], b"Content-Length: 5\r\n\r\nhello");
//! ```

use std::str::Utf8Error;

use bytes::{BufMut, Bytes, BytesMut};

/// Header announcing the body size.
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";

/// Header carrying the debuggee runtime, e.g. `node v8.1.0`.
pub const EMBEDDING_HOST_HEADER: &str = "Embedding-Host";

/// A complete inbound frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl Frame {
    /// Create a frame from its body.
    pub fn new(body: Bytes) -> Self {
        Self { body }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body length.
    #[inline]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Decode the body as UTF-8.
    pub fn text(&self) -> std::result::Result<&str, Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

/// A buffer queued for writing, ownership moves to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket(Bytes);

impl OutboundPacket {
    /// Wrap bytes as a packet.
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// The packet bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the packet.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the packet is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encode the header block for a body of `body_len` bytes.
pub fn encode_header(body_len: usize) -> Bytes {
    Bytes::from(format!("{CONTENT_LENGTH_HEADER}: {body_len}\r\n\r\n"))
}

/// Split a message into its header and body packets.
///
/// The two packets must be queued back-to-back.
pub fn build_frame_parts(text: &str) -> (OutboundPacket, OutboundPacket) {
    let body = Bytes::copy_from_slice(text.as_bytes());
    (
        OutboundPacket::new(encode_header(body.len())),
        OutboundPacket::new(body),
    )
}

/// Build a complete frame as a single contiguous buffer.
pub fn build_frame(text: &str) -> Bytes {
    let header = encode_header(text.len());
    let mut buf = BytesMut::with_capacity(header.len() + text.len());
    buf.put_slice(&header);
    buf.put_slice(text.as_bytes());
    buf.freeze()
}
