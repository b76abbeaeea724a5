//! Protocol module - framing and message types.
//!
//! This module implements the wire side of the V8 debugger protocol:
//! - `Content-Length` header synthesis for outbound messages
//! - Incremental framer for inbound byte streams
//! - Typed parse of inbound response/event messages

mod frame;
mod framer;
mod message;

pub use frame::{
    build_frame, build_frame_parts, encode_header, Frame, OutboundPacket, CONTENT_LENGTH_HEADER,
    EMBEDDING_HOST_HEADER,
};
pub use framer::{parse_embedding_host, MessageFramer};
pub use message::{Event, EventKind, InboundMessage, Response};
