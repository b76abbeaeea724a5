//! Incremental parser turning a byte stream into frames.
//!
//! Uses `bytes::BytesMut` for buffer management and a two-state machine:
//! - `ReadingHeaders`: collecting `\r\n` terminated header lines
//! - `ReadingBody`: header block done, need N more body bytes
//!
//! Header blocks without a body (`Content-Length: 0` or no length at all)
//! are heartbeats: they are consumed and produce no frame. The V8 debug agent
//! sends one of these as its greeting, carrying `Embedding-Host`.
//!
//! # Example
//!
//! ```
//! use node_debug_client::protocol::MessageFramer;
//!
//! let mut framer = MessageFramer::new();
//! let frames = framer
//!     .push(b"Embedding-Host: node v8.1.0\r\nContent-Length: 2\r\n\r\n{}")
//!     .unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].text().unwrap(), "{}");
//! assert_eq!(framer.node_version().unwrap().major, 8);
//! ```

use bytes::BytesMut;
use semver::Version;

use super::frame::{Frame, CONTENT_LENGTH_HEADER, EMBEDDING_HOST_HEADER};
use crate::config::{DEFAULT_MAX_HEADER_LINE, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_BUFFER_SIZE};
use crate::error::{DebuggerError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading header lines; remembers the last `Content-Length` seen.
    ReadingHeaders { content_length: Option<usize> },
    /// Header block terminated, waiting for body bytes.
    ReadingBody { content_length: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct MessageFramer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Runtime version from the first `Embedding-Host` header.
    node_version: Option<Version>,
    /// Maximum allowed body size.
    max_message_size: usize,
    /// Maximum allowed header line length.
    max_header_line: usize,
    /// Capacity kept between frames.
    retained_capacity: usize,
}

impl MessageFramer {
    /// Create a new framer with default limits.
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_READ_BUFFER_SIZE,
            DEFAULT_MAX_MESSAGE_SIZE,
            DEFAULT_MAX_HEADER_LINE,
        )
    }

    /// Create a new framer with custom capacity and limits.
    pub fn with_limits(capacity: usize, max_message_size: usize, max_header_line: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::ReadingHeaders {
                content_length: None,
            },
            node_version: None,
            max_message_size,
            max_header_line,
            retained_capacity: capacity,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is buffered internally for the next push, so any read
    /// chunking (down to a single byte) yields the same frames.
    ///
    /// # Errors
    ///
    /// Returns error if a header line or the announced body exceeds the
    /// configured limits. The stream cannot be resynchronized after that.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Runtime version learned from `Embedding-Host`, if any.
    pub fn node_version(&self) -> Option<&Version> {
        self.node_version.as_ref()
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear buffered bytes and reset to the start of a header block.
    ///
    /// The learned runtime version is kept.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::ReadingHeaders {
            content_length: None,
        };
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::ReadingHeaders { content_length } => {
                    let Some(end) = self.buffer.windows(2).position(|w| w == b"\r\n") else {
                        if self.buffer.len() > self.max_header_line {
                            return Err(self.header_line_too_long());
                        }
                        return Ok(None);
                    };
                    if end > self.max_header_line {
                        return Err(self.header_line_too_long());
                    }

                    let line = self.buffer.split_to(end + 2);
                    let line = &line[..end];

                    if line.is_empty() {
                        self.state = match content_length {
                            Some(n) if n > 0 => State::ReadingBody { content_length: n },
                            _ => {
                                tracing::trace!("Skipping header block without body");
                                State::ReadingHeaders {
                                    content_length: None,
                                }
                            }
                        };
                        continue;
                    }

                    let content_length = self.parse_header_line(line, content_length)?;
                    self.state = State::ReadingHeaders { content_length };
                }

                State::ReadingBody { content_length } => {
                    if self.buffer.len() < content_length {
                        self.buffer.reserve(content_length - self.buffer.len());
                        return Ok(None);
                    }

                    let body = self.buffer.split_to(content_length).freeze();
                    self.state = State::ReadingHeaders {
                        content_length: None,
                    };

                    if content_length > self.retained_capacity {
                        self.release_oversized_buffer();
                    }

                    return Ok(Some(Frame::new(body)));
                }
            }
        }
    }

    /// Apply one header field, returning the updated body length.
    fn parse_header_line(&mut self, line: &[u8], current: Option<usize>) -> Result<Option<usize>> {
        let Ok(line) = std::str::from_utf8(line) else {
            tracing::debug!("Ignoring non UTF-8 header line");
            return Ok(current);
        };
        let Some((key, value)) = line.split_once(':') else {
            tracing::debug!("Ignoring malformed header line: {}", line);
            return Ok(current);
        };
        let value = value.trim();

        match key.trim() {
            CONTENT_LENGTH_HEADER => match value.parse::<usize>() {
                Ok(n) if n > self.max_message_size => Err(DebuggerError::Protocol(format!(
                    "Message size {} exceeds maximum {}",
                    n, self.max_message_size
                ))),
                Ok(n) => Ok(Some(n)),
                Err(_) => {
                    tracing::warn!("Invalid Content-Length value: {:?}", value);
                    Ok(None)
                }
            },
            EMBEDDING_HOST_HEADER => {
                if self.node_version.is_none() {
                    self.node_version = parse_embedding_host(value);
                }
                Ok(current)
            }
            _ => Ok(current),
        }
    }

    /// Drop the grown allocation so a single huge message is not kept alive.
    fn release_oversized_buffer(&mut self) {
        let rest = std::mem::replace(
            &mut self.buffer,
            BytesMut::with_capacity(self.retained_capacity),
        );
        self.buffer.extend_from_slice(&rest);
    }

    fn header_line_too_long(&self) -> DebuggerError {
        DebuggerError::Protocol(format!(
            "Header line exceeds maximum {} bytes",
            self.max_header_line
        ))
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::ReadingHeaders { .. } => "ReadingHeaders",
            State::ReadingBody { .. } => "ReadingBody",
        }
    }
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `node v<major>.<minor>.<patch>` into a version.
///
/// Missing components default to zero and anything after the numeric
/// triple (pre-release tags, build suffixes) is ignored.
pub fn parse_embedding_host(value: &str) -> Option<Version> {
    let rest = value.trim().strip_prefix("node")?.trim_start();
    let rest = rest.strip_prefix('v').unwrap_or(rest);

    let numeric: &str = rest
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()
        .unwrap_or_default();
    let mut parts = numeric.split('.').filter(|p| !p.is_empty());

    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;

    Some(Version::new(major, minor, patch))
}
