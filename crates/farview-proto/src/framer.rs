//! Framing: hello preamble, then length-delimited header + payload frames.
//!
//! Stream reads are not message-aligned. The framer buffers whatever the
//! transport delivers and yields complete frames as they become available:
//! push bytes in, then drain with [`Framer::next_frame`] until it returns
//! `Ok(None)`.
//!
//! Wire layout (all integers big-endian):
//!
//! ```text
//! hello:  magic (u32) | helloLen (u16) | Hello protobuf
//! frame:  headerLen (u16) | Header protobuf | msgLen (u32) | payload
//! ```
//!
//! An LZ4-compressed payload starts with its decompressed length (u32); the
//! compressed data spans the remaining `msgLen - 4` bytes.

use bytes::{Buf, BytesMut};
use prost::Message;

use farview_shared::constants::{BEP_MAGIC, MAX_MESSAGE_LEN};

use crate::bep::{Header, Hello, MessageCompression, MessageType};
use crate::error::{ProtoError, Result};

const HELLO_PREFIX_LEN: usize = 6;

/// One complete inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Hello(Hello),
    Message { header: Header, payload: Vec<u8> },
}

enum State {
    AwaitHello,
    Framed,
}

/// Incremental frame decoder for one connection.
pub struct Framer {
    buf: BytesMut,
    state: State,
}

impl Framer {
    pub fn new() -> Self {
        Framer {
            buf: BytesMut::new(),
            state: State::AwaitHello,
        }
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Try to decode the next complete frame from the buffer.
    ///
    /// `Ok(None)` means more bytes are needed. Errors are fatal to the
    /// connection; the wire format has no resynchronisation marker.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::AwaitHello => self.next_hello(),
            State::Framed => self.next_message(),
        }
    }

    fn next_hello(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < HELLO_PREFIX_LEN {
            return Ok(None);
        }
        let magic = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if magic != BEP_MAGIC {
            return Err(ProtoError::BadMagic {
                expected: BEP_MAGIC,
                found: magic,
            });
        }
        let hello_len = u16::from_be_bytes([self.buf[4], self.buf[5]]) as usize;
        if self.buf.len() < HELLO_PREFIX_LEN + hello_len {
            return Ok(None);
        }
        self.buf.advance(HELLO_PREFIX_LEN);
        let body = self.buf.split_to(hello_len);
        let hello = Hello::decode(&body[..])?;
        self.state = State::Framed;
        Ok(Some(Frame::Hello(hello)))
    }

    fn next_message(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let header_len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        let msg_len_at = 2 + header_len;
        if self.buf.len() < msg_len_at + 4 {
            return Ok(None);
        }
        let msg_len = u32::from_be_bytes([
            self.buf[msg_len_at],
            self.buf[msg_len_at + 1],
            self.buf[msg_len_at + 2],
            self.buf[msg_len_at + 3],
        ]) as usize;
        if msg_len > MAX_MESSAGE_LEN {
            return Err(ProtoError::FrameTooLarge(msg_len));
        }
        let total = msg_len_at + 4 + msg_len;
        if self.buf.len() < total {
            return Ok(None);
        }

        self.buf.advance(2);
        let header_bytes = self.buf.split_to(header_len);
        let header = Header::decode(&header_bytes[..])?;
        self.buf.advance(4);
        let raw = self.buf.split_to(msg_len);

        let payload = match MessageCompression::try_from(header.compression) {
            Ok(MessageCompression::None) => raw.to_vec(),
            Ok(MessageCompression::Lz4) => decompress(&raw)?,
            Err(_) => return Err(ProtoError::UnknownCompression(header.compression)),
        };
        Ok(Some(Frame::Message { header, payload }))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

fn decompress(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() < 4 {
        return Err(ProtoError::DecompressedLenMismatch {
            expected: 0,
            actual: raw.len(),
        });
    }
    let expected = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    if expected > MAX_MESSAGE_LEN {
        return Err(ProtoError::FrameTooLarge(expected));
    }
    let out = lz4_flex::block::decompress(&raw[4..], expected)?;
    if out.len() != expected {
        return Err(ProtoError::DecompressedLenMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Encode the hello preamble.
pub fn encode_hello(hello: &Hello) -> Vec<u8> {
    let body = hello.encode_to_vec();
    let mut out = Vec::with_capacity(HELLO_PREFIX_LEN + body.len());
    out.extend_from_slice(&BEP_MAGIC.to_be_bytes());
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Encode a post-hello frame. Outbound messages are never compressed.
pub fn encode_message(msg_type: MessageType, payload: &[u8]) -> Vec<u8> {
    let header = Header {
        r#type: msg_type as i32,
        compression: MessageCompression::None as i32,
    };
    let header_bytes = header.encode_to_vec();
    let mut out = Vec::with_capacity(2 + header_bytes.len() + 4 + payload.len());
    out.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}
