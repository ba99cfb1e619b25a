//! Relay rendezvous framing.
//!
//! Every relay frame is `magic (u32) | type (u32) | payload-length (u32) |
//! payload`, network byte order. Variable-length fields inside payloads are
//! length-prefixed with a u32. Only the client side of the session handshake
//! is modeled: send `ConnectRequest`, await `SessionInvitation`, then on the
//! session socket send `JoinSessionRequest` and await `Response`.

use farview_shared::constants::RELAY_MAGIC;

use crate::error::{ProtoError, Result};

pub const TYPE_JOIN_SESSION_REQUEST: u32 = 3;
pub const TYPE_RESPONSE: u32 = 4;
pub const TYPE_CONNECT_REQUEST: u32 = 5;
pub const TYPE_SESSION_INVITATION: u32 = 6;

/// `Response.code` signalling a successful session join.
pub const RESPONSE_SUCCESS: i32 = 0;

pub const HEADER_LEN: usize = 12;

/// Sanity cap on relay payloads; invitations are tiny.
const MAX_RELAY_PAYLOAD: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    ConnectRequest {
        /// Device id of the peer we want a session with.
        id: Vec<u8>,
    },
    JoinSessionRequest {
        key: Vec<u8>,
    },
    Response {
        code: i32,
        message: String,
    },
    SessionInvitation {
        from: Vec<u8>,
        key: Vec<u8>,
        /// Optional address override; empty means "same host as the relay".
        address: Vec<u8>,
        port: u16,
        server_socket: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub msg_type: u32,
    pub len: usize,
}

/// Parse the fixed 12-byte frame header, checking the relay magic.
pub fn decode_header(bytes: &[u8; HEADER_LEN]) -> Result<FrameHeader> {
    let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != RELAY_MAGIC {
        return Err(ProtoError::BadMagic {
            expected: RELAY_MAGIC,
            found: magic,
        });
    }
    let msg_type = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if len > MAX_RELAY_PAYLOAD {
        return Err(ProtoError::FrameTooLarge(len));
    }
    Ok(FrameHeader { msg_type, len })
}

/// Decode a payload according to the frame type from [`decode_header`].
pub fn decode_payload(msg_type: u32, payload: &[u8]) -> Result<RelayMessage> {
    let mut r = Reader::new(payload);
    let msg = match msg_type {
        TYPE_CONNECT_REQUEST => RelayMessage::ConnectRequest {
            id: r.bytes()?,
        },
        TYPE_JOIN_SESSION_REQUEST => RelayMessage::JoinSessionRequest { key: r.bytes()? },
        TYPE_RESPONSE => {
            let code = r.u32()? as i32;
            let message = String::from_utf8_lossy(&r.bytes()?).into_owned();
            RelayMessage::Response { code, message }
        }
        TYPE_SESSION_INVITATION => {
            let from = r.bytes()?;
            let key = r.bytes()?;
            let address = r.bytes()?;
            let port = r.u32()? as u16;
            let server_socket = r.u32()? != 0;
            RelayMessage::SessionInvitation {
                from,
                key,
                address,
                port,
                server_socket,
            }
        }
        _ => return Err(ProtoError::RelayMalformed("unexpected frame type")),
    };
    Ok(msg)
}

/// Encode a complete frame, header included.
pub fn encode(msg: &RelayMessage) -> Vec<u8> {
    let (msg_type, payload) = match msg {
        RelayMessage::ConnectRequest { id } => (TYPE_CONNECT_REQUEST, encode_bytes_field(id)),
        RelayMessage::JoinSessionRequest { key } => {
            (TYPE_JOIN_SESSION_REQUEST, encode_bytes_field(key))
        }
        RelayMessage::Response { code, message } => {
            let mut p = (*code as u32).to_be_bytes().to_vec();
            p.extend_from_slice(&encode_bytes_field(message.as_bytes()));
            (TYPE_RESPONSE, p)
        }
        RelayMessage::SessionInvitation {
            from,
            key,
            address,
            port,
            server_socket,
        } => {
            let mut p = encode_bytes_field(from);
            p.extend_from_slice(&encode_bytes_field(key));
            p.extend_from_slice(&encode_bytes_field(address));
            p.extend_from_slice(&(*port as u32).to_be_bytes());
            p.extend_from_slice(&(*server_socket as u32).to_be_bytes());
            (TYPE_SESSION_INVITATION, p)
        }
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&RELAY_MAGIC.to_be_bytes());
    out.extend_from_slice(&msg_type.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

fn encode_bytes_field(b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + b.len());
    out.extend_from_slice(&(b.len() as u32).to_be_bytes());
    out.extend_from_slice(b);
    out
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32> {
        if self.buf.len() < self.pos + 4 {
            return Err(ProtoError::RelayMalformed("truncated u32"));
        }
        let v = u32::from_be_bytes([
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        if len > MAX_RELAY_PAYLOAD || self.buf.len() < self.pos + len {
            return Err(ProtoError::RelayMalformed("truncated byte field"));
        }
        let out = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: RelayMessage) {
        let frame = encode(&msg);
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        let h = decode_header(&header).unwrap();
        assert_eq!(h.len, frame.len() - HEADER_LEN);
        let back = decode_payload(h.msg_type, &frame[HEADER_LEN..]).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn connect_request_roundtrip() {
        roundtrip(RelayMessage::ConnectRequest { id: vec![9u8; 32] });
    }

    #[test]
    fn join_session_roundtrip() {
        roundtrip(RelayMessage::JoinSessionRequest {
            key: vec![1, 2, 3, 4],
        });
    }

    #[test]
    fn response_roundtrip() {
        roundtrip(RelayMessage::Response {
            code: 2,
            message: "already connected".into(),
        });
    }

    #[test]
    fn invitation_roundtrip() {
        roundtrip(RelayMessage::SessionInvitation {
            from: vec![7u8; 32],
            key: vec![5u8; 16],
            address: b"203.0.113.4".to_vec(),
            port: 22067,
            server_socket: false,
        });
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut frame = encode(&RelayMessage::JoinSessionRequest { key: vec![] });
        frame[0] ^= 0xFF;
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        assert!(matches!(
            decode_header(&header),
            Err(ProtoError::BadMagic { .. })
        ));
    }

    #[test]
    fn truncated_invitation_rejected() {
        let frame = encode(&RelayMessage::SessionInvitation {
            from: vec![7u8; 32],
            key: vec![5u8; 16],
            address: vec![],
            port: 22067,
            server_socket: true,
        });
        let cut = frame.len() - 3;
        assert!(decode_payload(TYPE_SESSION_INVITATION, &frame[HEADER_LEN..cut]).is_err());
    }
}
