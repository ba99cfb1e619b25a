//! BEP message records.
//!
//! Hand-written prost structs matching the BEP v1 protobuf schema. Field tags
//! follow the upstream wire format; only the messages a read-only client
//! exchanges are fully modeled. `DownloadProgress` is recognised and dropped.

use crate::error::{ProtoError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    ClusterConfig = 0,
    Index = 1,
    IndexUpdate = 2,
    Request = 3,
    Response = 4,
    DownloadProgress = 5,
    Ping = 6,
    Close = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum MessageCompression {
    None = 0,
    Lz4 = 1,
}

/// Entry types as they appear in index records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum FileInfoType {
    File = 0,
    Directory = 1,
    SymlinkFile = 2,
    SymlinkDirectory = 3,
    Symlink = 4,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Hello {
    #[prost(string, tag = "1")]
    pub device_name: String,
    #[prost(string, tag = "2")]
    pub client_name: String,
    #[prost(string, tag = "3")]
    pub client_version: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Header {
    #[prost(enumeration = "MessageType", tag = "1")]
    pub r#type: i32,
    #[prost(enumeration = "MessageCompression", tag = "2")]
    pub compression: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClusterConfig {
    #[prost(message, repeated, tag = "1")]
    pub folders: Vec<Folder>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Folder {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub label: String,
    #[prost(bool, tag = "3")]
    pub read_only: bool,
    #[prost(bool, tag = "4")]
    pub ignore_permissions: bool,
    #[prost(bool, tag = "5")]
    pub ignore_delete: bool,
    #[prost(bool, tag = "6")]
    pub disable_temp_indexes: bool,
    #[prost(bool, tag = "7")]
    pub paused: bool,
    #[prost(message, repeated, tag = "16")]
    pub devices: Vec<Device>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Device {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, repeated, tag = "3")]
    pub addresses: Vec<String>,
    #[prost(enumeration = "MessageCompression", tag = "4")]
    pub compression: i32,
    #[prost(string, tag = "5")]
    pub cert_name: String,
    #[prost(int64, tag = "6")]
    pub max_sequence: i64,
    #[prost(bool, tag = "7")]
    pub introducer: bool,
    #[prost(uint64, tag = "8")]
    pub index_id: u64,
    #[prost(bool, tag = "9")]
    pub skip_introduction_removals: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Index {
    #[prost(string, tag = "1")]
    pub folder: String,
    #[prost(message, repeated, tag = "2")]
    pub files: Vec<FileInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileInfo {
    /// Relative path within the folder, no leading slash.
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "FileInfoType", tag = "2")]
    pub r#type: i32,
    #[prost(int64, tag = "3")]
    pub size: i64,
    #[prost(uint32, tag = "4")]
    pub permissions: u32,
    #[prost(int64, tag = "5")]
    pub modified_s: i64,
    #[prost(bool, tag = "6")]
    pub deleted: bool,
    #[prost(bool, tag = "7")]
    pub invalid: bool,
    #[prost(bool, tag = "8")]
    pub no_permissions: bool,
    #[prost(message, optional, tag = "9")]
    pub version: Option<Vector>,
    #[prost(int64, tag = "10")]
    pub sequence: i64,
    #[prost(int32, tag = "11")]
    pub modified_ns: i32,
    #[prost(uint64, tag = "12")]
    pub modified_by: u64,
    #[prost(int32, tag = "13")]
    pub block_size: i32,
    #[prost(message, repeated, tag = "16")]
    pub blocks: Vec<BlockInfo>,
    #[prost(string, tag = "17")]
    pub symlink_target: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Vector {
    #[prost(message, repeated, tag = "1")]
    pub counters: Vec<Counter>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Counter {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub value: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BlockInfo {
    #[prost(int64, tag = "1")]
    pub offset: i64,
    #[prost(int32, tag = "2")]
    pub size: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub hash: Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub weak_hash: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub folder: String,
    /// Relative path within the folder, no leading slash.
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(int64, tag = "4")]
    pub offset: i64,
    #[prost(int32, tag = "5")]
    pub size: i32,
    #[prost(bytes = "vec", tag = "6")]
    pub hash: Vec<u8>,
    #[prost(bool, tag = "7")]
    pub from_temporary: bool,
}

/// Response codes: 0 ok, 1 generic, 2 no such file, 3 invalid.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
    #[prost(int32, tag = "3")]
    pub code: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ping {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Close {
    #[prost(string, tag = "1")]
    pub reason: String,
}

/// A decoded application message, tagged by type.
#[derive(Clone, Debug, PartialEq)]
pub enum BepMessage {
    ClusterConfig(ClusterConfig),
    Index(Index),
    IndexUpdate(Index),
    Request(Request),
    Response(Response),
    DownloadProgress,
    Ping,
    Close(Close),
}

impl BepMessage {
    /// Decode a frame payload according to its header type.
    ///
    /// Returns `Ok(None)` for message types this client drops (unknown ids).
    pub fn decode(msg_type: i32, payload: &[u8]) -> Result<Option<BepMessage>> {
        use prost::Message;
        let decoded = match MessageType::try_from(msg_type) {
            Ok(MessageType::ClusterConfig) => {
                BepMessage::ClusterConfig(ClusterConfig::decode(payload)?)
            }
            Ok(MessageType::Index) => BepMessage::Index(Index::decode(payload)?),
            Ok(MessageType::IndexUpdate) => BepMessage::IndexUpdate(Index::decode(payload)?),
            Ok(MessageType::Request) => BepMessage::Request(Request::decode(payload)?),
            Ok(MessageType::Response) => BepMessage::Response(Response::decode(payload)?),
            Ok(MessageType::DownloadProgress) => BepMessage::DownloadProgress,
            Ok(MessageType::Ping) => BepMessage::Ping,
            Ok(MessageType::Close) => BepMessage::Close(Close::decode(payload)?),
            Err(_) => {
                tracing::debug!(msg_type, "dropping message of unknown type");
                return Ok(None);
            }
        };
        Ok(Some(decoded))
    }
}

/// Reinterpret a wire 64-bit id as eight big-endian bytes for storage.
pub fn id_bytes(v: u64) -> [u8; 8] {
    v.to_be_bytes()
}

/// Inverse of [`id_bytes`], for outbound encoding.
pub fn id_value(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = b.len().min(8);
    buf[8 - n..].copy_from_slice(&b[..n]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn header_roundtrip() {
        let header = Header {
            r#type: MessageType::Index as i32,
            compression: MessageCompression::Lz4 as i32,
        };
        let bytes = header.encode_to_vec();
        let back = Header::decode(&bytes[..]).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn dispatch_by_type() {
        let req = Request {
            id: 9,
            folder: "music".into(),
            name: "a/b.flac".into(),
            offset: 131072,
            size: 131072,
            hash: vec![0xAA; 32],
            from_temporary: false,
        };
        let payload = req.encode_to_vec();
        let msg = BepMessage::decode(MessageType::Request as i32, &payload)
            .unwrap()
            .unwrap();
        assert_eq!(msg, BepMessage::Request(req));
    }

    #[test]
    fn unknown_type_dropped() {
        assert_eq!(BepMessage::decode(42, &[1, 2, 3]).unwrap(), None);
    }

    #[test]
    fn ping_has_empty_payload() {
        let msg = BepMessage::decode(MessageType::Ping as i32, &[]).unwrap();
        assert_eq!(msg, Some(BepMessage::Ping));
    }

    #[test]
    fn id_bytes_roundtrip() {
        let v = 0x0123_4567_89AB_CDEFu64;
        let b = id_bytes(v);
        assert_eq!(b[0], 0x01);
        assert_eq!(id_value(&b), v);
    }

    #[test]
    fn id_value_tolerates_short_input() {
        assert_eq!(id_value(&[0x01, 0x02]), 0x0102);
    }
}
