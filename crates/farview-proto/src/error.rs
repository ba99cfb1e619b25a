use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("bad stream magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("frame of {0} bytes exceeds the message size limit")]
    FrameTooLarge(usize),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("LZ4 decompression failed: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    #[error("decompressed payload is {actual} bytes, header promised {expected}")]
    DecompressedLenMismatch { expected: usize, actual: usize },

    #[error("unsupported compression id {0}")]
    UnknownCompression(i32),

    #[error("relay frame truncated or malformed: {0}")]
    RelayMalformed(&'static str),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
