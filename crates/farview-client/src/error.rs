use thiserror::Error;

use crate::scheduler::FetchError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Net(#[from] farview_net::NetError),

    #[error("Store error: {0}")]
    Store(#[from] farview_store::StoreError),

    #[error("Protocol error: {0}")]
    Proto(#[from] farview_proto::ProtoError),

    #[error("Device id error: {0}")]
    DeviceId(#[from] farview_shared::DeviceIdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read of {requested} bytes exceeds the {max} byte limit")]
    ReadTooLarge { requested: u64, max: u64 },

    #[error("Block fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol violation: {0}")]
    Violation(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
