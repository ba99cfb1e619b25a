pub mod constants;
pub mod device_id;
pub mod error;
pub mod types;

pub use device_id::DeviceId;
pub use error::DeviceIdError;
pub use types::{EntryKind, ListEntry, Priority, SyncLevel};
