pub mod discovery;
pub mod error;
pub mod relay_dial;
pub mod tls;
pub mod transport;

pub use discovery::{resolve_target, Resolver};
pub use error::{NetError, Result};
pub use tls::TlsIdentity;
pub use transport::{TargetAddr, Transport, TransportEvent};
