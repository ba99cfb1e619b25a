pub mod bep;
pub mod error;
pub mod framer;
pub mod index;
pub mod relay;

pub use error::{ProtoError, Result};
pub use framer::{Frame, Framer};
