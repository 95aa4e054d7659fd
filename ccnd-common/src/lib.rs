//! Shared types for the ccnb forwarder and repository: the wire codec, the
//! name model, the Interest/Content Object packet structures, and small
//! cross-crate identifiers and metrics primitives.

pub mod dtag;
pub mod error;
pub mod metrics;
pub mod name;
pub mod packet;
pub mod types;
pub mod wire;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
