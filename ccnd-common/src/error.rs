//! Error types shared across the forwarder and repository crates.

use thiserror::Error;

/// Errors produced while decoding a ccnb token stream.
///
/// `Incomplete` and `Malformed` are kept distinct so callers on a stream
/// face can tell "wait for more bytes" apart from "drop this message".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before a complete token (or element) could be read.
    #[error("need more bytes")]
    Incomplete,

    /// The bytes present do not form a valid ccnb token stream.
    #[error("malformed ccnb input: {0}")]
    Malformed(String),

    /// A structurally critical tag (name, content, signature) was missing,
    /// out of order, or of the wrong token type.
    #[error("unknown critical tag {0}")]
    UnknownCriticalTag(u64),

    /// A length field exceeded the codec's configured maximum.
    #[error("length overflow: {0} exceeds maximum")]
    LengthOverflow(usize),
}

/// All errors that can occur within the forwarder/repository core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("wire codec error: {0}")]
    Wire(#[from] WireError),

    #[error("name error: {0}")]
    Name(String),

    #[error("face error: {0}")]
    Face(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("other error: {0}")]
    Other(String),
}
