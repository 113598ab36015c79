//! The fault taxonomy shared by every remote interface.
//!
//! Faults are classified by kind and travel across the wire as reply
//! payloads, so a server-raised error is re-raised on the caller with its
//! kind intact. Transport and deserialization failures on either side
//! surface as [`DfsError::Remote`].

use std::fmt;
use std::io;

use crate::path::Path;

/// Errors raised by naming- and storage-server operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DfsError {
    /// The path does not resolve to a node of the required kind.
    NotFound(Path),
    /// A read or write range falls outside the current file contents.
    OutOfBounds(String),
    /// A local filesystem operation failed on a storage server.
    Io(String),
    /// A required wire argument was flagged absent by the caller.
    NullArgument,
    /// A malformed argument, such as an unparsable path or an unlock of a
    /// path that holds no matching lock.
    IllegalArgument(String),
    /// The operation is invalid in the current server state, such as a
    /// duplicate registration.
    IllegalState(String),
    /// The call could not be carried across the transport, or the remote
    /// endpoint could not dispatch it.
    Remote(String),
}

impl fmt::Display for DfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfsError::NotFound(path) => write!(f, "{path} not found"),
            DfsError::OutOfBounds(message) => write!(f, "out of bounds: {message}"),
            DfsError::Io(message) => write!(f, "i/o failure: {message}"),
            DfsError::NullArgument => f.write_str("required argument absent"),
            DfsError::IllegalArgument(message) => write!(f, "illegal argument: {message}"),
            DfsError::IllegalState(message) => write!(f, "illegal state: {message}"),
            DfsError::Remote(message) => write!(f, "remote call failed: {message}"),
        }
    }
}

impl std::error::Error for DfsError {}

impl From<io::Error> for DfsError {
    fn from(err: io::Error) -> DfsError {
        DfsError::Io(err.to_string())
    }
}
