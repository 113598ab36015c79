//! Byte-level wire format shared by stubs and skeletons.
//!
//! Every value crossing a connection is encoded big-endian (network byte
//! order): fixed-width integers, length-prefixed strings and byte blobs,
//! boolean-prefixed options, and count-prefixed lists. A complete message
//! is a single frame: a `u32` body length followed by the body.
//!
//! Encoding writes into any [`std::io::Write`]; decoding reads from any
//! [`std::io::Read`] and enforces the length limits below, so a malformed
//! or hostile peer cannot force an oversized allocation.

pub mod decode;
pub mod encode;
pub mod frame;
#[cfg(test)]
mod tests;

use std::io;

use num_derive::FromPrimitive;

/// Maximum size in bytes of a single framed message body.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Maximum byte length of an encoded string (messages, addresses).
pub const MAX_STRING_LEN: usize = 4096;

/// Maximum byte length of a path in its string form.
pub const MAX_PATH_LEN: usize = 1024;

/// Maximum number of items in an encoded list.
pub const MAX_BATCH_LEN: usize = 65536;

/// Result of wire decoding with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding wire data.
#[derive(Debug)]
pub enum Error {
    /// The underlying reader failed or ended early.
    Io(io::Error),
    /// A tag field did not match any known variant.
    BadTag(u32),
    /// A length field exceeded its limit.
    TooLong(usize),
    /// A string field held invalid UTF-8.
    BadUtf8,
    /// A socket address field did not parse.
    BadAddr(String),
    /// A path field did not parse.
    BadPath(String),
}

/// Wire tags for the [`crate::DfsError`] variants.
#[derive(Debug, Copy, Clone, FromPrimitive)]
pub(crate) enum FaultTag {
    NotFound = 1,
    OutOfBounds = 2,
    Io = 3,
    NullArgument = 4,
    IllegalArgument = 5,
    IllegalState = 6,
    Remote = 7,
}
