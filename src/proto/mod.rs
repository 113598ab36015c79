//! Remote interface contracts exposed through the RPC substrate.
//!
//! Each interface module defines the async trait, its wire method tags, a
//! client stub forwarding the trait over [`crate::rpc::call`], and a
//! server dispatcher decoding calls onto a local implementation. Stubs
//! hold only the remote address; two stubs are equal iff their interface
//! type and address match.

pub mod command;
pub mod registration;
pub mod service;
pub mod storage;

use std::io::{self, Cursor};

use crate::error::DfsError;
use crate::wire;

/// Well-known naming-server port for client operations.
pub const SERVICE_PORT: u16 = 6000;

/// Well-known naming-server port for storage-server registration.
pub const REGISTRATION_PORT: u16 = 6001;

/// Encodes an argument or reply payload into a fresh buffer.
pub(crate) fn build(cont: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> Result<Vec<u8>, DfsError> {
    let mut buf = Vec::new();
    cont(&mut buf).map_err(|err| DfsError::Remote(err.to_string()))?;
    Ok(buf)
}

/// Decodes a complete payload, rejecting trailing bytes.
pub(crate) fn parse<T>(
    payload: &[u8],
    cont: impl FnOnce(&mut Cursor<&[u8]>) -> wire::Result<T>,
) -> Result<T, DfsError> {
    let mut src = Cursor::new(payload);
    let value = cont(&mut src).map_err(|err| DfsError::Remote(format!("malformed payload: {err:?}")))?;
    if (src.position() as usize) < payload.len() {
        return Err(DfsError::Remote("trailing bytes in payload".to_owned()));
    }
    Ok(value)
}
