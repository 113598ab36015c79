//! Serialization of wire values into any [`Write`] destination.

use std::io::{self, Write};
use std::net::SocketAddr;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::DfsError;
use crate::path::Path;
use crate::wire::{FaultTag, MAX_PATH_LEN};

/// Serializes a `u32` in big-endian order.
pub fn u32(dest: &mut dyn Write, n: u32) -> io::Result<()> {
    dest.write_u32::<BigEndian>(n)
}

/// Serializes a `u64` in big-endian order.
pub fn u64(dest: &mut dyn Write, n: u64) -> io::Result<()> {
    dest.write_u64::<BigEndian>(n)
}

/// Serializes a boolean as a `u32` holding `0` or `1`.
pub fn bool(dest: &mut dyn Write, b: bool) -> io::Result<()> {
    u32(dest, b as u32)
}

/// Serializes a length-prefixed byte blob.
pub fn bytes(dest: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    let len = data
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "blob length exceeds u32"))?;
    u32(dest, len)?;
    dest.write_all(data)
}

/// Serializes a length-prefixed UTF-8 string.
pub fn string(dest: &mut dyn Write, text: &str) -> io::Result<()> {
    bytes(dest, text.as_bytes())
}

/// Serializes an optional value as a boolean discriminator followed by the
/// value, if present.
pub fn option<T, D: Write>(
    dest: &mut D,
    value: Option<T>,
    cont: impl FnOnce(&mut D, T) -> io::Result<()>,
) -> io::Result<()> {
    match value {
        Some(value) => {
            bool(dest, true)?;
            cont(dest, value)
        }
        None => bool(dest, false),
    }
}

/// Serializes a count-prefixed list.
pub fn list<T, D: Write>(
    dest: &mut D,
    items: &[T],
    cont: impl Fn(&mut D, &T) -> io::Result<()>,
) -> io::Result<()> {
    let count = items
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "list length exceeds u32"))?;
    u32(dest, count)?;
    for item in items {
        cont(dest, item)?;
    }
    Ok(())
}

/// Serializes a [`Path`] as its string form, capped at [`MAX_PATH_LEN`].
pub fn path(dest: &mut dyn Write, path: &Path) -> io::Result<()> {
    let text = path.to_string();
    if text.len() > MAX_PATH_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "path exceeds MAX_PATH_LEN"));
    }
    string(dest, &text)
}

/// Serializes a socket address as its string form.
pub fn socket_addr(dest: &mut dyn Write, addr: SocketAddr) -> io::Result<()> {
    string(dest, &addr.to_string())
}

/// Serializes a [`DfsError`] as a fault tag followed by its payload.
pub fn error(dest: &mut dyn Write, err: &DfsError) -> io::Result<()> {
    match err {
        DfsError::NotFound(at) => {
            u32(dest, FaultTag::NotFound as u32)?;
            path(dest, at)
        }
        DfsError::OutOfBounds(message) => {
            u32(dest, FaultTag::OutOfBounds as u32)?;
            string(dest, message)
        }
        DfsError::Io(message) => {
            u32(dest, FaultTag::Io as u32)?;
            string(dest, message)
        }
        DfsError::NullArgument => u32(dest, FaultTag::NullArgument as u32),
        DfsError::IllegalArgument(message) => {
            u32(dest, FaultTag::IllegalArgument as u32)?;
            string(dest, message)
        }
        DfsError::IllegalState(message) => {
            u32(dest, FaultTag::IllegalState as u32)?;
            string(dest, message)
        }
        DfsError::Remote(message) => {
            u32(dest, FaultTag::Remote as u32)?;
            string(dest, message)
        }
    }
}
