//! Deserialization of wire values from any [`Read`] source.

use std::io::Read;
use std::net::SocketAddr;
use std::str::FromStr;

use byteorder::{BigEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use crate::error::DfsError;
use crate::path::Path;
use crate::wire::{Error, FaultTag, Result, MAX_BATCH_LEN, MAX_FRAME_LEN, MAX_PATH_LEN, MAX_STRING_LEN};

/// Parses a big-endian `u32`.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<BigEndian>().map_err(Error::Io)
}

/// Parses a big-endian `u64`.
pub fn u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<BigEndian>().map_err(Error::Io)
}

/// Parses a boolean encoded as a `u32` holding `0` or `1`.
pub fn bool(src: &mut impl Read) -> Result<bool> {
    match u32(src)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::BadTag(other)),
    }
}

/// Parses a length-prefixed byte blob, capped at `max` bytes.
pub fn bytes_max(src: &mut impl Read, max: usize) -> Result<Vec<u8>> {
    let len = u32(src)? as usize;
    if len > max {
        return Err(Error::TooLong(len));
    }
    let mut data = vec![0u8; len];
    src.read_exact(&mut data).map_err(Error::Io)?;
    Ok(data)
}

/// Parses a length-prefixed byte blob, capped at [`MAX_FRAME_LEN`].
pub fn bytes(src: &mut impl Read) -> Result<Vec<u8>> {
    bytes_max(src, MAX_FRAME_LEN)
}

/// Parses a length-prefixed UTF-8 string, capped at [`MAX_STRING_LEN`].
pub fn string(src: &mut impl Read) -> Result<String> {
    let data = bytes_max(src, MAX_STRING_LEN)?;
    String::from_utf8(data).map_err(|_| Error::BadUtf8)
}

/// Parses an optional value encoded as a boolean discriminator followed by
/// the value, if present.
pub fn option<T, S: Read>(src: &mut S, cont: impl FnOnce(&mut S) -> Result<T>) -> Result<Option<T>> {
    match bool(src)? {
        true => Ok(Some(cont(src)?)),
        false => Ok(None),
    }
}

/// Parses a count-prefixed list, capped at [`MAX_BATCH_LEN`] items.
pub fn list<T, S: Read>(src: &mut S, cont: impl Fn(&mut S) -> Result<T>) -> Result<Vec<T>> {
    let count = u32(src)? as usize;
    if count > MAX_BATCH_LEN {
        return Err(Error::TooLong(count));
    }
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(cont(src)?);
    }
    Ok(items)
}

/// Parses a [`Path`] from its string form, capped at [`MAX_PATH_LEN`].
pub fn path(src: &mut impl Read) -> Result<Path> {
    let data = bytes_max(src, MAX_PATH_LEN)?;
    let text = String::from_utf8(data).map_err(|_| Error::BadUtf8)?;
    Path::from_str(&text).map_err(|_| Error::BadPath(text))
}

/// Parses a socket address from its string form.
pub fn socket_addr(src: &mut impl Read) -> Result<SocketAddr> {
    let text = string(src)?;
    SocketAddr::from_str(&text).map_err(|_| Error::BadAddr(text))
}

/// Parses a [`DfsError`] from its fault tag and payload.
pub fn error(src: &mut impl Read) -> Result<DfsError> {
    let tag = u32(src)?;
    let Some(tag) = FaultTag::from_u32(tag) else {
        return Err(Error::BadTag(tag));
    };
    match tag {
        FaultTag::NotFound => Ok(DfsError::NotFound(path(src)?)),
        FaultTag::OutOfBounds => Ok(DfsError::OutOfBounds(string(src)?)),
        FaultTag::Io => Ok(DfsError::Io(string(src)?)),
        FaultTag::NullArgument => Ok(DfsError::NullArgument),
        FaultTag::IllegalArgument => Ok(DfsError::IllegalArgument(string(src)?)),
        FaultTag::IllegalState => Ok(DfsError::IllegalState(string(src)?)),
        FaultTag::Remote => Ok(DfsError::Remote(string(src)?)),
    }
}
