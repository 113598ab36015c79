//! Length-delimited frame transfer over stream sockets.
//!
//! One frame is a `u32` big-endian body length followed by the body. A
//! call exchanges exactly two frames: the request and the reply.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::wire::MAX_FRAME_LEN;

/// Writes one frame and flushes the destination.
pub async fn write<D: AsyncWrite + Unpin>(dest: &mut D, body: &[u8]) -> io::Result<()> {
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame body exceeds MAX_FRAME_LEN"));
    }
    dest.write_u32(body.len() as u32).await?;
    dest.write_all(body).await?;
    dest.flush().await
}

/// Reads one complete frame body.
pub async fn read<S: AsyncRead + Unpin>(src: &mut S) -> io::Result<Vec<u8>> {
    let len = src.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame body exceeds MAX_FRAME_LEN"));
    }
    let mut body = vec![0u8; len];
    src.read_exact(&mut body).await?;
    Ok(body)
}
