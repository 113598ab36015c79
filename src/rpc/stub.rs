//! Client-side call helper shared by every stub type.

use std::fmt::Display;
use std::io::Cursor;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::error::DfsError;
use crate::rpc::{InterfaceId, STATUS_FAULT, STATUS_OK};
use crate::wire::{decode, encode, frame};

/// Performs one remote invocation: connect, send the call frame, read the
/// reply frame, close.
///
/// Transport and deserialization failures surface as [`DfsError::Remote`];
/// a fault reply is decoded and returned as the server raised it.
pub(crate) async fn call(
    addr: SocketAddr,
    interface: InterfaceId,
    method: u32,
    args: &[u8],
) -> Result<Vec<u8>, DfsError> {
    let mut body = Vec::with_capacity(args.len() + 8);
    encode::u32(&mut body, interface as u32).map_err(transport)?;
    encode::u32(&mut body, method).map_err(transport)?;
    body.extend_from_slice(args);

    let mut socket = TcpStream::connect(addr).await.map_err(transport)?;
    let _ = socket.set_nodelay(true);
    frame::write(&mut socket, &body).await.map_err(transport)?;
    let reply = frame::read(&mut socket).await.map_err(transport)?;

    let mut src = Cursor::new(&reply[..]);
    match decode::u32(&mut src).map_err(|err| transport(format!("{err:?}")))? {
        STATUS_OK => Ok(reply[src.position() as usize..].to_vec()),
        STATUS_FAULT => Err(decode::error(&mut src).map_err(|err| transport(format!("{err:?}")))?),
        other => Err(DfsError::Remote(format!("unknown reply status {other}"))),
    }
}

fn transport(err: impl Display) -> DfsError {
    DfsError::Remote(err.to_string())
}
