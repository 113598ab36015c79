//! Server-side listener dispatching framed calls onto a local object.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use num_traits::FromPrimitive;

use crate::error::DfsError;
use crate::rpc::{Dispatch, InterfaceId, STATUS_FAULT, STATUS_OK};
use crate::wire::{decode, encode, frame};

/// A listening endpoint serving one remote interface.
///
/// Binding spawns an acceptor task; every accepted connection is served on
/// its own task with a single call/reply exchange. [`Skeleton::stop`] ends
/// the acceptor and closes the listening socket; connections already being
/// served run to completion.
pub struct Skeleton {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    acceptor: JoinHandle<()>,
}

impl Skeleton {
    /// Binds a listener on `addr` (port `0` selects an ephemeral port) and
    /// starts accepting calls for `handler`.
    pub async fn bind(addr: SocketAddr, handler: Arc<dyn Dispatch>) -> std::io::Result<Skeleton> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, signal) = watch::channel(false);
        let acceptor = tokio::spawn(accept_loop(listener, handler, signal));
        debug!(%local_addr, "skeleton listening");
        Ok(Skeleton { local_addr, shutdown, acceptor })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the acceptor to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.acceptor.await;
    }
}

async fn accept_loop(listener: TcpListener, handler: Arc<dyn Dispatch>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    let _ = socket.set_nodelay(true);
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve(socket, handler).await {
                            debug!(%peer, ?err, "connection aborted");
                        }
                    });
                }
                Err(err) => {
                    error!(?err, "listener failed, stopping acceptor");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}

/// Serves one call: request frame in, reply frame out, connection closed.
async fn serve(mut socket: TcpStream, handler: Arc<dyn Dispatch>) -> std::io::Result<()> {
    let body = frame::read(&mut socket).await?;
    let mut src = Cursor::new(&body[..]);
    let (interface, method) = match (decode::u32(&mut src), decode::u32(&mut src)) {
        (Ok(interface), Ok(method)) => (interface, method),
        _ => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "short call header")),
    };
    let args = body[src.position() as usize..].to_vec();

    let result = if InterfaceId::from_u32(interface) == Some(handler.interface()) {
        handler.dispatch(method, args).await
    } else {
        Err(DfsError::Remote(format!("interface {interface} is not served at this endpoint")))
    };

    let mut reply = Vec::new();
    match result {
        Ok(payload) => {
            encode::u32(&mut reply, STATUS_OK)?;
            reply.extend_from_slice(&payload);
        }
        Err(fault) => {
            encode::u32(&mut reply, STATUS_FAULT)?;
            encode::error(&mut reply, &fault)?;
        }
    }
    frame::write(&mut socket, &reply).await
}
