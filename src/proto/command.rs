//! The control plane of a storage server, used by the naming server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::DfsError;
use crate::path::Path;
use crate::proto::storage::StorageStub;
use crate::proto::{build, parse};
use crate::rpc::{self, Dispatch, InterfaceId};
use crate::wire::{decode, encode};

#[derive(Debug, Copy, Clone, FromPrimitive)]
pub(crate) enum Method {
    Create = 1,
    Delete = 2,
    Copy = 3,
}

/// Control operations the naming server issues against a storage server.
#[async_trait]
pub trait Command: Send + Sync {
    /// Creates an empty file, together with any missing ancestor
    /// directories. `false` on the root or an existing path.
    async fn create(&self, path: &Path) -> Result<bool, DfsError>;

    /// Removes a file or a directory subtree. `false` on the root or a
    /// missing path.
    async fn delete(&self, path: &Path) -> Result<bool, DfsError>;

    /// Replaces the local copy of `path` with the contents served by
    /// `source`. Used to install replicas.
    async fn copy(&self, path: &Path, source: &StorageStub) -> Result<bool, DfsError>;
}

/// Client-side proxy forwarding [`Command`] calls to a storage server.
///
/// Wire-encodable, like [`StorageStub`], so it can travel inside
/// registration requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandStub {
    addr: SocketAddr,
}

impl CommandStub {
    /// A stub for the command endpoint at `addr`.
    pub fn new(addr: SocketAddr) -> CommandStub {
        CommandStub { addr }
    }

    /// The remote address this stub forwards to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn invoke(&self, method: Method, args: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        rpc::call(self.addr, InterfaceId::Command, method as u32, &args).await
    }
}

#[async_trait]
impl Command for CommandStub {
    async fn create(&self, path: &Path) -> Result<bool, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::Create, args).await?;
        parse(&reply, |c| decode::bool(c))
    }

    async fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::Delete, args).await?;
        parse(&reply, |c| decode::bool(c))
    }

    async fn copy(&self, path: &Path, source: &StorageStub) -> Result<bool, DfsError> {
        let args = build(|buf| {
            encode::path(buf, path)?;
            encode::socket_addr(buf, source.addr())
        })?;
        let reply = self.invoke(Method::Copy, args).await?;
        parse(&reply, |c| decode::bool(c))
    }
}

/// Server-side dispatcher binding a [`Command`] implementation to the wire.
pub(crate) struct CommandDispatch<C>(pub Arc<C>);

#[async_trait]
impl<C: Command + 'static> Dispatch for CommandDispatch<C> {
    fn interface(&self) -> InterfaceId {
        InterfaceId::Command
    }

    async fn dispatch(&self, method: u32, payload: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        let Some(method) = Method::from_u32(method) else {
            return Err(DfsError::Remote(format!("unknown command method {method}")));
        };
        match method {
            Method::Create => {
                let path = parse(&payload, |c| decode::path(c))?;
                let value = self.0.create(&path).await?;
                build(|buf| encode::bool(buf, value))
            }
            Method::Delete => {
                let path = parse(&payload, |c| decode::path(c))?;
                let value = self.0.delete(&path).await?;
                build(|buf| encode::bool(buf, value))
            }
            Method::Copy => {
                let (path, source) =
                    parse(&payload, |src| Ok((decode::path(src)?, StorageStub::new(decode::socket_addr(src)?))))?;
                let value = self.0.copy(&path, &source).await?;
                build(|buf| encode::bool(buf, value))
            }
        }
    }
}
