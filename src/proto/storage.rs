//! The byte-level data plane of a storage server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::DfsError;
use crate::path::Path;
use crate::proto::{build, parse};
use crate::rpc::{self, Dispatch, InterfaceId};
use crate::wire::{decode, encode};

#[derive(Debug, Copy, Clone, FromPrimitive)]
pub(crate) enum Method {
    Size = 1,
    Read = 2,
    Write = 3,
}

/// Byte-level access to the files a storage server holds.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The current length of an existing file in bytes.
    async fn size(&self, path: &Path) -> Result<u64, DfsError>;

    /// Exactly `length` bytes starting at `offset`. `OutOfBounds` unless
    /// `offset + length` is within the current file contents.
    async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, DfsError>;

    /// Writes `data` at `offset`. Writing past the current end extends the
    /// file.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), DfsError>;
}

/// Client-side proxy forwarding [`Storage`] calls to a storage server.
///
/// The stub is itself wire-encodable (as its address) so the naming server
/// can hand replicas out to clients and storage servers can copy from one
/// another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageStub {
    addr: SocketAddr,
}

impl StorageStub {
    /// A stub for the storage endpoint at `addr`.
    pub fn new(addr: SocketAddr) -> StorageStub {
        StorageStub { addr }
    }

    /// The remote address this stub forwards to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn invoke(&self, method: Method, args: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        rpc::call(self.addr, InterfaceId::Storage, method as u32, &args).await
    }
}

#[async_trait]
impl Storage for StorageStub {
    async fn size(&self, path: &Path) -> Result<u64, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::Size, args).await?;
        parse(&reply, |c| decode::u64(c))
    }

    async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, DfsError> {
        let args = build(|buf| {
            encode::path(buf, path)?;
            encode::u64(buf, offset)?;
            encode::u32(buf, length)
        })?;
        let reply = self.invoke(Method::Read, args).await?;
        parse(&reply, |c| decode::bytes(c))
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), DfsError> {
        let args = build(|buf| {
            encode::path(buf, path)?;
            encode::u64(buf, offset)?;
            encode::option(buf, Some(data), |buf, data| encode::bytes(buf, data))
        })?;
        let reply = self.invoke(Method::Write, args).await?;
        parse(&reply, |_| Ok(()))
    }
}

/// Server-side dispatcher binding a [`Storage`] implementation to the wire.
pub(crate) struct StorageDispatch<S>(pub Arc<S>);

#[async_trait]
impl<S: Storage + 'static> Dispatch for StorageDispatch<S> {
    fn interface(&self) -> InterfaceId {
        InterfaceId::Storage
    }

    async fn dispatch(&self, method: u32, payload: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        let Some(method) = Method::from_u32(method) else {
            return Err(DfsError::Remote(format!("unknown storage method {method}")));
        };
        match method {
            Method::Size => {
                let path = parse(&payload, |c| decode::path(c))?;
                let size = self.0.size(&path).await?;
                build(|buf| encode::u64(buf, size))
            }
            Method::Read => {
                let (path, offset, length) =
                    parse(&payload, |src| Ok((decode::path(src)?, decode::u64(src)?, decode::u32(src)?)))?;
                let data = self.0.read(&path, offset, length).await?;
                build(|buf| encode::bytes(buf, &data))
            }
            Method::Write => {
                let (path, offset, data) = parse(&payload, |src| {
                    Ok((decode::path(src)?, decode::u64(src)?, decode::option(src, decode::bytes)?))
                })?;
                // The payload is optional on the wire; an absent blob is a
                // caller bug, answered without reaching the implementation.
                let Some(data) = data else {
                    return Err(DfsError::NullArgument);
                };
                self.0.write(&path, offset, &data).await?;
                Ok(Vec::new())
            }
        }
    }
}
