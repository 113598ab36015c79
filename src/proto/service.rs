//! The client-facing naming-server interface.

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
    IsDirectory = 1,
    List = 2,
    CreateFile = 3,
    CreateDirectory = 4,
    Delete = 5,
    GetStorage = 6,
    Lock = 7,
    Unlock = 8,
}

/// Client operations on the naming server's directory tree.
#[async_trait]
pub trait Service: Send + Sync {
    /// Reports whether `path` names a directory. `NotFound` if the path
    /// does not resolve.
    async fn is_directory(&self, path: &Path) -> Result<bool, DfsError>;

    /// The child names of an existing directory, unordered.
    async fn list(&self, directory: &Path) -> Result<Vec<String>, DfsError>;

    /// Creates an empty file on some registered storage server. `false` if
    /// the path already exists; `NotFound` if the parent is missing or a
    /// file; `IllegalState` with no storage servers registered.
    async fn create_file(&self, path: &Path) -> Result<bool, DfsError>;

    /// Creates an empty directory. `false` if the path already exists;
    /// `NotFound` if the parent is missing or a file.
    async fn create_directory(&self, path: &Path) -> Result<bool, DfsError>;

    /// Removes a file or a directory subtree together with its bytes on
    /// the storage servers. `false` on the root or on a storage failure.
    async fn delete(&self, path: &Path) -> Result<bool, DfsError>;

    /// A storage stub for one replica of an existing file. The chosen
    /// replica becomes the file's primary for later invalidation.
    async fn get_storage(&self, file: &Path) -> Result<StorageStub, DfsError>;

    /// Locks `path` for shared (`exclusive = false`) or exclusive access,
    /// read-locking every strict ancestor first. Callers are admitted in
    /// arrival order, so writers are not starved by overlapping readers.
    async fn lock(&self, path: &Path, exclusive: bool) -> Result<(), DfsError>;

    /// Releases a lock taken by [`Service::lock`]. `IllegalArgument` if
    /// `path` holds no matching lock.
    async fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), DfsError>;
}

/// Client-side proxy forwarding [`Service`] calls to a naming server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceStub {
    addr: SocketAddr,
}

impl ServiceStub {
    /// A stub for the naming server's service endpoint at `addr`.
    pub fn new(addr: SocketAddr) -> ServiceStub {
        ServiceStub { addr }
    }

    /// The remote address this stub forwards to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn invoke(&self, method: Method, args: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        rpc::call(self.addr, InterfaceId::Service, method as u32, &args).await
    }
}

#[async_trait]
impl Service for ServiceStub {
    async fn is_directory(&self, path: &Path) -> Result<bool, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::IsDirectory, args).await?;
        parse(&reply, |c| decode::bool(c))
    }

    async fn list(&self, directory: &Path) -> Result<Vec<String>, DfsError> {
        let args = build(|buf| encode::path(buf, directory))?;
        let reply = self.invoke(Method::List, args).await?;
        parse(&reply, |src| decode::list(src, decode::string))
    }

    async fn create_file(&self, path: &Path) -> Result<bool, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::CreateFile, args).await?;
        parse(&reply, |c| decode::bool(c))
    }

    async fn create_directory(&self, path: &Path) -> Result<bool, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::CreateDirectory, args).await?;
        parse(&reply, |c| decode::bool(c))
    }

    async fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        let args = build(|buf| encode::path(buf, path))?;
        let reply = self.invoke(Method::Delete, args).await?;
        parse(&reply, |c| decode::bool(c))
    }

    async fn get_storage(&self, file: &Path) -> Result<StorageStub, DfsError> {
        let args = build(|buf| encode::path(buf, file))?;
        let reply = self.invoke(Method::GetStorage, args).await?;
        let addr = parse(&reply, |c| decode::socket_addr(c))?;
        Ok(StorageStub::new(addr))
    }

    async fn lock(&self, path: &Path, exclusive: bool) -> Result<(), DfsError> {
        let args = build(|buf| {
            encode::path(buf, path)?;
            encode::bool(buf, exclusive)
        })?;
        let reply = self.invoke(Method::Lock, args).await?;
        parse(&reply, |_| Ok(()))
    }

    async fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), DfsError> {
        let args = build(|buf| {
            encode::path(buf, path)?;
            encode::bool(buf, exclusive)
        })?;
        let reply = self.invoke(Method::Unlock, args).await?;
        parse(&reply, |_| Ok(()))
    }
}

/// Server-side dispatcher binding a [`Service`] implementation to the wire.
pub(crate) struct ServiceDispatch<S>(pub Arc<S>);

#[async_trait]
impl<S: Service + 'static> Dispatch for ServiceDispatch<S> {
    fn interface(&self) -> InterfaceId {
        InterfaceId::Service
    }

    async fn dispatch(&self, method: u32, payload: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        let Some(method) = Method::from_u32(method) else {
            return Err(DfsError::Remote(format!("unknown service method {method}")));
        };
        match method {
            Method::IsDirectory => {
                let path = parse(&payload, |c| decode::path(c))?;
                let value = self.0.is_directory(&path).await?;
                build(|buf| encode::bool(buf, value))
            }
            Method::List => {
                let path = parse(&payload, |c| decode::path(c))?;
                let names = self.0.list(&path).await?;
                build(|buf| encode::list(buf, &names, |buf, name| encode::string(buf, name)))
            }
            Method::CreateFile => {
                let path = parse(&payload, |c| decode::path(c))?;
                let value = self.0.create_file(&path).await?;
                build(|buf| encode::bool(buf, value))
            }
            Method::CreateDirectory => {
                let path = parse(&payload, |c| decode::path(c))?;
                let value = self.0.create_directory(&path).await?;
                build(|buf| encode::bool(buf, value))
            }
            Method::Delete => {
                let path = parse(&payload, |c| decode::path(c))?;
                let value = self.0.delete(&path).await?;
                build(|buf| encode::bool(buf, value))
            }
            Method::GetStorage => {
                let path = parse(&payload, |c| decode::path(c))?;
                let stub = self.0.get_storage(&path).await?;
                build(|buf| encode::socket_addr(buf, stub.addr()))
            }
            Method::Lock => {
                let (path, exclusive) = parse(&payload, |src| Ok((decode::path(src)?, decode::bool(src)?)))?;
                self.0.lock(&path, exclusive).await?;
                Ok(Vec::new())
            }
            Method::Unlock => {
                let (path, exclusive) = parse(&payload, |src| Ok((decode::path(src)?, decode::bool(src)?)))?;
                self.0.unlock(&path, exclusive).await?;
                Ok(Vec::new())
            }
        }
    }
}
