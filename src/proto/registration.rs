//! The storage-server registration interface of the naming server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::DfsError;
use crate::path::Path;
use crate::proto::command::CommandStub;
use crate::proto::storage::StorageStub;
use crate::proto::{build, parse};
use crate::rpc::{self, Dispatch, InterfaceId};
use crate::wire::{decode, encode};

#[derive(Debug, Copy, Clone, FromPrimitive)]
pub(crate) enum Method {
    Register = 1,
}

/// Storage-server announcement to the naming server.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Announces a storage server and its file inventory. Returns the
    /// paths already known to the naming server, which the storage server
    /// must delete locally. `IllegalState` if the stub pair is already
    /// registered.
    async fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>, DfsError>;
}

/// Client-side proxy forwarding [`Registration`] calls to a naming server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationStub {
    addr: SocketAddr,
}

impl RegistrationStub {
    /// A stub for the naming server's registration endpoint at `addr`.
    pub fn new(addr: SocketAddr) -> RegistrationStub {
        RegistrationStub { addr }
    }

    /// The remote address this stub forwards to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Registration for RegistrationStub {
    async fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>, DfsError> {
        let args = build(|buf| {
            encode::socket_addr(buf, storage.addr())?;
            encode::socket_addr(buf, command.addr())?;
            encode::option(buf, Some(&paths), |buf, paths| {
                encode::list(buf, paths, |buf, path| encode::path(buf, path))
            })
        })?;
        let reply = rpc::call(self.addr, InterfaceId::Registration, Method::Register as u32, &args).await?;
        parse(&reply, |src| decode::list(src, decode::path))
    }
}

/// Server-side dispatcher binding a [`Registration`] implementation to the
/// wire.
pub(crate) struct RegistrationDispatch<R>(pub Arc<R>);

#[async_trait]
impl<R: Registration + 'static> Dispatch for RegistrationDispatch<R> {
    fn interface(&self) -> InterfaceId {
        InterfaceId::Registration
    }

    async fn dispatch(&self, method: u32, payload: Vec<u8>) -> Result<Vec<u8>, DfsError> {
        let Some(Method::Register) = Method::from_u32(method) else {
            return Err(DfsError::Remote(format!("unknown registration method {method}")));
        };
        let (storage, command, paths) = parse(&payload, |src| {
            let storage = StorageStub::new(decode::socket_addr(src)?);
            let command = CommandStub::new(decode::socket_addr(src)?);
            let paths = decode::option(src, |src| decode::list(src, decode::path))?;
            Ok((storage, command, paths))
        })?;
        // The inventory list is optional on the wire; an absent list is a
        // caller bug, answered without reaching the implementation.
        let Some(paths) = paths else {
            return Err(DfsError::NullArgument);
        };
        let duplicates = self.0.register(storage, command, paths).await?;
        build(|buf| encode::list(buf, &duplicates, |buf, path| encode::path(buf, path)))
    }
}
