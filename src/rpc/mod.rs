//! Connection-per-call RPC substrate.
//!
//! A [`Skeleton`] listens on an address and routes each incoming call to a
//! local implementation through its [`Dispatch`]. Stubs open a fresh
//! connection per invocation, exchange one call frame and one reply frame,
//! and close. The reply carries either the encoded return value or an
//! encoded fault, so a server-raised error is re-raised on the caller.

mod skeleton;
mod stub;

pub use skeleton::Skeleton;
pub(crate) use stub::call;

use async_trait::async_trait;
use num_derive::FromPrimitive;

use crate::error::DfsError;

/// Reply status: the payload is the encoded return value.
pub(crate) const STATUS_OK: u32 = 0;
/// Reply status: the payload is an encoded fault.
pub(crate) const STATUS_FAULT: u32 = 1;

/// Identifies a remote interface on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum InterfaceId {
    /// Client operations on the naming server.
    Service = 1,
    /// Storage-server registration with the naming server.
    Registration = 2,
    /// Byte-level file access on a storage server.
    Storage = 3,
    /// Control operations on a storage server.
    Command = 4,
}

/// Server-side binding between the wire and one interface implementation.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// The interface this dispatcher serves.
    fn interface(&self) -> InterfaceId;

    /// Decodes `payload`, invokes the method identified by `method` on the
    /// local implementation, and encodes its return value.
    async fn dispatch(&self, method: u32, payload: Vec<u8>) -> Result<Vec<u8>, DfsError>;
}
