//! dfs-marmot - a small distributed file system in Rust.
//!
//! A central [`NamingServer`] owns the directory tree, its hierarchical
//! lock protocol, and the replication policy; [`StorageServer`]s hold the
//! file bytes and register their inventory at start-up. Clients and
//! servers talk through connection-per-call stubs and skeletons over raw
//! TCP.

pub mod config;
mod error;
pub mod naming;
mod path;
pub mod proto;
pub mod rpc;
pub mod storage;
pub mod wire;

pub use error::DfsError;
pub use naming::NamingServer;
pub use path::Path;
pub use proto::command::{Command, CommandStub};
pub use proto::registration::{Registration, RegistrationStub};
pub use proto::service::{Service, ServiceStub};
pub use proto::storage::{Storage, StorageStub};
pub use proto::{REGISTRATION_PORT, SERVICE_PORT};
pub use storage::StorageServer;
