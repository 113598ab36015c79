//! Naming server: the single authority over the directory tree.
//!
//! The naming server owns the namespace, the hierarchical lock protocol,
//! the storage-server registry, and the replication policy. It serves two
//! remote interfaces over one shared state: [`Service`] for clients and
//! [`Registration`] for storage servers.
//!
//! Nothing here touches file bytes. Files move only when the naming
//! server directs storage servers to copy or delete them: replication
//! when a file's shared-lock traffic crosses the policy threshold, and
//! invalidation of stale replicas when an exclusive lock is released.

mod locks;
mod tree;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::DfsError;
use crate::path::Path;
use crate::proto::command::{Command, CommandStub};
use crate::proto::registration::{Registration, RegistrationDispatch};
use crate::proto::service::{Service, ServiceDispatch};
use crate::proto::storage::StorageStub;
use crate::rpc::Skeleton;

use locks::LockManager;
use tree::{NodeKind, ServerId, Tree};

/// A running naming server.
pub struct NamingServer {
    service: Skeleton,
    registration: Skeleton,
}

impl NamingServer {
    /// Starts a naming server on the two given addresses (port `0` selects
    /// ephemeral ports). Both skeletons dispatch onto one shared state, so
    /// registrations are visible to client operations.
    pub async fn start(service_addr: SocketAddr, registration_addr: SocketAddr) -> std::io::Result<NamingServer> {
        let state = Arc::new(NamingState::new());
        let service = Skeleton::bind(service_addr, Arc::new(ServiceDispatch(state.clone()))).await?;
        let registration = Skeleton::bind(registration_addr, Arc::new(RegistrationDispatch(state))).await?;
        info!(
            service = %service.local_addr(),
            registration = %registration.local_addr(),
            "naming server started"
        );
        Ok(NamingServer { service, registration })
    }

    /// The address clients reach the [`Service`] interface at.
    pub fn service_addr(&self) -> SocketAddr {
        self.service.local_addr()
    }

    /// The address storage servers reach the [`Registration`] interface at.
    pub fn registration_addr(&self) -> SocketAddr {
        self.registration.local_addr()
    }

    /// Stops both skeletons. In-flight calls run to completion.
    pub async fn stop(self) {
        self.service.stop().await;
        self.registration.stop().await;
    }
}

/// One registered storage server: the stub pair it announced.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StorageDescriptor {
    storage: StorageStub,
    command: CommandStub,
}

/// The state shared by both skeletons.
struct NamingState {
    tree: Tree,
    locks: LockManager,
    registry: Mutex<Vec<StorageDescriptor>>,
}

impl NamingState {
    fn new() -> NamingState {
        NamingState { tree: Tree::new(), locks: LockManager::new(), registry: Mutex::new(Vec::new()) }
    }

    fn registry_snapshot(&self) -> Vec<StorageDescriptor> {
        self.registry.lock().expect("registry mutex poisoned").clone()
    }

    fn descriptor(&self, id: ServerId) -> Option<StorageDescriptor> {
        self.registry.lock().expect("registry mutex poisoned").get(id).cloned()
    }

    /// A uniformly random registered server for placing a new file.
    fn pick_server(&self) -> Result<(ServerId, StorageDescriptor), DfsError> {
        let registry = self.registry.lock().expect("registry mutex poisoned");
        if registry.is_empty() {
            return Err(DfsError::IllegalState("no storage servers registered".to_owned()));
        }
        let id = rand::thread_rng().gen_range(0..registry.len());
        Ok((id, registry[id].clone()))
    }

    fn release_shared(&self, taken: &[Path]) {
        for path in taken.iter().rev() {
            let _ = self.locks.read_unlock(path);
        }
    }

    /// Installs replicas if this shared lock pushed the file's read
    /// pressure over the policy threshold. Runs under the caller's read
    /// lock, so no writer can race the copies. Failures are logged; the
    /// read that triggered replication does not depend on it.
    async fn replicate_on_read(&self, path: &Path) {
        let plan = match self.tree.bump_read(path) {
            Ok(Some(plan)) => plan,
            _ => return,
        };
        let registry = self.registry_snapshot();
        let Some(source) = plan.have.first().and_then(|id| registry.get(*id)) else {
            return;
        };
        let source = source.storage.clone();
        let mut missing = plan.want.saturating_sub(plan.have.len());
        for (id, descriptor) in registry.iter().enumerate() {
            if missing == 0 {
                break;
            }
            if plan.have.contains(&id) {
                continue;
            }
            match descriptor.command.copy(path, &source).await {
                Ok(true) => {
                    if self.tree.add_replica(path, id).is_ok() {
                        debug!(%path, server = id, "installed replica");
                        missing -= 1;
                    }
                }
                Ok(false) => warn!(%path, server = id, "replica copy refused"),
                Err(err) => warn!(%path, server = id, %err, "replica copy failed"),
            }
        }
    }

    /// Deletes every replica other than the primary. Runs while the
    /// writer's exclusive hold is still in place, so no reader can be
    /// handed a stale copy. The set shrinks first; a replica that may
    /// hold stale bytes must never be chosen again, even if its delete
    /// fails.
    async fn invalidate(&self, path: &Path) {
        let Ok((primary, replicas)) = self.tree.primary_and_replicas(path) else {
            return;
        };
        let stale: Vec<ServerId> = replicas.into_iter().filter(|id| *id != primary).collect();
        if stale.is_empty() {
            return;
        }
        if self.tree.retain_only(path, primary).is_err() {
            return;
        }
        for id in stale {
            let Some(descriptor) = self.descriptor(id) else {
                continue;
            };
            match descriptor.command.delete(path).await {
                Ok(_) => debug!(%path, server = id, "invalidated stale replica"),
                Err(err) => warn!(%path, server = id, %err, "stale replica delete failed"),
            }
        }
    }
}

#[async_trait]
impl Service for NamingState {
    async fn is_directory(&self, path: &Path) -> Result<bool, DfsError> {
        self.tree.is_directory(path)
    }

    async fn list(&self, directory: &Path) -> Result<Vec<String>, DfsError> {
        self.tree.list(directory)
    }

    async fn create_file(&self, path: &Path) -> Result<bool, DfsError> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        if self.tree.kind(path).is_some() {
            return Ok(false);
        }
        if self.tree.kind(&parent) != Some(NodeKind::Directory) {
            return Err(DfsError::NotFound(parent));
        }
        let (id, descriptor) = self.pick_server()?;
        if !descriptor.command.create(path).await? {
            // The chosen server already held bytes at this path; leave the
            // namespace unchanged rather than adopt them.
            return Ok(false);
        }
        self.tree.insert_file(path, id)
    }

    async fn create_directory(&self, path: &Path) -> Result<bool, DfsError> {
        if path.is_root() {
            return Ok(false);
        }
        self.tree.insert_directory(path)
    }

    async fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        if path.is_root() {
            return Ok(false);
        }
        let kind = self.tree.kind(path).ok_or_else(|| DfsError::NotFound(path.clone()))?;
        let registry = self.registry_snapshot();
        let targets: Vec<(ServerId, CommandStub)> = match kind {
            // A file lives only on its replicas; a directory's contents may
            // sit anywhere, so every server drops the prefix.
            NodeKind::File => self
                .tree
                .replicas(path)?
                .into_iter()
                .filter_map(|id| registry.get(id).map(|descriptor| (id, descriptor.command.clone())))
                .collect(),
            NodeKind::Directory => {
                registry.iter().enumerate().map(|(id, descriptor)| (id, descriptor.command.clone())).collect()
            }
        };
        let mut all_ok = true;
        for (id, command) in targets {
            // `false` only means the server held nothing under this path.
            if let Err(err) = command.delete(path).await {
                warn!(%path, server = id, %err, "storage delete failed");
                all_ok = false;
            }
        }
        if !all_ok {
            return Ok(false);
        }
        self.tree.remove(path)?;
        self.locks.forget_subtree(path);
        Ok(true)
    }

    async fn get_storage(&self, file: &Path) -> Result<StorageStub, DfsError> {
        let replicas = self.tree.replicas(file)?;
        let id = replicas
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| DfsError::IllegalState(format!("{file} has no replicas")))?;
        self.tree.set_primary(file, id)?;
        let descriptor =
            self.descriptor(id).ok_or_else(|| DfsError::IllegalState(format!("replica {id} is not registered")))?;
        Ok(descriptor.storage)
    }

    async fn lock(&self, path: &Path, exclusive: bool) -> Result<(), DfsError> {
        if self.tree.kind(path).is_none() {
            return Err(DfsError::NotFound(path.clone()));
        }
        let admission = self.locks.admit().await?;
        let mut taken: Vec<Path> = Vec::new();
        for ancestor in path.ancestors() {
            // The target was just resolved, but a concurrent delete can
            // still empty the way down to it.
            if self.tree.kind(&ancestor).is_none() {
                drop(admission);
                self.release_shared(&taken);
                return Err(DfsError::NotFound(path.clone()));
            }
            self.locks.read_lock(&ancestor).await;
            taken.push(ancestor);
        }
        let kind = self.tree.kind(path);
        if kind.is_none() {
            drop(admission);
            self.release_shared(&taken);
            return Err(DfsError::NotFound(path.clone()));
        }
        if exclusive {
            self.locks.write_lock_queued(path, admission).await;
        } else {
            self.locks.read_lock_queued(path, admission).await;
            if kind == Some(NodeKind::File) {
                self.replicate_on_read(path).await;
            }
        }
        Ok(())
    }

    async fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), DfsError> {
        if exclusive {
            let guard = self.locks.take_write(path)?;
            if self.tree.kind(path) == Some(NodeKind::File) {
                self.invalidate(path).await;
            }
            drop(guard);
        } else {
            self.locks.read_unlock(path)?;
        }
        let ancestors: Vec<Path> = path.ancestors().collect();
        for ancestor in ancestors.iter().rev() {
            let _ = self.locks.read_unlock(ancestor);
        }
        Ok(())
    }
}

#[async_trait]
impl Registration for NamingState {
    async fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>, DfsError> {
        let descriptor = StorageDescriptor { storage, command };
        let id = {
            let mut registry = self.registry.lock().expect("registry mutex poisoned");
            if registry.contains(&descriptor) {
                return Err(DfsError::IllegalState("storage server already registered".to_owned()));
            }
            registry.push(descriptor);
            registry.len() - 1
        };
        let mut duplicates = Vec::new();
        for path in paths {
            if path.is_root() {
                continue;
            }
            if !self.tree.absorb(&path, id) {
                duplicates.push(path);
            }
        }
        info!(server = id, duplicates = duplicates.len(), "storage server registered");
        Ok(duplicates)
    }
}
