//! Storage server: byte-level file service under a local root directory.
//!
//! A storage server exposes the [`Storage`] data plane and the [`Command`]
//! control plane on two skeletons. At start-up it walks its root,
//! announces the inventory to the naming server, deletes whatever the
//! naming server reports as duplicate, and prunes directories the
//! deletions emptied.
//!
//! The data and control planes are serialized by a single mutex per
//! server; the correctness concern is metadata consistency, not
//! throughput. `copy` composes the serialized operations and relies on
//! the naming server's exclusive lock for atomicity.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DfsError;
use crate::path::Path;
use crate::proto::command::{Command, CommandDispatch, CommandStub};
use crate::proto::registration::{Registration, RegistrationStub};
use crate::proto::storage::{Storage, StorageDispatch, StorageStub};
use crate::rpc::Skeleton;

/// Replica installation moves at most this many bytes per read call.
const COPY_CHUNK: u32 = 4 * 1024 * 1024;

/// A running storage server registered with a naming server.
pub struct StorageServer {
    node: Arc<StorageNode>,
    storage_skeleton: Skeleton,
    command_skeleton: Skeleton,
    storage_stub: StorageStub,
    command_stub: CommandStub,
}

impl StorageServer {
    /// Starts a storage server rooted at `root`, binds its two skeletons,
    /// and registers the local inventory with the naming server's
    /// registration endpoint at `naming`.
    ///
    /// `advertise` is the address other hosts reach this server at; the
    /// self-stubs combine it with the bound ports, so ephemeral ports
    /// (port `0` in `storage_addr`/`command_addr`) work.
    pub async fn start(
        root: PathBuf,
        storage_addr: SocketAddr,
        command_addr: SocketAddr,
        advertise: IpAddr,
        naming: SocketAddr,
    ) -> Result<StorageServer, DfsError> {
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root).await?;
        let node = Arc::new(StorageNode { root, io_gate: Mutex::new(()) });

        let storage_skeleton = Skeleton::bind(storage_addr, Arc::new(StorageDispatch(node.clone()))).await?;
        let command_skeleton = Skeleton::bind(command_addr, Arc::new(CommandDispatch(node.clone()))).await?;
        let storage_stub = StorageStub::new(SocketAddr::new(advertise, storage_skeleton.local_addr().port()));
        let command_stub = CommandStub::new(SocketAddr::new(advertise, command_skeleton.local_addr().port()));

        let inventory = node.inventory().await?;
        info!(root = %node.root.display(), files = inventory.len(), "registering with naming server");
        let duplicates = RegistrationStub::new(naming)
            .register(storage_stub.clone(), command_stub.clone(), inventory)
            .await?;
        for path in &duplicates {
            debug!(%path, "deleting duplicate of an already-known file");
            node.delete(path).await?;
        }
        if !duplicates.is_empty() {
            node.prune_empty_directories().await?;
        }

        Ok(StorageServer { node, storage_skeleton, command_skeleton, storage_stub, command_stub })
    }

    /// The stub other hosts read and write this server's files through.
    pub fn storage_stub(&self) -> StorageStub {
        self.storage_stub.clone()
    }

    /// The stub the naming server controls this server through.
    pub fn command_stub(&self) -> CommandStub {
        self.command_stub.clone()
    }

    /// The local directory this server serves files from.
    pub fn root(&self) -> &std::path::Path {
        &self.node.root
    }

    /// Stops both skeletons. In-flight calls run to completion.
    pub async fn stop(self) {
        self.storage_skeleton.stop().await;
        self.command_skeleton.stop().await;
    }
}

/// The shared state behind both skeletons of one storage server.
struct StorageNode {
    root: PathBuf,
    io_gate: Mutex<()>,
}

impl StorageNode {
    /// The local location of `path` under this server's root.
    fn resolve(&self, path: &Path) -> PathBuf {
        let mut full = self.root.clone();
        for component in path.components() {
            full.push(component);
        }
        full
    }

    /// Every regular file under the root, as paths relative to it.
    async fn inventory(&self) -> Result<Vec<Path>, DfsError> {
        let mut files = Vec::new();
        let mut pending = vec![(self.root.clone(), Path::root())];
        while let Some((dir, at)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Ok(name) = entry.file_name().into_string() else {
                    warn!(parent = %at, "skipping entry with a non-UTF-8 name");
                    continue;
                };
                let Ok(child) = at.child(&name) else {
                    warn!(parent = %at, name, "skipping entry with a reserved character in its name");
                    continue;
                };
                let kind = entry.file_type().await?;
                if kind.is_dir() {
                    pending.push((entry.path(), child));
                } else if kind.is_file() {
                    files.push(child);
                }
            }
        }
        Ok(files)
    }

    /// Removes directories emptied by duplicate deletion, deepest first.
    async fn prune_empty_directories(&self) -> Result<(), DfsError> {
        let mut directories = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                }
            }
            if dir != self.root {
                directories.push(dir);
            }
        }
        directories.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in directories {
            let mut entries = fs::read_dir(&dir).await?;
            if entries.next_entry().await?.is_none() {
                fs::remove_dir(&dir).await?;
            }
        }
        Ok(())
    }

    /// Resolves `path` to an existing regular file.
    async fn regular_file(&self, path: &Path) -> Result<(PathBuf, u64), DfsError> {
        let full = self.resolve(path);
        match fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok((full, meta.len())),
            _ => Err(DfsError::NotFound(path.clone())),
        }
    }
}

#[async_trait]
impl Storage for StorageNode {
    async fn size(&self, path: &Path) -> Result<u64, DfsError> {
        let _io = self.io_gate.lock().await;
        let (_, size) = self.regular_file(path).await?;
        Ok(size)
    }

    async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, DfsError> {
        let _io = self.io_gate.lock().await;
        let (full, size) = self.regular_file(path).await?;
        let end = offset
            .checked_add(length as u64)
            .ok_or_else(|| DfsError::OutOfBounds(format!("range at {offset} overflows")))?;
        if end > size {
            return Err(DfsError::OutOfBounds(format!(
                "read of {length} bytes at {offset} past length {size}"
            )));
        }
        let mut file = File::open(full).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data).await?;
        Ok(data)
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), DfsError> {
        let _io = self.io_gate.lock().await;
        let (full, _) = self.regular_file(path).await?;
        let mut file = OpenOptions::new().write(true).open(full).await?;
        // Seeking past the end is allowed; the write extends the file.
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Command for StorageNode {
    async fn create(&self, path: &Path) -> Result<bool, DfsError> {
        if path.is_root() {
            return Ok(false);
        }
        let _io = self.io_gate.lock().await;
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&full).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        if path.is_root() {
            return Ok(false);
        }
        let _io = self.io_gate.lock().await;
        let full = self.resolve(path);
        match fs::metadata(&full).await {
            Err(_) => Ok(false),
            Ok(meta) if meta.is_dir() => {
                fs::remove_dir_all(&full).await?;
                Ok(true)
            }
            Ok(_) => {
                fs::remove_file(&full).await?;
                Ok(true)
            }
        }
    }

    async fn copy(&self, path: &Path, source: &StorageStub) -> Result<bool, DfsError> {
        if path.is_root() {
            return Ok(false);
        }
        let total = source.size(path).await?;
        self.delete(path).await?;
        self.create(path).await?;
        let mut offset = 0u64;
        while offset < total {
            let length = (total - offset).min(COPY_CHUNK as u64) as u32;
            let data = source.read(path, offset, length).await?;
            self.write(path, offset, &data).await?;
            offset += length as u64;
        }
        Ok(true)
    }
}
