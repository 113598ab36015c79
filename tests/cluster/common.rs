use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use dfs_marmot::{NamingServer, Path, ServiceStub, StorageServer};
use tempfile::TempDir;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn ephemeral() -> SocketAddr {
    SocketAddr::new(LOOPBACK, 0)
}

/// An in-process naming server plus any number of storage servers, each
/// rooted in its own temporary directory, wired over ephemeral loopback
/// ports.
pub struct Cluster {
    pub naming: NamingServer,
    pub service: ServiceStub,
    pub storages: Vec<StorageHost>,
}

pub struct StorageHost {
    pub tempdir: TempDir,
    pub server: StorageServer,
}

impl StorageHost {
    /// The local location of `path` inside this host's root.
    pub fn local(&self, path: &Path) -> PathBuf {
        let mut full = self.tempdir.path().to_path_buf();
        for component in path.components() {
            full.push(component);
        }
        full
    }

    pub fn holds(&self, path: &Path) -> bool {
        self.local(path).is_file()
    }
}

impl Cluster {
    pub async fn start(storage_count: usize) -> Cluster {
        let naming = NamingServer::start(ephemeral(), ephemeral()).await.expect("start naming server");
        let service = ServiceStub::new(naming.service_addr());
        let mut cluster = Cluster { naming, service, storages: Vec::new() };
        for _ in 0..storage_count {
            cluster.add_storage(&[]).await;
        }
        cluster
    }

    /// Starts one more storage server, its root pre-seeded with `files`
    /// (root-relative path, contents) before it registers.
    pub async fn add_storage(&mut self, files: &[(&str, &[u8])]) -> usize {
        let tempdir = TempDir::new().expect("create temp dir");
        for (at, contents) in files {
            let full = tempdir.path().join(at);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("create seeded dirs");
            }
            std::fs::write(full, contents).expect("write seeded file");
        }
        let server = StorageServer::start(
            tempdir.path().to_path_buf(),
            ephemeral(),
            ephemeral(),
            LOOPBACK,
            self.naming.registration_addr(),
        )
        .await
        .expect("start storage server");
        self.storages.push(StorageHost { tempdir, server });
        self.storages.len() - 1
    }

    /// The index of the host a storage stub points at.
    pub fn host_of(&self, stub: &dfs_marmot::StorageStub) -> usize {
        self.storages
            .iter()
            .position(|host| host.server.storage_stub() == *stub)
            .expect("stub belongs to a known host")
    }
}

pub fn path(text: &str) -> Path {
    Path::from_str(text).expect("parse path")
}
