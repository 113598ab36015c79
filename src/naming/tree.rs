//! The directory tree and per-file replica bookkeeping.
//!
//! Structural state lives behind one short mutex; every operation here is
//! synchronous and returns before any network traffic happens. The
//! logical reader/writer lock state is kept separately in
//! [`crate::naming::locks`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::DfsError;
use crate::path::Path;

/// Index of a storage server in the naming server's append-only registry.
pub(crate) type ServerId = usize;

/// The request counter is sampled into the coarse counter once every this
/// many shared locks of a file.
pub(crate) const REPLICA_GRANULARITY: u64 = 20;

/// Scale factor from the coarse counter to the desired replica count.
pub(crate) const ALPHA: f64 = 0.2;

/// Upper bound on the size of any file's replica set.
pub(crate) const REPLICA_UPPER_BOUND: usize = 3;

/// What a resolved path names.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    File,
    Directory,
}

/// A replication decision: the file currently has replicas on `have` and
/// the read pressure calls for `want` of them.
pub(crate) struct CopyPlan {
    pub have: Vec<ServerId>,
    pub want: usize,
}

/// The rooted directory tree. The root directory always exists.
pub(crate) struct Tree {
    root: Mutex<Node>,
}

enum Node {
    Directory(BTreeMap<String, Node>),
    File(FileMeta),
}

struct FileMeta {
    /// Storage servers holding a replica, registration-time server first.
    replicas: Vec<ServerId>,
    /// The server chosen by the most recent `get_storage`; the survivor
    /// of write invalidation.
    primary: ServerId,
    requests: u64,
    coarse: u64,
}

impl FileMeta {
    fn new(server: ServerId) -> FileMeta {
        FileMeta { replicas: vec![server], primary: server, requests: 0, coarse: 0 }
    }
}

impl Tree {
    pub(crate) fn new() -> Tree {
        Tree { root: Mutex::new(Node::Directory(BTreeMap::new())) }
    }

    fn locked(&self) -> MutexGuard<'_, Node> {
        self.root.lock().expect("tree mutex poisoned")
    }

    /// What `path` names right now, if anything.
    pub(crate) fn kind(&self, path: &Path) -> Option<NodeKind> {
        let root = self.locked();
        resolve(&root, path).map(|node| match node {
            Node::Directory(_) => NodeKind::Directory,
            Node::File(_) => NodeKind::File,
        })
    }

    /// Reports whether `path` names a directory.
    pub(crate) fn is_directory(&self, path: &Path) -> Result<bool, DfsError> {
        self.kind(path).map(|kind| kind == NodeKind::Directory).ok_or_else(|| DfsError::NotFound(path.clone()))
    }

    /// The child names of an existing directory.
    pub(crate) fn list(&self, path: &Path) -> Result<Vec<String>, DfsError> {
        let root = self.locked();
        match resolve(&root, path) {
            Some(Node::Directory(children)) => Ok(children.keys().cloned().collect()),
            _ => Err(DfsError::NotFound(path.clone())),
        }
    }

    /// Adds a file node under an existing parent directory. `false` if the
    /// path already exists; `NotFound` names the parent if it is missing
    /// or a file.
    pub(crate) fn insert_file(&self, path: &Path, server: ServerId) -> Result<bool, DfsError> {
        self.insert(path, Node::File(FileMeta::new(server)))
    }

    /// Adds an empty directory node under an existing parent directory.
    pub(crate) fn insert_directory(&self, path: &Path) -> Result<bool, DfsError> {
        self.insert(path, Node::Directory(BTreeMap::new()))
    }

    fn insert(&self, path: &Path, node: Node) -> Result<bool, DfsError> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        let Some(name) = path.last() else {
            return Ok(false);
        };
        let mut root = self.locked();
        match resolve_mut(&mut root, &parent) {
            Some(Node::Directory(children)) => {
                if children.contains_key(name) {
                    return Ok(false);
                }
                children.insert(name.to_owned(), node);
                Ok(true)
            }
            _ => Err(DfsError::NotFound(parent)),
        }
    }

    /// Absorbs a registered path as a file node, creating missing ancestor
    /// directories. `false` if any node already occupies the path or an
    /// ancestor of it exists as a file.
    pub(crate) fn absorb(&self, path: &Path, server: ServerId) -> bool {
        let Some((name, ancestors)) = path.components().split_last() else {
            return false;
        };
        let mut root = self.locked();
        let mut current = &mut *root;
        for component in ancestors {
            match current {
                Node::Directory(children) => {
                    current = children
                        .entry(component.clone())
                        .or_insert_with(|| Node::Directory(BTreeMap::new()));
                }
                Node::File(_) => return false,
            }
        }
        match current {
            Node::Directory(children) => {
                if children.contains_key(name) {
                    return false;
                }
                children.insert(name.clone(), Node::File(FileMeta::new(server)));
                true
            }
            Node::File(_) => false,
        }
    }

    /// Removes an existing non-root node and its subtree.
    pub(crate) fn remove(&self, path: &Path) -> Result<(), DfsError> {
        let Some(parent) = path.parent() else {
            return Err(DfsError::IllegalArgument("cannot remove the root".to_owned()));
        };
        let Some(name) = path.last() else {
            return Err(DfsError::IllegalArgument("cannot remove the root".to_owned()));
        };
        let mut root = self.locked();
        match resolve_mut(&mut root, &parent) {
            Some(Node::Directory(children)) if children.contains_key(name) => {
                children.remove(name);
                Ok(())
            }
            _ => Err(DfsError::NotFound(path.clone())),
        }
    }

    /// The replica set of an existing file.
    pub(crate) fn replicas(&self, path: &Path) -> Result<Vec<ServerId>, DfsError> {
        self.with_file(path, |meta| meta.replicas.clone())
    }

    /// The primary replica and the full replica set of an existing file.
    pub(crate) fn primary_and_replicas(&self, path: &Path) -> Result<(ServerId, Vec<ServerId>), DfsError> {
        self.with_file(path, |meta| (meta.primary, meta.replicas.clone()))
    }

    /// Records the replica chosen by `get_storage`.
    pub(crate) fn set_primary(&self, path: &Path, server: ServerId) -> Result<(), DfsError> {
        self.with_file(path, |meta| meta.primary = server)
    }

    /// Appends a freshly installed replica.
    pub(crate) fn add_replica(&self, path: &Path, server: ServerId) -> Result<(), DfsError> {
        self.with_file(path, |meta| {
            if !meta.replicas.contains(&server) {
                meta.replicas.push(server);
            }
        })
    }

    /// Shrinks the replica set to the invalidation survivor.
    pub(crate) fn retain_only(&self, path: &Path, server: ServerId) -> Result<(), DfsError> {
        self.with_file(path, |meta| {
            meta.replicas.retain(|id| *id == server);
            if meta.replicas.is_empty() {
                meta.replicas.push(server);
            }
            meta.primary = server;
        })
    }

    /// Counts one shared lock of a file and reports whether read pressure
    /// calls for more replicas.
    pub(crate) fn bump_read(&self, path: &Path) -> Result<Option<CopyPlan>, DfsError> {
        self.with_file(path, |meta| {
            meta.requests += 1;
            if meta.requests % REPLICA_GRANULARITY == 0 {
                meta.coarse = meta.requests;
            }
            let want = ((ALPHA * meta.coarse as f64).floor() as usize).min(REPLICA_UPPER_BOUND);
            if want > meta.replicas.len() {
                Some(CopyPlan { have: meta.replicas.clone(), want })
            } else {
                None
            }
        })
    }

    fn with_file<T>(&self, path: &Path, cont: impl FnOnce(&mut FileMeta) -> T) -> Result<T, DfsError> {
        let mut root = self.locked();
        match resolve_mut(&mut root, path) {
            Some(Node::File(meta)) => Ok(cont(meta)),
            _ => Err(DfsError::NotFound(path.clone())),
        }
    }
}

fn resolve<'t>(root: &'t Node, path: &Path) -> Option<&'t Node> {
    let mut current = root;
    for component in path.components() {
        match current {
            Node::Directory(children) => current = children.get(component)?,
            Node::File(_) => return None,
        }
    }
    Some(current)
}

fn resolve_mut<'t>(root: &'t mut Node, path: &Path) -> Option<&'t mut Node> {
    let mut current = root;
    for component in path.components() {
        match current {
            Node::Directory(children) => current = children.get_mut(component)?,
            Node::File(_) => return None,
        }
    }
    Some(current)
}
