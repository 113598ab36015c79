use dfs_marmot::wire::{decode, encode, frame};
use dfs_marmot::{Command as _, DfsError, Service as _, Storage as _};
use tokio::net::TcpStream;

use super::common::{path, Cluster};

#[tokio::test]
async fn size_and_read_enforce_bounds() {
    let mut cluster = Cluster::start(0).await;
    cluster.add_storage(&[("data.bin", b"abcdef")]).await;
    let file = path("/data.bin");
    let storage = cluster.service.get_storage(&file).await.expect("file is known");

    assert_eq!(storage.size(&file).await.expect("size succeeds"), 6);
    assert_eq!(storage.read(&file, 0, 6).await.expect("full read"), b"abcdef");
    assert_eq!(storage.read(&file, 2, 3).await.expect("inner read"), b"cde");
    assert_eq!(storage.read(&file, 6, 0).await.expect("empty read at end"), b"");

    assert!(matches!(storage.read(&file, 0, 7).await, Err(DfsError::OutOfBounds(_))));
    assert!(matches!(storage.read(&file, 6, 1).await, Err(DfsError::OutOfBounds(_))));
    assert!(matches!(storage.read(&file, u64::MAX, 1).await, Err(DfsError::OutOfBounds(_))));
}

#[tokio::test]
async fn size_requires_a_regular_file() {
    let mut cluster = Cluster::start(0).await;
    cluster.add_storage(&[("docs/readme.txt", b"hello")]).await;
    let storage = cluster.storages[0].server.storage_stub();

    assert!(matches!(storage.size(&path("/missing")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(storage.size(&path("/docs")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(storage.read(&path("/docs"), 0, 1).await, Err(DfsError::NotFound(_))));
}

#[tokio::test]
async fn write_roundtrips_and_extends() {
    let cluster = Cluster::start(1).await;
    let file = path("/w.txt");
    assert!(cluster.service.create_file(&file).await.expect("create file"));
    let storage = cluster.service.get_storage(&file).await.expect("file is known");

    storage.write(&file, 0, b"hello").await.expect("write at start");
    assert_eq!(storage.read(&file, 0, 5).await.expect("read back"), b"hello");

    // Writing past the end extends the file; the gap reads back as zeros.
    storage.write(&file, 8, b"abc").await.expect("write past end");
    assert_eq!(storage.size(&file).await.expect("size after extend"), 11);
    assert_eq!(storage.read(&file, 8, 3).await.expect("read extension"), b"abc");
    assert_eq!(storage.read(&file, 5, 3).await.expect("read gap"), [0, 0, 0]);

    assert!(matches!(storage.write(&path("/absent"), 0, b"x").await, Err(DfsError::NotFound(_))));
}

#[tokio::test]
async fn absent_write_payload_is_rejected() {
    let cluster = Cluster::start(1).await;
    let file = path("/n.txt");
    assert!(cluster.service.create_file(&file).await.expect("create file"));
    let addr = cluster.storages[0].server.storage_stub().addr();

    // A hand-built write call whose byte payload is flagged absent:
    // interface 3 (storage), method 3 (write), path, offset, option none.
    let mut body = Vec::new();
    encode::u32(&mut body, 3).unwrap();
    encode::u32(&mut body, 3).unwrap();
    encode::path(&mut body, &file).unwrap();
    encode::u64(&mut body, 0).unwrap();
    encode::bool(&mut body, false).unwrap();

    let mut socket = TcpStream::connect(addr).await.expect("connect");
    frame::write(&mut socket, &body).await.expect("send call");
    let reply = frame::read(&mut socket).await.expect("read reply");

    let mut src = std::io::Cursor::new(&reply[..]);
    assert_eq!(decode::u32(&mut src).expect("status"), 1);
    assert_eq!(decode::error(&mut src).expect("fault"), DfsError::NullArgument);
}

#[tokio::test]
async fn create_and_delete_follow_the_contract() {
    let cluster = Cluster::start(1).await;
    let command = cluster.storages[0].server.command_stub();
    let file = path("/fresh/file.txt");

    assert!(command.create(&file).await.expect("first create"));
    assert!(!command.create(&file).await.expect("second create"));
    assert!(!command.create(&path("/")).await.expect("create root"));
    assert!(cluster.storages[0].holds(&file));

    assert!(command.delete(&file).await.expect("delete file"));
    assert!(!command.delete(&file).await.expect("delete again"));
    assert!(!command.delete(&path("/")).await.expect("delete root"));
    assert!(!cluster.storages[0].holds(&file));

    // Deleting a directory removes its contents recursively.
    assert!(command.create(&path("/tree/a.txt")).await.expect("create a"));
    assert!(command.create(&path("/tree/sub/b.txt")).await.expect("create b"));
    assert!(command.delete(&path("/tree")).await.expect("delete tree"));
    assert!(!cluster.storages[0].local(&path("/tree")).exists());
}

#[tokio::test]
async fn copy_installs_an_identical_replica() {
    let mut cluster = Cluster::start(0).await;
    cluster.add_storage(&[("big.bin", &[7u8; 1024][..])]).await;
    cluster.add_storage(&[]).await;
    let file = path("/big.bin");
    let source = cluster.storages[0].server.storage_stub();
    let target = cluster.storages[1].server.command_stub();

    assert!(target.copy(&file, &source).await.expect("copy succeeds"));
    assert_eq!(std::fs::read(cluster.storages[1].local(&file)).expect("read replica"), vec![7u8; 1024]);

    // A second copy replaces whatever the target already holds.
    std::fs::write(cluster.storages[1].local(&file), b"stale").expect("scribble on replica");
    assert!(target.copy(&file, &source).await.expect("copy again"));
    assert_eq!(std::fs::read(cluster.storages[1].local(&file)).expect("read replica"), vec![7u8; 1024]);

    assert!(matches!(target.copy(&path("/nowhere"), &source).await, Err(DfsError::NotFound(_))));
}
