use dfs_marmot::{
    CommandStub, DfsError, Registration as _, RegistrationStub, Service as _, ServiceStub, StorageStub,
};

use super::common::{path, Cluster};

#[tokio::test]
async fn registration_reconciles_duplicates() {
    let mut cluster = Cluster::start(0).await;
    cluster.add_storage(&[("a", b"first")]).await;
    // The second server announces /a (already known) and /b/c (new).
    cluster.add_storage(&[("a", b"second"), ("b/c", b"nested")]).await;

    // The duplicate was deleted locally during start-up; the new file and
    // its lazily created parent entered the tree.
    assert!(!cluster.storages[1].holds(&path("/a")));
    assert!(cluster.storages[1].holds(&path("/b/c")));
    assert!(cluster.service.is_directory(&path("/b")).await.expect("parent exists"));
    assert!(!cluster.service.is_directory(&path("/b/c")).await.expect("file exists"));

    // /a still serves the first server's contents.
    let storage = cluster.service.get_storage(&path("/a")).await.expect("file is known");
    assert_eq!(cluster.host_of(&storage), 0);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let cluster = Cluster::start(1).await;
    let registration = RegistrationStub::new(cluster.naming.registration_addr());
    let storage = cluster.storages[0].server.storage_stub();
    let command = cluster.storages[0].server.command_stub();

    let result = registration.register(storage, command, Vec::new()).await;
    assert!(matches!(result, Err(DfsError::IllegalState(_))));
}

#[tokio::test]
async fn create_file_follows_the_contract() {
    let cluster = Cluster::start(1).await;
    let file = path("/d/f.txt");

    assert!(cluster.service.create_directory(&path("/d")).await.expect("create dir"));
    assert!(cluster.service.create_file(&file).await.expect("first create"));
    assert!(!cluster.service.create_file(&file).await.expect("second create"));
    assert!(!cluster.service.create_file(&path("/")).await.expect("create root"));
    assert!(cluster.storages[0].holds(&file));

    // A deleted path can be created again.
    assert!(cluster.service.delete(&file).await.expect("delete file"));
    assert!(!cluster.storages[0].holds(&file));
    assert!(cluster.service.create_file(&file).await.expect("create after delete"));

    // The parent must be an existing directory.
    assert!(matches!(cluster.service.create_file(&path("/missing/x")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(cluster.service.create_file(&file.child("y").unwrap()).await, Err(DfsError::NotFound(_))));
}

#[tokio::test]
async fn create_file_without_storage_servers_fails() {
    let cluster = Cluster::start(0).await;
    let result = cluster.service.create_file(&path("/orphan")).await;
    assert!(matches!(result, Err(DfsError::IllegalState(_))));
}

#[tokio::test]
async fn directories_list_their_children() {
    let cluster = Cluster::start(1).await;
    assert!(cluster.service.create_directory(&path("/etc")).await.expect("create /etc"));
    assert!(cluster.service.create_directory(&path("/etc/dfs")).await.expect("create /etc/dfs"));
    assert!(cluster.service.create_file(&path("/etc/passwd")).await.expect("create file"));
    assert!(!cluster.service.create_directory(&path("/etc")).await.expect("recreate /etc"));

    let mut names = cluster.service.list(&path("/etc")).await.expect("list /etc");
    names.sort();
    assert_eq!(names, ["dfs", "passwd"]);
    assert_eq!(cluster.service.list(&path("/")).await.expect("list root"), ["etc"]);

    assert!(cluster.service.is_directory(&path("/")).await.expect("root is a directory"));
    assert!(matches!(cluster.service.list(&path("/etc/passwd")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(cluster.service.list(&path("/nope")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(cluster.service.is_directory(&path("/nope")).await, Err(DfsError::NotFound(_))));
}

#[tokio::test]
async fn deleting_a_directory_drops_bytes_everywhere() {
    let mut cluster = Cluster::start(0).await;
    cluster.add_storage(&[("docs/one.txt", b"1")]).await;
    cluster.add_storage(&[("docs/two.txt", b"2")]).await;

    assert!(cluster.service.delete(&path("/docs")).await.expect("delete directory"));
    assert!(!cluster.storages[0].local(&path("/docs")).exists());
    assert!(!cluster.storages[1].local(&path("/docs")).exists());
    assert!(cluster.service.list(&path("/")).await.expect("list root").is_empty());
    assert!(matches!(cluster.service.delete(&path("/docs")).await, Err(DfsError::NotFound(_))));
    assert!(!cluster.service.delete(&path("/")).await.expect("delete root"));
}

#[tokio::test]
async fn get_storage_requires_a_file() {
    let cluster = Cluster::start(1).await;
    assert!(cluster.service.create_directory(&path("/d")).await.expect("create dir"));
    assert!(matches!(cluster.service.get_storage(&path("/d")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(cluster.service.get_storage(&path("/ghost")).await, Err(DfsError::NotFound(_))));
}

#[test]
fn stubs_compare_by_address() {
    let one = "127.0.0.1:9000".parse().unwrap();
    let two = "127.0.0.1:9001".parse().unwrap();

    assert_eq!(ServiceStub::new(one), ServiceStub::new(one));
    assert_ne!(ServiceStub::new(one), ServiceStub::new(two));
    assert_eq!(StorageStub::new(one), StorageStub::new(one));
    assert_ne!(StorageStub::new(one), StorageStub::new(two));
    assert_eq!(CommandStub::new(two), CommandStub::new(two));
}

#[tokio::test]
async fn calls_against_a_dead_endpoint_report_remote_failure() {
    let Cluster { naming, .. } = Cluster::start(0).await;
    let service_addr = naming.service_addr();
    naming.stop().await;

    let service = ServiceStub::new(service_addr);
    assert!(matches!(service.is_directory(&path("/")).await, Err(DfsError::Remote(_))));
}
