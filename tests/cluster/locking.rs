use std::time::Duration;

use dfs_marmot::{DfsError, Service as _, ServiceStub};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use super::common::{path, Cluster};

#[tokio::test]
async fn waiting_writer_beats_later_readers() {
    let cluster = Cluster::start(1).await;
    let file = path("/f");
    assert!(cluster.service.create_file(&file).await.expect("create file"));

    // R1 holds the file shared.
    cluster.service.lock(&file, false).await.expect("first reader locks");

    let (events, mut order) = mpsc::unbounded_channel();

    let writer_service = ServiceStub::new(cluster.naming.service_addr());
    let writer_events = events.clone();
    let writer_file = file.clone();
    let writer = tokio::spawn(async move {
        writer_service.lock(&writer_file, true).await.expect("writer locks");
        writer_events.send("writer").expect("record writer");
        writer_service.unlock(&writer_file, true).await.expect("writer unlocks");
    });
    sleep(Duration::from_millis(200)).await;

    // R2 arrives while the writer is still waiting on R1.
    let reader_service = ServiceStub::new(cluster.naming.service_addr());
    let reader_events = events.clone();
    let reader_file = file.clone();
    let reader = tokio::spawn(async move {
        reader_service.lock(&reader_file, false).await.expect("second reader locks");
        reader_events.send("reader").expect("record reader");
        reader_service.unlock(&reader_file, false).await.expect("second reader unlocks");
    });
    sleep(Duration::from_millis(200)).await;

    cluster.service.unlock(&file, false).await.expect("first reader unlocks");
    timeout(Duration::from_secs(10), writer).await.expect("writer finishes").expect("writer task");
    timeout(Duration::from_secs(10), reader).await.expect("reader finishes").expect("reader task");

    assert_eq!(order.recv().await, Some("writer"));
    assert_eq!(order.recv().await, Some("reader"));
}

#[tokio::test]
async fn shared_locks_coexist() {
    let cluster = Cluster::start(1).await;
    let file = path("/shared.txt");
    assert!(cluster.service.create_file(&file).await.expect("create file"));

    cluster.service.lock(&file, false).await.expect("first shared lock");
    // A second shared holder is admitted without waiting for the first.
    timeout(Duration::from_secs(5), cluster.service.lock(&file, false))
        .await
        .expect("second shared lock is not blocked")
        .expect("second shared lock succeeds");

    cluster.service.unlock(&file, false).await.expect("first unlock");
    cluster.service.unlock(&file, false).await.expect("second unlock");
    assert!(matches!(cluster.service.unlock(&file, false).await, Err(DfsError::IllegalArgument(_))));
}

#[tokio::test]
async fn descendant_lock_holds_ancestors_shared() {
    let cluster = Cluster::start(1).await;
    assert!(cluster.service.create_directory(&path("/d")).await.expect("create dir"));
    assert!(cluster.service.create_file(&path("/d/f")).await.expect("create file"));

    cluster.service.lock(&path("/d/f"), false).await.expect("lock the file shared");

    // The ancestor is read-held, so another shared lock on it proceeds...
    timeout(Duration::from_secs(5), cluster.service.lock(&path("/d"), false))
        .await
        .expect("shared ancestor lock is not blocked")
        .expect("shared ancestor lock succeeds");
    cluster.service.unlock(&path("/d"), false).await.expect("unlock shared ancestor");

    // ...while an exclusive lock on it cannot be granted. The attempt is
    // abandoned with the connection; this cluster is not reused after it.
    let blocked = timeout(Duration::from_millis(300), cluster.service.lock(&path("/d"), true)).await;
    assert!(blocked.is_err(), "exclusive ancestor lock must wait for the descendant reader");
}

#[tokio::test]
async fn exclusive_lock_excludes_readers_until_unlock() {
    let cluster = Cluster::start(1).await;
    let file = path("/x.bin");
    assert!(cluster.service.create_file(&file).await.expect("create file"));

    cluster.service.lock(&file, true).await.expect("writer locks");

    let reader_service = ServiceStub::new(cluster.naming.service_addr());
    let reader_file = file.clone();
    let reader = tokio::spawn(async move {
        reader_service.lock(&reader_file, false).await.expect("reader locks");
        reader_service.unlock(&reader_file, false).await.expect("reader unlocks");
    });
    sleep(Duration::from_millis(200)).await;
    assert!(!reader.is_finished(), "reader must wait out the exclusive hold");

    cluster.service.unlock(&file, true).await.expect("writer unlocks");
    timeout(Duration::from_secs(10), reader).await.expect("reader finishes").expect("reader task");
}

#[tokio::test]
async fn ascending_multi_path_locking_does_not_deadlock() {
    let cluster = Cluster::start(1).await;
    assert!(cluster.service.create_file(&path("/x")).await.expect("create /x"));
    assert!(cluster.service.create_directory(&path("/y")).await.expect("create /y"));
    assert!(cluster.service.create_file(&path("/y/z")).await.expect("create /y/z"));

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let service = ServiceStub::new(cluster.naming.service_addr());
        tasks.push(tokio::spawn(async move {
            // Both tasks take the same two paths in ascending order.
            service.lock(&path("/x"), true).await.expect("lock /x");
            service.lock(&path("/y/z"), true).await.expect("lock /y/z");
            service.unlock(&path("/y/z"), true).await.expect("unlock /y/z");
            service.unlock(&path("/x"), true).await.expect("unlock /x");
        }));
    }
    for task in tasks {
        timeout(Duration::from_secs(10), task).await.expect("no deadlock").expect("task succeeds");
    }
}

#[tokio::test]
async fn unlock_validates_its_arguments() {
    let cluster = Cluster::start(1).await;
    let file = path("/v");
    assert!(cluster.service.create_file(&file).await.expect("create file"));

    // Unlocking a node that was never locked, or in the wrong mode, is an
    // argument error; locking a missing node is a lookup error.
    assert!(matches!(cluster.service.unlock(&file, false).await, Err(DfsError::IllegalArgument(_))));
    assert!(matches!(cluster.service.unlock(&path("/ghost"), true).await, Err(DfsError::IllegalArgument(_))));
    assert!(matches!(cluster.service.lock(&path("/ghost"), false).await, Err(DfsError::NotFound(_))));

    cluster.service.lock(&file, false).await.expect("shared lock");
    assert!(matches!(cluster.service.unlock(&file, true).await, Err(DfsError::IllegalArgument(_))));
    cluster.service.unlock(&file, false).await.expect("shared unlock");
}
