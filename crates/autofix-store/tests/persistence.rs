//! Filesystem backends across store instances

use autofix_artifact::{ExecutionAttempt, Filename, ProjectName};
use autofix_store::{HistorySearch, StorageConfig};
use pretty_assertions::assert_eq;

fn demo() -> (ProjectName, Filename) {
    (
        ProjectName::new("demo").unwrap(),
        Filename::new("main.py").unwrap(),
    )
}

#[tokio::test]
async fn snapshots_persist_and_keep_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::filesystem(dir.path());
    let (project, filename) = demo();

    let first = config
        .version_store()
        .put(&project, &filename, "print(1)")
        .await
        .unwrap();

    // A fresh instance must not reuse a key the previous one handed out
    let store = config.version_store();
    let second = store.put(&project, &filename, "print(2)").await.unwrap();
    assert!(first < second);

    let listed = store.list(&project).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(store.get(&first).await.unwrap(), "print(1)");
    assert_eq!(store.get(&second).await.unwrap(), "print(2)");
}

#[tokio::test]
async fn history_persists_and_keeps_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::filesystem(dir.path());
    let (project, filename) = demo();

    let first = config
        .history_ledger()
        .append(ExecutionAttempt::new(project.clone(), filename.clone(), "one", "print(1)"))
        .await
        .unwrap();

    let ledger = config.history_ledger();
    let second = ledger
        .append(ExecutionAttempt::new(project.clone(), filename.clone(), "two", "print(2)"))
        .await
        .unwrap();
    assert!(first.timestamp < second.timestamp);

    let all = ledger.search(&project, &HistorySearch::new()).await.unwrap();
    assert_eq!(all, vec![first, second.clone()]);
    assert_eq!(ledger.latest(&project).await.unwrap(), Some(second));
}

#[tokio::test]
async fn memory_backend_is_per_instance() {
    let config = StorageConfig::memory();
    let (project, filename) = demo();

    config
        .version_store()
        .put(&project, &filename, "x")
        .await
        .unwrap();

    assert!(config.version_store().list(&project).await.unwrap().is_empty());
}
