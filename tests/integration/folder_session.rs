//! Folder sessions over the local filesystem store

use fragsync::config::FragsyncConfig;
use fragsync::{FolderSession, FragmentDocument, LocalItemStore};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(temp_dir: &TempDir) -> Arc<LocalItemStore> {
    Arc::new(LocalItemStore::new(temp_dir.path()).unwrap())
}

#[tokio::test]
async fn test_reconcile_writes_fragment_to_disk() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("b.txt"), "b").unwrap();
    fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
    fs::create_dir(temp_dir.path().join("photos")).unwrap();

    let config = FragsyncConfig::default();
    let mut session = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    let report = session.reconcile().await.unwrap();
    assert_eq!(report.added.len(), 3);

    let text = fs::read_to_string(temp_dir.path().join(".fragment.xml")).unwrap();
    let doc = FragmentDocument::from_text(&text).unwrap();
    let names: Vec<&str> = doc
        .associations()
        .iter()
        .filter_map(|record| record.local_item())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "photos"]);
}

#[tokio::test]
async fn test_reopen_sees_saved_state() {
    let temp_dir = TempDir::new().unwrap();
    let config = FragsyncConfig::default();

    let mut session = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    let guid = session.create_item("Notes", "notes.md", false).await.unwrap();
    assert!(temp_dir.path().join("notes.md").is_file());
    session.save().await.unwrap();

    let reopened = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    assert_eq!(reopened.document().list_associations(), vec![guid]);

    // Deleting on disk and reconciling drops the association
    fs::remove_file(temp_dir.path().join("notes.md")).unwrap();
    let mut reopened = reopened;
    reopened.reconcile().await.unwrap();
    assert!(reopened.document().list_associations().is_empty());
}

#[tokio::test]
async fn test_grouping_items_nest_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let config = FragsyncConfig::default();

    let mut root = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    let photos = root.create_item("Photos", "photos", true).await.unwrap();
    assert!(temp_dir.path().join("photos").is_dir());
    assert_eq!(
        root.child_fragment_path(photos).unwrap().as_deref(),
        Some("photos/.fragment.xml")
    );

    let mut child = root.open_child(photos, &config).await.unwrap();
    assert_eq!(child.folder(), "photos");
    child.create_item("Beach", "beach.jpg", false).await.unwrap();
    let report = child.reconcile().await.unwrap();
    assert_eq!(report.persisted_to, "photos/.fragment.xml");
    assert!(temp_dir.path().join("photos").join(".fragment.xml").is_file());

    root.remove_item(photos).await.unwrap();
    assert!(!temp_dir.path().join("photos").exists());
    assert!(root.document().list_associations().is_empty());
}

#[tokio::test]
async fn test_corrupt_fragment_is_a_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".fragment.xml"), "<not-closed").unwrap();

    let result = FolderSession::open(open_store(&temp_dir), "", &FragsyncConfig::default()).await;
    assert!(matches!(result, Err(fragsync::FragmentError::Parse(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_backslash_file_names_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("report\\2024.txt"), "r").unwrap();
    let config = FragsyncConfig::default();

    let mut session = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    assert_eq!(session.reconcile().await.unwrap().added.len(), 1);
    assert!(session.reconcile().await.unwrap().is_noop());

    let guid = session.create_item("Q3", "q3\\draft.md", false).await.unwrap();
    assert!(temp_dir.path().join("q3\\draft.md").is_file());
    session.remove_item(guid).await.unwrap();
    assert!(!temp_dir.path().join("q3\\draft.md").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_names_do_not_break_reconciliation() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "c").unwrap();
    fs::write(temp_dir.path().join("tea.txt"), "t").unwrap();
    let config = FragsyncConfig::default();

    let mut session = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    let first = session.reconcile().await.unwrap();
    assert_eq!(first.added.len(), 1);
    assert_eq!(first.added[0].name, "tea.txt");
    assert!(session.reconcile().await.unwrap().is_noop());
}

#[tokio::test]
async fn test_interrupted_write_leftovers_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("notes.md"), "n").unwrap();
    fs::write(
        temp_dir.path().join(fragsync::store::staging_name(".fragment.xml")),
        "<frag",
    )
    .unwrap();
    fs::write(
        temp_dir.path().join(fragsync::store::staging_name("notes.md")),
        "partial",
    )
    .unwrap();
    let config = FragsyncConfig::default();

    let mut session = FolderSession::open(open_store(&temp_dir), "", &config)
        .await
        .unwrap();
    let report = session.reconcile().await.unwrap();
    let names: Vec<&str> = report.added.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["notes.md"]);
    assert!(session.reconcile().await.unwrap().is_noop());
}
