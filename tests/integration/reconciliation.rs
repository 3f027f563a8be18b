//! Reconciliation engine scenarios against the in-memory store

use fragsync::config::SyncConfig;
use fragsync::store::{ItemStore, MemoryItemStore, StoreOp};
use fragsync::{CreateAssociation, FragmentDocument, FragmentError, Guid, ReconciliationEngine, StoreError};

fn new_item(doc: &mut FragmentDocument, name: &str) -> Guid {
    doc.create_association(CreateAssociation::NewItem {
        display_text: name.to_string(),
        item_name: name.to_string(),
    })
    .unwrap()
}

fn local_items(doc: &FragmentDocument) -> Vec<String> {
    doc.associations()
        .iter()
        .map(|record| record.local_item().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_new_leaf_gets_association() {
    let store = MemoryItemStore::new();
    store.add_leaf("a.txt", b"a").unwrap();
    let mut doc = FragmentDocument::default();

    ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap();

    assert_eq!(doc.associations().len(), 1);
    let guid = doc.list_associations()[0];
    assert_eq!(doc.association_display_text(guid).unwrap(), Some("a.txt"));
    assert_eq!(doc.association_local_item(guid).unwrap(), Some("a.txt"));
    assert!(!doc.association_is_grouping_item(guid).unwrap());
}

#[tokio::test]
async fn test_vanished_item_loses_association() {
    let store = MemoryItemStore::new();
    let mut doc = FragmentDocument::default();
    let old = new_item(&mut doc, "old");

    let report = ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap();

    assert!(doc.list_associations().is_empty());
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].guid, old);
}

#[tokio::test]
async fn test_mixed_changes() {
    let store = MemoryItemStore::new();
    store.add_leaf("x", b"x").unwrap();
    store.add_container("z").unwrap();
    let mut doc = FragmentDocument::default();
    let x = new_item(&mut doc, "x");
    new_item(&mut doc, "y");

    let report = ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap();

    assert_eq!(local_items(&doc), vec!["x", "z"]);
    assert_eq!(doc.list_associations()[0], x);
    assert_eq!(report.kept, vec![x]);
    let z = report.added[0].guid;
    assert!(doc.association_is_grouping_item(z).unwrap());
    assert_eq!(
        doc.association_associated_fragment(z).unwrap(),
        Some("z/.fragment.xml")
    );
}

#[tokio::test]
async fn test_second_run_is_noop() {
    let store = MemoryItemStore::new();
    store.add_leaf("one", b"1").unwrap();
    store.add_container("two").unwrap();
    let mut doc = FragmentDocument::default();
    let engine = ReconciliationEngine::default();

    engine.run(&store, "", &mut doc).await.unwrap();
    let after_first = doc.list_associations();

    let report = engine.run(&store, "", &mut doc).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(doc.list_associations(), after_first);
}

#[tokio::test]
async fn test_phantoms_survive_reconciliation() {
    let store = MemoryItemStore::new();
    let mut doc = FragmentDocument::default();
    let note = doc
        .create_association(CreateAssociation::Phantom {
            display_text: "note".to_string(),
        })
        .unwrap();

    ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap();
    assert_eq!(doc.list_associations(), vec![note]);
}

#[tokio::test]
async fn test_duplicate_local_items_keep_first() {
    let store = MemoryItemStore::new();
    store.add_leaf("dup", b"d").unwrap();
    let mut doc = FragmentDocument::default();
    let first = new_item(&mut doc, "dup");
    new_item(&mut doc, "dup");

    ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap();
    assert_eq!(doc.list_associations(), vec![first]);
}

#[tokio::test]
async fn test_persist_failure_keeps_partial_progress() {
    let store = MemoryItemStore::new();
    store.add_leaf("new.txt", b"n").unwrap();
    store.fail_on(StoreOp::CreateLeaf, ".fragment.xml");
    let mut doc = FragmentDocument::default();
    new_item(&mut doc, "gone.txt");

    let err = ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap_err();
    assert!(matches!(err, FragmentError::Store(StoreError::Injected { .. })));

    // Removal and addition stay applied, nothing was persisted
    assert_eq!(local_items(&doc), vec!["new.txt"]);
    assert!(!store.exists(".fragment.xml").await.unwrap());
}

#[tokio::test]
async fn test_ignore_rules() {
    let store = MemoryItemStore::new();
    store.add_leaf(".DS_Store", b"").unwrap();
    store.add_leaf(".hidden", b"").unwrap();
    store.add_leaf("visible", b"").unwrap();
    store.add_leaf(".fragment.xml", b"<fragment/>").unwrap();
    let mut doc = FragmentDocument::default();

    let engine = ReconciliationEngine::new(SyncConfig {
        ignore_hidden: true,
        ..Default::default()
    });
    engine.run(&store, "", &mut doc).await.unwrap();
    assert_eq!(local_items(&doc), vec!["visible"]);

    let mut doc = FragmentDocument::default();
    ReconciliationEngine::default()
        .run(&store, "", &mut doc)
        .await
        .unwrap();
    assert_eq!(local_items(&doc), vec![".hidden", "visible"]);
}

#[tokio::test]
async fn test_preview_does_not_mutate() {
    let store = MemoryItemStore::new();
    store.add_leaf("a", b"a").unwrap();
    let mut doc = FragmentDocument::default();
    new_item(&mut doc, "b");
    let before = doc.clone();

    let plan = ReconciliationEngine::default()
        .preview(&store, "", &doc)
        .await
        .unwrap();
    assert_eq!(plan.additions.len(), 1);
    assert_eq!(plan.removals.len(), 1);
    assert_eq!(doc, before);
    assert!(!store.exists(".fragment.xml").await.unwrap());
}

#[tokio::test]
async fn test_store_calls_are_sequenced() {
    let store = MemoryItemStore::new();
    store.add_container("docs").unwrap();
    store.add_leaf("docs/a", b"a").unwrap();
    let mut doc = FragmentDocument::default();

    ReconciliationEngine::default()
        .run(&store, "docs", &mut doc)
        .await
        .unwrap();
    assert_eq!(
        store.operations(),
        vec![
            (StoreOp::List, "docs".to_string()),
            (StoreOp::CreateLeaf, "docs/.fragment.xml".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_backslash_names_reconcile_twice() {
    let store = MemoryItemStore::new();
    store.add_leaf("report\\2024.txt", b"r").unwrap();
    store.add_leaf("z.txt", b"z").unwrap();
    let mut doc = FragmentDocument::default();
    let engine = ReconciliationEngine::default();

    let first = engine.run(&store, "", &mut doc).await.unwrap();
    assert_eq!(first.added.len(), 2);
    assert_eq!(local_items(&doc), vec!["report\\2024.txt", "z.txt"]);

    let second = engine.run(&store, "", &mut doc).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(local_items(&doc), vec!["report\\2024.txt", "z.txt"]);
}
