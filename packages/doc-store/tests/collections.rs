use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::PathBuf;

use pathdoc_store::{DocumentStore, Error};
use serde_json::{json, Value};

struct TestCollection {
    _dir: tempfile::TempDir,
    collection: PathBuf,
    store: DocumentStore,
}

impl TestCollection {
    async fn with_documents(docs: &[(&str, Value)]) -> TestCollection {
        let dir = tempfile::tempdir().unwrap();
        let collection = dir.path().join("testCollection");
        let store = DocumentStore::default();
        store.ensure_collection(&collection).await.unwrap();
        for (id, value) in docs {
            store.set(collection.join(id), value).await.unwrap();
        }
        TestCollection {
            _dir: dir,
            collection,
            store,
        }
    }
}

#[tokio::test]
async fn iterates_identifiers() {
    let t = TestCollection::with_documents(&[("raw", json!("x")), ("obj", json!({"b": 17}))]).await;
    let store = t.store.clone();

    let mut seen = BTreeSet::new();
    t.store
        .iterate_identifiers(&t.collection, |path, id| {
            seen.insert(id);
            let store = store.clone();
            async move {
                // `exists` takes no lock, so it is safe on the visited entry.
                assert!(store.exists(&path).await);
                Ok::<_, Infallible>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(seen, BTreeSet::from(["obj".to_string(), "raw".to_string()]));
    assert!(t.store.lock_manager().is_empty());
}

#[tokio::test]
async fn iterates_document_contents() {
    let t = TestCollection::with_documents(&[
        ("a", json!({"n": 1})),
        ("b", json!({"n": 2})),
        ("c", json!({"n": 3})),
    ])
    .await;

    let mut total = 0;
    let mut ids = BTreeSet::new();
    t.store
        .iterate_documents(&t.collection, |doc: Value, id| {
            total += doc["n"].as_i64().unwrap();
            ids.insert(id);
            async { Ok::<_, Infallible>(()) }
        })
        .await
        .unwrap();

    assert_eq!(total, 6);
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn empty_collection_visits_nothing() {
    let t = TestCollection::with_documents(&[]).await;
    let mut visited = 0;
    t.store
        .iterate_documents(&t.collection, |_: Value, _| {
            visited += 1;
            async { Ok::<_, Infallible>(()) }
        })
        .await
        .unwrap();
    assert_eq!(visited, 0);
}

#[tokio::test]
async fn callback_error_stops_the_traversal() {
    let t = TestCollection::with_documents(&[
        ("a", json!(1)),
        ("b", json!(2)),
        ("c", json!(3)),
    ])
    .await;

    let mut visited = 0;
    let e = t
        .store
        .iterate_identifiers(&t.collection, |_, _| {
            visited += 1;
            async { Err::<(), _>("stop here") }
        })
        .await
        .unwrap_err();

    assert!(matches!(e, Error::Transformer(_)));
    assert_eq!(visited, 1);
    assert!(t.store.lock_manager().is_empty());
}

#[tokio::test]
async fn undecodable_document_stops_the_traversal() {
    let t = TestCollection::with_documents(&[]).await;
    t.store
        .set_buffer(t.collection.join("raw"), "some random non-json text")
        .await
        .unwrap();

    let e = t
        .store
        .iterate_documents(&t.collection, |_: Value, _| async { Ok::<_, Infallible>(()) })
        .await
        .unwrap_err();
    assert!(matches!(e, Error::Parse { .. }));
}

#[tokio::test]
async fn document_destroyed_mid_traversal_is_skipped() {
    let ids = ["a", "b", "c", "d"];
    let docs: Vec<_> = ids.iter().map(|id| (*id, json!(id))).collect();
    let t = TestCollection::with_documents(&docs).await;
    let store = t.store.clone();
    let collection = t.collection.clone();

    let mut visited = Vec::new();
    let mut victim: Option<String> = None;
    t.store
        .iterate_documents(&t.collection, |doc: Value, id| {
            assert_eq!(doc, json!(id));
            // The first visit destroys some other, not yet visited, document.
            let doomed = match victim {
                None => ids.iter().find(|other| **other != id).map(|s| s.to_string()),
                Some(_) => None,
            };
            if doomed.is_some() {
                victim = doomed.clone();
            }
            visited.push(id);

            let store = store.clone();
            let collection = collection.clone();
            async move {
                if let Some(doomed) = doomed {
                    store.destroy(collection.join(doomed)).await?;
                }
                Ok::<_, Error>(())
            }
        })
        .await
        .unwrap();

    let victim = victim.unwrap();
    assert_eq!(visited.len(), 3);
    assert!(!visited.contains(&victim));
    assert!(!t.store.exists(t.collection.join(&victim)).await);
}

#[tokio::test]
async fn temporary_files_are_not_documents() {
    let t = TestCollection::with_documents(&[("a", json!(1))]).await;
    std::fs::write(t.collection.join(".a.pathdoc-tmp-partial"), "{").unwrap();

    let mut ids = Vec::new();
    t.store
        .iterate_documents(&t.collection, |_: Value, id| {
            ids.push(id);
            async { Ok::<_, Infallible>(()) }
        })
        .await
        .unwrap();
    assert_eq!(ids, vec!["a".to_string()]);
}
