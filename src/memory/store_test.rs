use super::*;
use serde_json::{Value, json};
use std::time::Duration;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn watch(
    store: &MemoryStore,
    collection: &str,
    id: &str,
) -> (Arc<Mutex<Vec<Option<Document>>>>, Arc<Mutex<Vec<StoreError>>>, Subscription) {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let snap_sink = Arc::clone(&snapshots);
    let err_sink = Arc::clone(&errors);
    let sub = store.collection(collection).doc(id).on_snapshot(
        Arc::new(move |s: DocumentSnapshot| snap_sink.lock().unwrap().push(s.data)),
        Arc::new(move |e: StoreError| err_sink.lock().unwrap().push(e)),
    );
    (snapshots, errors, sub)
}

// =============================================================================
// Reads and writes
// =============================================================================

#[tokio::test]
async fn get_missing_document_does_not_exist() {
    let store = MemoryStore::new();
    let snapshot = store.collection("profiles").doc("u1").get().await.unwrap();
    assert!(!snapshot.exists());
    assert_eq!(snapshot.path, "profiles/u1");
}

#[tokio::test]
async fn merge_set_keeps_existing_fields() {
    let store = MemoryStore::new();
    store.put("profiles", "u1", doc(json!({"nickname": "x"})));
    store
        .collection("profiles")
        .doc("u1")
        .set(doc(json!({"plan": "free"})), SetOptions::merge())
        .await
        .unwrap();
    assert_eq!(store.document("profiles", "u1"), Some(doc(json!({"nickname": "x", "plan": "free"}))));
}

#[tokio::test]
async fn plain_set_replaces_document() {
    let store = MemoryStore::new();
    store.put("profiles", "u1", doc(json!({"nickname": "x"})));
    store
        .collection("profiles")
        .doc("u1")
        .set(doc(json!({"plan": "free"})), SetOptions::default())
        .await
        .unwrap();
    assert_eq!(store.document("profiles", "u1"), Some(doc(json!({"plan": "free"}))));
}

#[tokio::test]
async fn update_requires_existing_document() {
    let store = MemoryStore::new();
    let err = store
        .collection("profiles")
        .doc("u1")
        .update(doc(json!({"a": 1})))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound("profiles/u1".into()));
}

#[tokio::test]
async fn failing_writes_return_error() {
    let store = MemoryStore::new();
    store.fail_writes(Some(StoreError::Unavailable("offline".into())));
    let err = store
        .collection("profiles")
        .doc("u1")
        .set(Document::new(), SetOptions::merge())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert!(store.document("profiles", "u1").is_none());

    store.fail_writes(None);
    assert!(store
        .collection("profiles")
        .doc("u1")
        .set(Document::new(), SetOptions::merge())
        .await
        .is_ok());
}

#[tokio::test]
async fn gated_write_waits_for_open() {
    let store = MemoryStore::new();
    store.gate_writes();
    let writer = store.clone();
    let task = tokio::spawn(async move {
        writer
            .collection("profiles")
            .doc("u1")
            .set(doc(json!({"a": 1})), SetOptions::merge())
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.document("profiles", "u1").is_none());

    store.open_writes();
    task.await.unwrap().unwrap();
    assert!(store.document("profiles", "u1").is_some());
}

// =============================================================================
// Snapshot listeners
// =============================================================================

#[tokio::test]
async fn listener_gets_initial_state_then_changes() {
    let store = MemoryStore::new();
    let (snapshots, _errors, _sub) = watch(&store, "profiles", "u1");
    store
        .collection("profiles")
        .doc("u1")
        .set(doc(json!({"a": 1})), SetOptions::merge())
        .await
        .unwrap();

    let seen = snapshots.lock().unwrap().clone();
    assert_eq!(seen, vec![None, Some(doc(json!({"a": 1})))]);
    assert_eq!(store.listener_count("profiles", "u1"), 1);
}

#[test]
fn unsubscribed_listener_is_removed() {
    let store = MemoryStore::new();
    let (snapshots, _errors, sub) = watch(&store, "profiles", "u1");
    sub.unsubscribe();
    store.put("profiles", "u1", doc(json!({"a": 1})));
    assert_eq!(snapshots.lock().unwrap().len(), 1);
    assert_eq!(store.listener_count("profiles", "u1"), 0);
}

#[test]
fn held_snapshots_are_delivered_on_release_even_after_unsubscribe() {
    let store = MemoryStore::new();
    let (snapshots, _errors, sub) = watch(&store, "profiles", "u1");
    store.hold_snapshots();
    store.put("profiles", "u1", doc(json!({"a": 1})));
    sub.unsubscribe();
    assert_eq!(snapshots.lock().unwrap().len(), 1);

    assert_eq!(store.release_snapshots(), 1);
    assert_eq!(snapshots.lock().unwrap().len(), 2);
}

#[test]
fn emit_error_reaches_error_listener() {
    let store = MemoryStore::new();
    let (_snapshots, errors, _sub) = watch(&store, "profiles", "u1");
    store.emit_error("profiles", "u1", StoreError::PermissionDenied("profiles/u1".into()));
    assert_eq!(*errors.lock().unwrap(), vec![StoreError::PermissionDenied("profiles/u1".into())]);
}

#[tokio::test]
async fn calls_are_counted() {
    let store = MemoryStore::new();
    let doc_ref = store.collection("profiles").doc("u1");
    doc_ref.get().await.unwrap();
    doc_ref.set(Document::new(), SetOptions::merge()).await.unwrap();
    assert_eq!(store.calls("get"), 1);
    assert_eq!(store.calls("set"), 1);
    assert_eq!(store.calls("update"), 0);
}
