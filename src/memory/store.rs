//! In-memory document store.
//!
//! DESIGN
//! ======
//! Documents live in one map keyed by `collection/id`. Every write notifies
//! the document's snapshot listeners after the store lock is released, so a
//! listener may call back into the store.
//!
//! Scripting hooks:
//! - `hold_snapshots` queues deliveries (snapshots and stream errors) until
//!   `release_snapshots`, simulating network delay. Queued deliveries reach
//!   their listener even if it unsubscribed meanwhile, as a late network
//!   callback would.
//! - `gate_writes` parks `set`/`update` until `open_writes`.
//! - `fail_writes` makes every write fail with the given error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::bus::Subscription;
use crate::lock;
use crate::session::Document;
use crate::store::{
    CollectionRef, DocumentRef, DocumentSnapshot, DocumentStore, SetOptions, SnapshotErrorListener, SnapshotListener,
    StoreError,
};

struct Watcher {
    id: u64,
    next: SnapshotListener,
    error: SnapshotErrorListener,
}

enum Delivery {
    Snapshot(SnapshotListener, DocumentSnapshot),
    Error(SnapshotErrorListener, StoreError),
}

impl Delivery {
    fn run(self) {
        match self {
            Self::Snapshot(next, snapshot) => next(snapshot),
            Self::Error(error, e) => error(e),
        }
    }
}

#[derive(Default)]
struct StoreState {
    documents: HashMap<String, Document>,
    watchers: HashMap<String, Vec<Watcher>>,
    next_id: u64,
    /// `Some` while snapshots are held back.
    held: Option<Vec<Delivery>>,
    failing: Option<StoreError>,
    calls: HashMap<&'static str, usize>,
}

impl StoreState {
    fn record(&mut self, op: &'static str) {
        *self.calls.entry(op).or_default() += 1;
    }

    fn snapshot(&self, path: &str) -> DocumentSnapshot {
        DocumentSnapshot { path: path.to_owned(), data: self.documents.get(path).cloned() }
    }

    /// Snapshot deliveries for every watcher of `path`.
    fn changed(&self, path: &str) -> Vec<Delivery> {
        let snapshot = self.snapshot(path);
        self.watchers
            .get(path)
            .map(|watchers| {
                watchers
                    .iter()
                    .map(|w| Delivery::Snapshot(Arc::clone(&w.next), snapshot.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Queue `deliveries` if held, otherwise hand them back to run.
    fn defer(&mut self, deliveries: Vec<Delivery>) -> Vec<Delivery> {
        match &mut self.held {
            Some(queue) => {
                queue.extend(deliveries);
                Vec::new()
            }
            None => deliveries,
        }
    }
}

struct StoreInner {
    state: Mutex<StoreState>,
    writes_open: watch::Sender<bool>,
}

impl StoreInner {
    fn run(deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            delivery.run();
        }
    }

    async fn wait_for_writes(&self) {
        let mut open = self.writes_open.subscribe();
        // The sender lives as long as the store; an error means teardown.
        if open.wait_for(|open| *open).await.is_err() {
            tracing::debug!("memory store: write gate dropped");
        }
    }

    async fn write<F>(&self, op: &'static str, path: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut HashMap<String, Document>) -> Result<(), StoreError>,
    {
        self.wait_for_writes().await;
        let ready = {
            let mut state = lock(&self.state);
            state.record(op);
            if let Some(error) = state.failing.clone() {
                return Err(error);
            }
            apply(&mut state.documents)?;
            let deliveries = state.changed(path);
            state.defer(deliveries)
        };
        Self::run(ready);
        Ok(())
    }
}

/// Scriptable document store kept entirely in memory.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (writes_open, _) = watch::channel(true);
        Self { inner: Arc::new(StoreInner { state: Mutex::new(StoreState::default()), writes_open }) }
    }

    /// Replace a document and notify its watchers.
    pub fn put(&self, collection: &str, id: &str, data: Document) {
        let path = format!("{collection}/{id}");
        let ready = {
            let mut state = lock(&self.inner.state);
            state.documents.insert(path.clone(), data);
            let deliveries = state.changed(&path);
            state.defer(deliveries)
        };
        StoreInner::run(ready);
    }

    #[must_use]
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        lock(&self.inner.state)
            .documents
            .get(&format!("{collection}/{id}"))
            .cloned()
    }

    #[must_use]
    pub fn listener_count(&self, collection: &str, id: &str) -> usize {
        lock(&self.inner.state)
            .watchers
            .get(&format!("{collection}/{id}"))
            .map_or(0, Vec::len)
    }

    /// Queue snapshot and error deliveries until [`Self::release_snapshots`].
    pub fn hold_snapshots(&self) {
        let mut state = lock(&self.inner.state);
        if state.held.is_none() {
            state.held = Some(Vec::new());
        }
    }

    /// Deliver everything queued while held. Returns the number delivered.
    pub fn release_snapshots(&self) -> usize {
        let queued = lock(&self.inner.state).held.take().unwrap_or_default();
        let count = queued.len();
        StoreInner::run(queued);
        count
    }

    /// Park writes until [`Self::open_writes`].
    pub fn gate_writes(&self) {
        self.inner.writes_open.send_replace(false);
    }

    pub fn open_writes(&self) {
        self.inner.writes_open.send_replace(true);
    }

    /// Fail every write with `error`; `None` restores normal writes.
    pub fn fail_writes(&self, error: Option<StoreError>) {
        lock(&self.inner.state).failing = error;
    }

    /// Push a stream error to every watcher of the document.
    pub fn emit_error(&self, collection: &str, id: &str, error: StoreError) {
        let path = format!("{collection}/{id}");
        let ready = {
            let mut state = lock(&self.inner.state);
            let deliveries: Vec<Delivery> = state
                .watchers
                .get(&path)
                .map(|watchers| {
                    watchers
                        .iter()
                        .map(|w| Delivery::Error(Arc::clone(&w.error), error.clone()))
                        .collect()
                })
                .unwrap_or_default();
            state.defer(deliveries)
        };
        StoreInner::run(ready);
    }

    /// Number of times `op` (`get`, `set`, `update`, `on_snapshot`) was called.
    #[must_use]
    pub fn calls(&self, op: &str) -> usize {
        lock(&self.inner.state).calls.get(op).copied().unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn CollectionRef> {
        Arc::new(MemoryCollection { inner: Arc::clone(&self.inner), name: name.to_owned() })
    }
}

struct MemoryCollection {
    inner: Arc<StoreInner>,
    name: String,
}

impl CollectionRef for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn doc(&self, id: &str) -> Arc<dyn DocumentRef> {
        Arc::new(MemoryDocument { inner: Arc::clone(&self.inner), path: format!("{}/{id}", self.name) })
    }
}

struct MemoryDocument {
    inner: Arc<StoreInner>,
    path: String,
}

#[async_trait::async_trait]
impl DocumentRef for MemoryDocument {
    fn path(&self) -> String {
        self.path.clone()
    }

    async fn get(&self) -> Result<DocumentSnapshot, StoreError> {
        let mut state = lock(&self.inner.state);
        state.record("get");
        Ok(state.snapshot(&self.path))
    }

    async fn set(&self, data: Document, options: SetOptions) -> Result<(), StoreError> {
        self.inner
            .write("set", &self.path, |documents| {
                if options.merge {
                    documents.entry(self.path.clone()).or_default().extend(data);
                } else {
                    documents.insert(self.path.clone(), data);
                }
                Ok(())
            })
            .await
    }

    async fn update(&self, props: Document) -> Result<(), StoreError> {
        self.inner
            .write("update", &self.path, |documents| {
                let existing = documents
                    .get_mut(&self.path)
                    .ok_or_else(|| StoreError::NotFound(self.path.clone()))?;
                existing.extend(props);
                Ok(())
            })
            .await
    }

    fn on_snapshot(&self, next: SnapshotListener, error: SnapshotErrorListener) -> Subscription {
        let (id, ready) = {
            let mut state = lock(&self.inner.state);
            state.record("on_snapshot");
            let id = state.next_id;
            state.next_id += 1;
            state
                .watchers
                .entry(self.path.clone())
                .or_default()
                .push(Watcher { id, next: Arc::clone(&next), error });
            let initial = vec![Delivery::Snapshot(next, state.snapshot(&self.path))];
            (id, state.defer(initial))
        };
        StoreInner::run(ready);

        let inner = Arc::downgrade(&self.inner);
        let path = self.path.clone();
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = lock(&inner.state);
                let empty = match state.watchers.get_mut(&path) {
                    Some(watchers) => {
                        watchers.retain(|w| w.id != id);
                        watchers.is_empty()
                    }
                    None => false,
                };
                if empty {
                    state.watchers.remove(&path);
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
