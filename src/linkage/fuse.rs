//! Fuse linkage — per-user profile document bootstrap and mirroring.
//!
//! PROTOCOL
//! ========
//! 1. `begin` invalidates the linked document (and any bootstrap still in
//!    flight) and hands out a new attempt number.
//! 2. `bootstrap` reads `collection/{uid}` and merge-writes an empty payload,
//!    or the `on_create` payload when the document does not exist yet.
//! 3. Only after the write settles, and only if the attempt is still the
//!    latest, the reference becomes current and the snapshot listener is
//!    attached. Attaching before the write settles would deliver the write's
//!    own echo as an extra snapshot.
//! 4. Each snapshot is checked against the current reference by identity.
//!    Snapshots from a reference that is no longer current are dropped.
//!
//! LOCKING
//! =======
//! The generation check and the session commit for a snapshot run under the
//! fuse-state lock, so a snapshot can never be published after the sign-out
//! that invalidated it. Observers run inside that lock on fused transitions.

use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use super::SessionCore;
use crate::bus::Subscription;
use crate::config::{FuseSpec, OnCreate};
use crate::diagnostics::Diagnostic;
use crate::lock;
use crate::session::{Document, ProviderUser, Transition, resolve_session};
use crate::store::{
    CollectionRef, DocumentRef, DocumentSnapshot, SetOptions, SnapshotErrorListener, SnapshotListener, StoreError,
};

#[derive(Default)]
struct FuseState {
    /// Bumped on every auth transition; stale bootstraps compare against it.
    attempt: u64,
    /// Linked profile document. `Some` only once its bootstrap write settled.
    current: Option<Arc<dyn DocumentRef>>,
    /// Snapshot listener of `current`.
    listener: Option<Subscription>,
}

pub(crate) struct FuseLinkage {
    collection: Arc<dyn CollectionRef>,
    on_create: Option<OnCreate>,
    state: Mutex<FuseState>,
}

fn is_origin(state: &FuseState, origin: &Weak<dyn DocumentRef>) -> bool {
    state
        .current
        .as_ref()
        .is_some_and(|current| std::ptr::addr_eq(Arc::as_ptr(current), origin.as_ptr()))
}

impl FuseLinkage {
    pub(crate) fn new(spec: &FuseSpec) -> Self {
        Self {
            collection: spec.store.collection(&spec.collection_name),
            on_create: spec.on_create.clone(),
            state: Mutex::new(FuseState::default()),
        }
    }

    /// Unlink the current document and start a new attempt.
    pub(crate) fn begin(&self) -> u64 {
        let (attempt, listener) = {
            let mut state = lock(&self.state);
            state.attempt += 1;
            state.current = None;
            (state.attempt, state.listener.take())
        };
        // Unsubscribe outside the lock; the store may take its own.
        drop(listener);
        attempt
    }

    pub(crate) fn current_document(&self) -> Option<Arc<dyn DocumentRef>> {
        lock(&self.state).current.clone()
    }

    fn is_latest(&self, attempt: u64) -> bool {
        lock(&self.state).attempt == attempt
    }

    fn is_current(&self, origin: &Weak<dyn DocumentRef>) -> bool {
        is_origin(&lock(&self.state), origin)
    }

    /// Ensure `user`'s profile document exists, then link and watch it.
    pub(crate) async fn bootstrap(self: Arc<Self>, core: Arc<SessionCore>, user: ProviderUser, attempt: u64) {
        let doc = self.collection.doc(&user.uid);
        let path = doc.path();

        let existing = match doc.get().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.bootstrap_failed(&core, attempt, &user, path, error);
                return;
            }
        };
        if !self.is_latest(attempt) {
            debug!(uid = %user.uid, %path, "fuse: bootstrap superseded before write");
            return;
        }

        let payload = if existing.exists() {
            Document::new()
        } else {
            info!(uid = %user.uid, collection = self.collection.name(), "fuse: creating profile document");
            self.on_create
                .as_ref()
                .map(|hook| hook(&user))
                .unwrap_or_default()
        };
        if let Err(error) = doc.set(payload, SetOptions::merge()).await {
            self.bootstrap_failed(&core, attempt, &user, path, error);
            return;
        }

        {
            let mut state = lock(&self.state);
            if state.attempt != attempt {
                debug!(uid = %user.uid, %path, "fuse: bootstrap superseded after write");
                return;
            }
            state.current = Some(Arc::clone(&doc));
        }

        info!(uid = %user.uid, %path, "fuse: profile linked");
        let next = self.snapshot_listener(&core, &doc, user);
        let error = self.error_listener(&core, &doc);
        let listener = doc.on_snapshot(next, error);

        let stale = {
            let mut state = lock(&self.state);
            if state.attempt == attempt {
                state.listener = Some(listener);
                None
            } else {
                Some(listener)
            }
        };
        drop(stale);
    }

    /// Report a failed bootstrap, unless a newer auth transition already
    /// superseded it: writes in flight at sign-out fail on teardown.
    fn bootstrap_failed(&self, core: &SessionCore, attempt: u64, user: &ProviderUser, path: String, error: StoreError) {
        if !self.is_latest(attempt) {
            debug!(uid = %user.uid, %path, %error, "fuse: ignoring failure of superseded bootstrap");
            return;
        }
        core.diagnostics
            .report(&Diagnostic::BootstrapFailed { uid: user.uid.clone(), path, error });
    }

    fn snapshot_listener(
        self: &Arc<Self>,
        core: &Arc<SessionCore>,
        doc: &Arc<dyn DocumentRef>,
        user: ProviderUser,
    ) -> SnapshotListener {
        let fuse = Arc::downgrade(self);
        let core = Arc::downgrade(core);
        let origin = Arc::downgrade(doc);
        Arc::new(move |snapshot: DocumentSnapshot| {
            let (Some(fuse), Some(core)) = (fuse.upgrade(), core.upgrade()) else {
                return;
            };
            fuse.apply_snapshot(&core, &origin, &user, snapshot);
        })
    }

    fn error_listener(self: &Arc<Self>, core: &SessionCore, doc: &Arc<dyn DocumentRef>) -> SnapshotErrorListener {
        let fuse = Arc::downgrade(self);
        let diagnostics = Arc::clone(&core.diagnostics);
        let origin = Arc::downgrade(doc);
        let path = doc.path();
        Arc::new(move |error: StoreError| {
            let current = fuse
                .upgrade()
                .is_some_and(|fuse| fuse.is_current(&origin));
            if current {
                diagnostics.report(&Diagnostic::SnapshotStream { path: path.clone(), error });
            } else {
                // Streams of unlinked documents fail on teardown.
                debug!(%path, %error, "fuse: ignoring error from unlinked stream");
            }
        })
    }

    fn apply_snapshot(
        &self,
        core: &SessionCore,
        origin: &Weak<dyn DocumentRef>,
        user: &ProviderUser,
        snapshot: DocumentSnapshot,
    ) {
        let state = lock(&self.state);
        if !is_origin(&state, origin) {
            debug!(path = %snapshot.path, "fuse: dropping stale snapshot");
            return;
        }

        let document = snapshot.data.unwrap_or_default();
        let transition = Transition::SignedIn { user, document: Some(&document) };
        if let Some(session) = resolve_session(&transition, true) {
            core.commit(session);
        }
        drop(state);
    }
}

#[cfg(test)]
#[path = "fuse_test.rs"]
mod tests;
