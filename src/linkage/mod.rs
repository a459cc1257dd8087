//! Linkages — the only code paths that change the published session.
//!
//! ARCHITECTURE
//! ============
//! `auth` listens to the provider's auth-state stream. For fused engines it
//! hands verified users to `fuse`, which bootstraps the profile document and
//! publishes from its snapshot stream. Both commit through [`SessionCore`].

pub(crate) mod auth;
pub(crate) mod fuse;

use std::sync::{Arc, Mutex};

use crate::bus::EventBus;
use crate::diagnostics::DiagnosticSink;
use crate::lock;
use crate::session::Session;

/// Current session plus the bus it is published on.
pub(crate) struct SessionCore {
    session: Mutex<Arc<Session>>,
    pub(crate) bus: EventBus<Arc<Session>>,
    pub(crate) diagnostics: Arc<dyn DiagnosticSink>,
}

impl SessionCore {
    /// Start at `{Unsolved, None}` and publish it so late subscribers get it.
    pub(crate) fn new(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        let initial = Arc::new(Session::unsolved());
        let bus = EventBus::new();
        bus.publish(Arc::clone(&initial));
        Self { session: Mutex::new(initial), bus, diagnostics }
    }

    pub(crate) fn current(&self) -> Arc<Session> {
        Arc::clone(&lock(&self.session))
    }

    /// Replace the session and publish it. A session equal to the current
    /// one is not republished.
    pub(crate) fn commit(&self, next: Session) {
        let next = {
            let mut session = lock(&self.session);
            if **session == next {
                return;
            }
            let next = Arc::new(next);
            *session = Arc::clone(&next);
            next
        };
        tracing::debug!(status = %next.status, "session: commit");
        self.bus.publish(next);
    }
}
