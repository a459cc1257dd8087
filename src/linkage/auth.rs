//! Auth linkage — reacts to the provider's auth-state stream.
//!
//! Unfused engines resolve every event straight into a session. Fused
//! engines unlink the previous profile document first, then either publish
//! directly (signed out, unverified) or spawn the document bootstrap for a
//! verified user, whose session is published by the snapshot stream.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::info;

use super::SessionCore;
use super::fuse::FuseLinkage;
use crate::bus::Subscription;
use crate::provider::IdentityProvider;
use crate::session::{ProviderUser, Session, Transition, resolve_session};

/// Fuse half of the linkage: where bootstraps run and what they link.
pub(crate) struct FusedLink {
    pub(crate) fuse: Arc<FuseLinkage>,
    pub(crate) runtime: Handle,
}

/// Subscribe to `provider` for the lifetime of the returned handle.
pub(crate) fn link(provider: &dyn IdentityProvider, core: &Arc<SessionCore>, fused: Option<FusedLink>) -> Subscription {
    let core: Weak<SessionCore> = Arc::downgrade(core);
    provider.on_auth_state_changed(Arc::new(move |user: Option<ProviderUser>| {
        let Some(core) = core.upgrade() else {
            return;
        };
        match &fused {
            None => on_unfused(&core, user),
            Some(link) => on_fused(&core, link, user),
        }
    }))
}

fn on_unfused(core: &SessionCore, user: Option<ProviderUser>) {
    let transition = match &user {
        None => Transition::SignedOut,
        Some(user) => Transition::SignedIn { user, document: None },
    };
    log_event(user.as_ref());
    if let Some(session) = resolve_session(&transition, false) {
        core.commit(session);
    }
}

fn on_fused(core: &Arc<SessionCore>, link: &FusedLink, user: Option<ProviderUser>) {
    // Unlink before anything is published so late snapshots are stale.
    let attempt = link.fuse.begin();
    log_event(user.as_ref());

    match user {
        None => core.commit(Session::signed_out()),
        Some(user) if !user.email_verified => {
            if let Some(session) = resolve_session(&Transition::SignedIn { user: &user, document: None }, true) {
                core.commit(session);
            }
        }
        Some(user) => {
            link.runtime
                .spawn(Arc::clone(&link.fuse).bootstrap(Arc::clone(core), user, attempt));
        }
    }
}

fn log_event(user: Option<&ProviderUser>) {
    match user {
        None => info!("auth: signed out"),
        Some(user) => info!(uid = %user.uid, verified = user.email_verified, "auth: signed in"),
    }
}
