//! Session engine — the public object.
//!
//! DESIGN
//! ======
//! `SessionEngine::new` publishes `{Unsolved, None}` on the engine's own bus,
//! then subscribes to the provider. From then on the session changes only
//! through the linkages. Dropping the engine drops the provider
//! subscription; a linked snapshot listener goes with the fuse linkage.
//!
//! Fused engines spawn document bootstraps on the tokio runtime that was
//! current at construction, so they must be built inside a runtime.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::bus::Subscription;
use crate::config::{ConfigError, EngineConfig};
use crate::linkage::SessionCore;
use crate::linkage::auth::{self, FusedLink};
use crate::linkage::fuse::FuseLinkage;
use crate::operations::{OperationGateway, OperationResult};
use crate::session::{Document, Session, Status, UserData};

pub struct SessionEngine {
    core: Arc<SessionCore>,
    gateway: OperationGateway,
    fused: bool,
    _auth: Subscription,
}

impl SessionEngine {
    /// Build the engine and link it to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoRuntime`] when fuse is configured outside a
    /// tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let EngineConfig { provider, fuse, diagnostics } = config;

        let fused = match &fuse {
            Some(spec) => {
                let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
                info!(collection = %spec.collection_name, "engine: fuse enabled");
                Some(FusedLink { fuse: Arc::new(FuseLinkage::new(spec)), runtime })
            }
            None => None,
        };
        let fuse_linkage = fused.as_ref().map(|link| Arc::clone(&link.fuse));
        let is_fused = fused.is_some();

        let core = Arc::new(SessionCore::new(diagnostics));
        let auth = auth::link(provider.as_ref(), &core, fused);
        let gateway = OperationGateway::new(provider, Arc::clone(&core), fuse_linkage);

        Ok(Self { core, gateway, fused: is_fused, _auth: auth })
    }

    /// Observe every session, starting with the current one.
    ///
    /// Snapshot-driven sessions are delivered while the fuse state is
    /// locked, so an observer must not block on this engine's operations.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.core.bus.subscribe(observer)
    }

    #[must_use]
    pub fn session(&self) -> Arc<Session> {
        self.core.current()
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.core.current().status
    }

    #[must_use]
    pub fn user_data(&self) -> Option<UserData> {
        self.core.current().user_data.clone()
    }

    #[must_use]
    pub fn is_fused(&self) -> bool {
        self.fused
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> OperationResult {
        self.gateway.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> OperationResult {
        self.gateway.sign_in(email, password).await
    }

    pub async fn sign_out(&self) -> OperationResult {
        self.gateway.sign_out().await
    }

    pub async fn send_email_verification(&self) -> OperationResult {
        self.gateway.send_email_verification().await
    }

    pub async fn update_email(&self, new_email: &str, password: &str) -> OperationResult {
        self.gateway.update_email(new_email, password).await
    }

    pub async fn update_password(&self, new_password: &str, password: &str) -> OperationResult {
        self.gateway.update_password(new_password, password).await
    }

    /// Merge `props` into the profile document. The resulting session is
    /// published by the snapshot stream, not by this call.
    pub async fn update_props(&self, props: Document) -> OperationResult {
        self.gateway.update_props(props).await
    }
}

impl fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEngine")
            .field("status", &self.status())
            .field("fused", &self.fused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
