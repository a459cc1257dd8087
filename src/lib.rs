//! authsync — auth session synchronization engine.
//!
//! ARCHITECTURE
//! ============
//! A [`SessionEngine`] mirrors the auth state pushed by an
//! [`IdentityProvider`], optionally fuses it with a per-user profile document
//! held in a [`DocumentStore`], and broadcasts every transition through its
//! own [`EventBus`]. Identity-mutating operations go through the
//! [`OperationGateway`], which reauthenticates before sensitive changes.
//!
//! ```text
//! provider auth event ──▶ linkage::auth ──▶ linkage::fuse (optional)
//!                                │                 │ document snapshots
//!                                ▼                 ▼
//!                        session snapshot ──▶ EventBus ──▶ observers
//! ```
//!
//! DESIGN
//! ======
//! - The session is an immutable `Arc<Session>` replaced on every transition.
//! - Collaborators sit behind async traits so the engine never depends on a
//!   concrete SDK. The [`memory`] module provides in-memory implementations.
//! - Operations never return `Err`: they resolve to an [`OperationResult`]
//!   so callers can uniformly await and branch on success.

pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
mod linkage;
pub mod memory;
pub mod operations;
pub mod provider;
pub mod session;
pub mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use bus::{EventBus, Subscription};
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder, FuseSettings, FuseSpec};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use engine::SessionEngine;
pub use error::ErrorCode;
pub use operations::{OperationError, OperationGateway, OperationResult};
pub use provider::{Credential, IdentityProvider, ProviderError};
pub use session::{Document, ProviderUser, Session, Status, UserData};
pub use store::{CollectionRef, DocumentRef, DocumentSnapshot, DocumentStore, SetOptions, StoreError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
