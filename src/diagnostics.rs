//! Diagnostic sink for stream and bootstrap failures.
//!
//! These failures never change the published session, so they cannot be
//! reported through an operation result. They go to a [`DiagnosticSink`]
//! instead; the default [`TracingSink`] writes them as `tracing` events.

use std::fmt;

use tracing::{error, warn};

use crate::error::ErrorCode;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The snapshot stream of the linked profile document failed.
    SnapshotStream { path: String, error: StoreError },
    /// Creating or merging the profile document failed during sign-in.
    /// The session stays where it was until the next auth transition.
    BootstrapFailed { uid: String, path: String, error: StoreError },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotStream { path, error } => write!(f, "snapshot stream for {path} failed: {error}"),
            Self::BootstrapFailed { uid, path, error } => {
                write!(f, "profile bootstrap for {uid} at {path} failed: {error}")
            }
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::SnapshotStream { path, error } => {
                warn!(%path, code = error.error_code(), error = %error, "fuse: snapshot stream error");
            }
            Diagnostic::BootstrapFailed { uid, path, error } => {
                error!(%uid, %path, code = error.error_code(), error = %error, "fuse: profile bootstrap failed");
            }
        }
    }
}
