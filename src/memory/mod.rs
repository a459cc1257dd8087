//! In-memory collaborators for tests and local development.
//!
//! [`MemoryProvider`] and [`MemoryStore`] implement the provider and store
//! traits entirely in process, with hooks to script the interleavings a real
//! backend produces: delayed snapshots, slow writes, stream errors.
//! [`RecordingSink`] captures diagnostics for assertions.

mod provider;
mod store;

use std::sync::Mutex;

pub use provider::MemoryProvider;
pub use store::MemoryStore;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::lock;

/// Diagnostic sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<Diagnostic> {
        lock(&self.reports).clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        lock(&self.reports).push(diagnostic.clone());
    }
}
