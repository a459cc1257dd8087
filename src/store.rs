//! Document store seam.
//!
//! Mirrors the shape of a hierarchical document database:
//! `store.collection(name).doc(id)` yields a [`DocumentRef`] that can be
//! read, merge-written, updated, and watched.

use std::sync::Arc;

use crate::bus::Subscription;
use crate::error::ErrorCode;
use crate::session::Document;

pub type SnapshotListener = Arc<dyn Fn(DocumentSnapshot) + Send + Sync>;
pub type SnapshotErrorListener = Arc<dyn Fn(StoreError) + Send + Sync>;

/// Point-in-time read of a document. `data` is `None` when it does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: String,
    pub data: Option<Document>,
}

impl DocumentSnapshot {
    #[must_use]
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}

/// Options for [`DocumentRef::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge into existing fields instead of replacing the document.
    pub merge: bool,
}

impl SetOptions {
    #[must_use]
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_DOCUMENT_NOT_FOUND",
            Self::PermissionDenied(_) => "E_PERMISSION_DENIED",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub trait DocumentStore: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn CollectionRef>;
}

pub trait CollectionRef: Send + Sync {
    fn name(&self) -> &str;

    fn doc(&self, id: &str) -> Arc<dyn DocumentRef>;
}

#[async_trait::async_trait]
pub trait DocumentRef: Send + Sync {
    /// `collection/id`.
    fn path(&self) -> String;

    async fn get(&self) -> Result<DocumentSnapshot, StoreError>;

    async fn set(&self, data: Document, options: SetOptions) -> Result<(), StoreError>;

    /// Merge `props` into an existing document. Fails if it does not exist.
    async fn update(&self, props: Document) -> Result<(), StoreError>;

    /// Watch the document. The current state is delivered once the listener
    /// is attached, then every change. Stream failures go to `error`.
    fn on_snapshot(&self, next: SnapshotListener, error: SnapshotErrorListener) -> Subscription;
}
