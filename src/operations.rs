//! Operation gateway — account and profile operations with declarative results.
//!
//! DESIGN
//! ======
//! Every operation resolves to an [`OperationResult`]; callers await and
//! branch on `is_success` without handling errors. Internally each operation
//! is a `Result<(), OperationError>` pipeline converted at the boundary.
//!
//! Email and password changes are gated: validation fails fast without
//! touching the provider, then the current user is reauthenticated with a
//! fresh credential before the change is requested.
//!
//! `update_props` writes to the linked profile document and publishes
//! nothing itself; the session change arrives through the snapshot stream.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::linkage::SessionCore;
use crate::linkage::fuse::FuseLinkage;
use crate::provider::{IdentityProvider, ProviderError};
use crate::session::Document;
use crate::store::StoreError;

// =============================================================================
// RESULT
// =============================================================================

/// Outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub is_success: bool,
    pub message: String,
    /// Grepable error code; `None` on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self { is_success: true, message: message.into(), code: None }
    }

    pub fn failure<E: ErrorCode>(error: &E) -> Self {
        Self { is_success: false, message: error.to_string(), code: Some(error.error_code()) }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("new email must differ from current")]
    EmailUnchanged,
    #[error("must provide current password to confirm")]
    PasswordRequired,
    #[error("new password must differ from current")]
    PasswordUnchanged,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("unable to find fuse configuration")]
    FuseNotConfigured,
    #[error("no profile document is linked to the session")]
    DocumentNotLinked,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for OperationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmailUnchanged => "E_EMAIL_UNCHANGED",
            Self::PasswordRequired => "E_PASSWORD_REQUIRED",
            Self::PasswordUnchanged => "E_PASSWORD_UNCHANGED",
            Self::NotSignedIn => "E_NOT_SIGNED_IN",
            Self::FuseNotConfigured => "E_FUSE_NOT_CONFIGURED",
            Self::DocumentNotLinked => "E_DOCUMENT_NOT_LINKED",
            Self::Provider(_) => "E_PROVIDER",
            Self::Store(_) => "E_STORE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.retryable(),
            Self::Store(e) => e.retryable(),
            _ => false,
        }
    }
}

fn finish(op: &'static str, result: Result<(), OperationError>, success: &str) -> OperationResult {
    match result {
        Ok(()) => {
            info!(op, "ops: succeeded");
            OperationResult::success(success)
        }
        Err(e) => {
            warn!(op, code = e.error_code(), retryable = e.retryable(), error = %e, "ops: failed");
            OperationResult::failure(&e)
        }
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

/// Account and profile operations bound to one engine.
pub struct OperationGateway {
    provider: Arc<dyn IdentityProvider>,
    core: Arc<SessionCore>,
    fuse: Option<Arc<FuseLinkage>>,
}

impl OperationGateway {
    pub(crate) fn new(
        provider: Arc<dyn IdentityProvider>,
        core: Arc<SessionCore>,
        fuse: Option<Arc<FuseLinkage>>,
    ) -> Self {
        Self { provider, core, fuse }
    }

    /// Create an account, then request its verification email.
    pub async fn sign_up(&self, email: &str, password: &str) -> OperationResult {
        let result = async {
            self.provider
                .create_user_with_email_and_password(email, password)
                .await?;
            self.provider.send_email_verification().await?;
            Ok::<(), OperationError>(())
        }
        .await;
        finish("sign_up", result, "account created; verification email sent")
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> OperationResult {
        let result = self
            .provider
            .sign_in_with_email_and_password(email, password)
            .await
            .map_err(OperationError::from);
        finish("sign_in", result, "signed in")
    }

    pub async fn sign_out(&self) -> OperationResult {
        let result = self.provider.sign_out().await.map_err(OperationError::from);
        finish("sign_out", result, "signed out")
    }

    /// Re-request the verification email for the current user.
    pub async fn send_email_verification(&self) -> OperationResult {
        let result = self
            .provider
            .send_email_verification()
            .await
            .map_err(OperationError::from);
        finish("send_email_verification", result, "verification email sent")
    }

    /// Request an email change. It applies once `new_email` is confirmed.
    pub async fn update_email(&self, new_email: &str, password: &str) -> OperationResult {
        let result = async {
            let current = self.current_email()?;
            if new_email == current {
                return Err(OperationError::EmailUnchanged);
            }
            if password.is_empty() {
                return Err(OperationError::PasswordRequired);
            }
            self.reauthenticate(&current, password).await?;
            self.provider.verify_before_update_email(new_email).await?;
            Ok::<(), OperationError>(())
        }
        .await;
        finish("update_email", result, "confirmation sent to the new email address")
    }

    pub async fn update_password(&self, new_password: &str, password: &str) -> OperationResult {
        let result = async {
            if password.is_empty() {
                return Err(OperationError::PasswordRequired);
            }
            if new_password == password {
                return Err(OperationError::PasswordUnchanged);
            }
            let current = self.current_email()?;
            self.reauthenticate(&current, password).await?;
            self.provider.update_password(new_password).await?;
            Ok::<(), OperationError>(())
        }
        .await;
        finish("update_password", result, "password updated")
    }

    /// Merge `props` into the linked profile document.
    pub async fn update_props(&self, props: Document) -> OperationResult {
        let result = async {
            let fuse = self
                .fuse
                .as_ref()
                .ok_or(OperationError::FuseNotConfigured)?;
            let doc = fuse
                .current_document()
                .ok_or(OperationError::DocumentNotLinked)?;
            doc.update(props).await?;
            Ok::<(), OperationError>(())
        }
        .await;
        finish("update_props", result, "profile update submitted")
    }

    fn current_email(&self) -> Result<String, OperationError> {
        self.core
            .current()
            .user_data
            .as_ref()
            .and_then(|data| data.email.clone())
            .ok_or(OperationError::NotSignedIn)
    }

    async fn reauthenticate(&self, email: &str, password: &str) -> Result<(), OperationError> {
        let credential = self.provider.credential_for(email, password);
        self.provider
            .reauthenticate_with_credential(&credential)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "operations_test.rs"]
mod tests;
