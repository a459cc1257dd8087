//! Identity provider seam.
//!
//! The engine consumes the provider through [`IdentityProvider`] so any SDK
//! (or the in-memory provider in [`crate::memory`]) can drive it. Methods
//! that act on "the current user" fail with [`ProviderError::NoCurrentUser`]
//! when nobody is signed in.

use std::fmt;
use std::sync::Arc;

use crate::bus::Subscription;
use crate::error::ErrorCode;
use crate::session::ProviderUser;

/// Callback for auth-state changes. `None` means signed out.
pub type AuthStateListener = Arc<dyn Fn(Option<ProviderUser>) + Send + Sync>;

// =============================================================================
// CREDENTIAL
// =============================================================================

/// Email/password credential used for reauthentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("no user is signed in")]
    NoCurrentUser,
    #[error("wrong password")]
    WrongPassword,
    #[error("no account for {0}")]
    UserNotFound(String),
    #[error("email already in use: {0}")]
    EmailInUse(String),
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ErrorCode for ProviderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoCurrentUser => "E_NO_CURRENT_USER",
            Self::WrongPassword => "E_WRONG_PASSWORD",
            Self::UserNotFound(_) => "E_USER_NOT_FOUND",
            Self::EmailInUse(_) => "E_EMAIL_IN_USE",
            Self::InvalidEmail(_) => "E_INVALID_EMAIL",
            Self::Network(_) => "E_NETWORK",
            Self::Rejected(_) => "E_REJECTED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register for auth-state changes. Providers deliver the current state
    /// to a new listener once it is known, then every change.
    fn on_auth_state_changed(&self, listener: AuthStateListener) -> Subscription;

    /// Create an account and sign it in.
    async fn create_user_with_email_and_password(&self, email: &str, password: &str) -> Result<(), ProviderError>;

    async fn sign_in_with_email_and_password(&self, email: &str, password: &str) -> Result<(), ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Send a verification email to the current user.
    async fn send_email_verification(&self) -> Result<(), ProviderError>;

    /// Change the current user's password.
    async fn update_password(&self, new_password: &str) -> Result<(), ProviderError>;

    /// Send a confirmation link to `new_email`; the change applies once the
    /// link is followed.
    async fn verify_before_update_email(&self, new_email: &str) -> Result<(), ProviderError>;

    async fn reauthenticate_with_credential(&self, credential: &Credential) -> Result<(), ProviderError>;

    /// Build an email/password credential for this provider.
    fn credential_for(&self, email: &str, password: &str) -> Credential {
        Credential::email_password(email, password)
    }
}
