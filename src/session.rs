//! Session model — status, projected user data, and the pure resolvers.
//!
//! DESIGN
//! ======
//! `resolve_status` and `project_user_data` are pure functions of a
//! [`Transition`]. The linkages build a transition from whatever they just
//! observed and commit the resolved [`Session`]; nothing else computes a
//! status.
//!
//! When a profile document is fused in, provider fields always win: any
//! document key that collides with a provider field name is dropped.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of a profile document.
pub type Document = serde_json::Map<String, Value>;

/// Serialized names of the provider-sourced fields of [`UserData`].
pub const PROVIDER_FIELDS: [&str; 7] =
    ["uid", "displayName", "email", "emailVerified", "isAnonymous", "phoneNumber", "photoURL"];

// =============================================================================
// STATUS
// =============================================================================

/// Public session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// No information from the provider yet.
    #[serde(rename = "UNSOLVED")]
    Unsolved,
    #[serde(rename = "SIGNEDOUT")]
    SignedOut,
    /// Signed in with an unconfirmed email.
    #[serde(rename = "PENDING", alias = "UNVERIFIED")]
    Pending,
    /// Signed in, verified, and (when fused) the profile document is loaded.
    #[serde(rename = "SIGNEDIN")]
    SignedIn,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsolved => "UNSOLVED",
            Self::SignedOut => "SIGNEDOUT",
            Self::Pending => "PENDING",
            Self::SignedIn => "SIGNEDIN",
        }
    }

    /// True for every status that carries user data.
    #[must_use]
    pub fn has_user(self) -> bool {
        matches!(self, Self::Pending | Self::SignedIn)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PROVIDER USER
// =============================================================================

/// Raw user record as delivered by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub is_anonymous: bool,
    pub phone_number: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl ProviderUser {
    /// A non-anonymous, unverified user with only uid and email set.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: Some(email.into()),
            email_verified: false,
            is_anonymous: false,
            phone_number: None,
            photo_url: None,
        }
    }

    #[must_use]
    pub fn verified(mut self, email_verified: bool) -> Self {
        self.email_verified = email_verified;
        self
    }
}

// =============================================================================
// USER DATA
// =============================================================================

/// Public projection of the signed-in user.
///
/// `profile` holds the fused document fields and is flattened next to the
/// provider fields on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub is_anonymous: bool,
    pub phone_number: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(flatten)]
    pub profile: Document,
}

impl UserData {
    /// Look up a fused document field.
    #[must_use]
    pub fn profile_field(&self, key: &str) -> Option<&Value> {
        self.profile.get(key)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Immutable snapshot of the engine's auth state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub status: Status,
    pub user_data: Option<UserData>,
}

impl Session {
    #[must_use]
    pub fn unsolved() -> Self {
        Self { status: Status::Unsolved, user_data: None }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { status: Status::SignedOut, user_data: None }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unsolved()
    }
}

// =============================================================================
// RESOLVERS
// =============================================================================

/// What the engine just observed.
#[derive(Debug, Clone, Copy)]
pub enum Transition<'a> {
    /// Engine construction.
    Created,
    SignedOut,
    /// A user is signed in. `document` is the fused profile, if loaded.
    SignedIn { user: &'a ProviderUser, document: Option<&'a Document> },
}

/// Map a transition to a public status.
///
/// Returns `None` for a verified user whose fused document has not arrived
/// yet: no status is published until it does.
#[must_use]
pub fn resolve_status(transition: &Transition<'_>, fuse_active: bool) -> Option<Status> {
    match transition {
        Transition::Created => Some(Status::Unsolved),
        Transition::SignedOut => Some(Status::SignedOut),
        Transition::SignedIn { user, .. } if !user.email_verified => Some(Status::Pending),
        Transition::SignedIn { document, .. } => {
            if !fuse_active || document.is_some() {
                Some(Status::SignedIn)
            } else {
                None
            }
        }
    }
}

/// Project a transition into public user data.
#[must_use]
pub fn project_user_data(transition: &Transition<'_>) -> Option<UserData> {
    let Transition::SignedIn { user, document } = transition else {
        return None;
    };

    let profile: Document = match document {
        Some(doc) => doc
            .iter()
            .filter(|(key, _)| !PROVIDER_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        None => Document::new(),
    };

    Some(UserData {
        uid: user.uid.clone(),
        display_name: user.display_name.clone(),
        email: user.email.clone(),
        email_verified: user.email_verified,
        is_anonymous: user.is_anonymous,
        phone_number: user.phone_number.clone(),
        photo_url: user.photo_url.clone(),
        profile,
    })
}

/// Resolve both halves of a session, or `None` if nothing may be published.
#[must_use]
pub fn resolve_session(transition: &Transition<'_>, fuse_active: bool) -> Option<Session> {
    let status = resolve_status(transition, fuse_active)?;
    Some(Session { status, user_data: project_user_data(transition) })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
