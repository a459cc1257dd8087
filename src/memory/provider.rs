//! In-memory identity provider.
//!
//! Scripting conventions:
//! - Emails containing `error` are rejected by sign-up, sign-in and email change.
//! - Accounts created with an email containing `pending` start unverified.
//! - The auth state is unresolved until the first sign-in, sign-out or
//!   [`MemoryProvider::emit`], so a freshly linked engine stays `Unsolved`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::bus::Subscription;
use crate::lock;
use crate::provider::{AuthStateListener, Credential, IdentityProvider, ProviderError};
use crate::session::ProviderUser;

struct Account {
    user: ProviderUser,
    password: String,
    /// Requested by `verify_before_update_email`, applied on confirmation.
    pending_email: Option<String>,
}

#[derive(Default)]
struct ProviderInner {
    /// Accounts keyed by email.
    accounts: HashMap<String, Account>,
    /// Outer `None` until the auth state is first resolved.
    current: Option<Option<ProviderUser>>,
    listeners: Vec<(u64, AuthStateListener)>,
    next_id: u64,
    calls: HashMap<&'static str, usize>,
    verification_emails: Vec<String>,
}

impl ProviderInner {
    fn record(&mut self, op: &'static str) {
        *self.calls.entry(op).or_default() += 1;
    }

    fn current_email(&self) -> Result<String, ProviderError> {
        self.current
            .clone()
            .flatten()
            .and_then(|user| user.email)
            .ok_or(ProviderError::NoCurrentUser)
    }

    fn current_account(&mut self) -> Result<&mut Account, ProviderError> {
        let email = self.current_email()?;
        self.accounts
            .get_mut(&email)
            .ok_or(ProviderError::UserNotFound(email))
    }
}

/// Scriptable identity provider kept entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<Mutex<ProviderInner>>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account without signing it in.
    pub fn add_account(&self, email: &str, password: &str, verified: bool) -> ProviderUser {
        let user = ProviderUser::new(Uuid::new_v4().to_string(), email).verified(verified);
        lock(&self.inner).accounts.insert(
            email.to_owned(),
            Account { user: user.clone(), password: password.to_owned(), pending_email: None },
        );
        user
    }

    /// Push an auth-state event to every listener as-is.
    pub fn emit(&self, user: Option<ProviderUser>) {
        let listeners: Vec<AuthStateListener> = {
            let mut inner = lock(&self.inner);
            inner.current = Some(user.clone());
            inner
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener(user.clone());
        }
    }

    /// Mark an account verified, re-emitting it if it is signed in.
    pub fn verify_email(&self, email: &str) -> Option<ProviderUser> {
        let (user, signed_in) = {
            let mut inner = lock(&self.inner);
            let signed_in = inner.current_email().is_ok_and(|current| current == email);
            let account = inner.accounts.get_mut(email)?;
            account.user.email_verified = true;
            (account.user.clone(), signed_in)
        };
        if signed_in {
            self.emit(Some(user.clone()));
        }
        Some(user)
    }

    /// Apply a pending email change for the account at `email`.
    pub fn confirm_email_change(&self, email: &str) -> Option<ProviderUser> {
        let (user, signed_in) = {
            let mut inner = lock(&self.inner);
            let signed_in = inner.current_email().is_ok_and(|current| current == email);
            let mut account = inner.accounts.remove(email)?;
            let Some(new_email) = account.pending_email.take() else {
                inner.accounts.insert(email.to_owned(), account);
                return None;
            };
            account.user.email = Some(new_email.clone());
            account.user.email_verified = true;
            let user = account.user.clone();
            inner.accounts.insert(new_email, account);
            (user, signed_in)
        };
        if signed_in {
            self.emit(Some(user.clone()));
        }
        Some(user)
    }

    /// The signed-in user, if the auth state is resolved and non-empty.
    #[must_use]
    pub fn current_user(&self) -> Option<ProviderUser> {
        lock(&self.inner).current.clone().flatten()
    }

    /// Number of times `op` (a trait method name) was called.
    #[must_use]
    pub fn calls(&self, op: &str) -> usize {
        lock(&self.inner).calls.get(op).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        lock(&self.inner).calls.values().sum()
    }

    /// Recipients of verification emails, in send order.
    #[must_use]
    pub fn verification_emails(&self) -> Vec<String> {
        lock(&self.inner).verification_emails.clone()
    }

    #[must_use]
    pub fn password_of(&self, email: &str) -> Option<String> {
        lock(&self.inner)
            .accounts
            .get(email)
            .map(|account| account.password.clone())
    }

    #[must_use]
    pub fn pending_email_of(&self, email: &str) -> Option<String> {
        lock(&self.inner)
            .accounts
            .get(email)
            .and_then(|account| account.pending_email.clone())
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

fn reject_scripted(email: &str) -> Result<(), ProviderError> {
    if email.contains("error") {
        return Err(ProviderError::Rejected(email.to_owned()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryProvider {
    fn on_auth_state_changed(&self, listener: AuthStateListener) -> Subscription {
        let (id, replay) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::clone(&listener)));
            (id, inner.current.clone())
        };
        if let Some(user) = replay {
            listener(user);
        }

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    async fn create_user_with_email_and_password(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        let user = {
            let mut inner = lock(&self.inner);
            inner.record("create_user_with_email_and_password");
            reject_scripted(email)?;
            if !email.contains('@') {
                return Err(ProviderError::InvalidEmail(email.to_owned()));
            }
            if inner.accounts.contains_key(email) {
                return Err(ProviderError::EmailInUse(email.to_owned()));
            }
            let user = ProviderUser::new(Uuid::new_v4().to_string(), email).verified(!email.contains("pending"));
            inner.accounts.insert(
                email.to_owned(),
                Account { user: user.clone(), password: password.to_owned(), pending_email: None },
            );
            user
        };
        self.emit(Some(user));
        Ok(())
    }

    async fn sign_in_with_email_and_password(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        let user = {
            let mut inner = lock(&self.inner);
            inner.record("sign_in_with_email_and_password");
            reject_scripted(email)?;
            let account = inner
                .accounts
                .get(email)
                .ok_or_else(|| ProviderError::UserNotFound(email.to_owned()))?;
            if account.password != password {
                return Err(ProviderError::WrongPassword);
            }
            account.user.clone()
        };
        self.emit(Some(user));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        lock(&self.inner).record("sign_out");
        self.emit(None);
        Ok(())
    }

    async fn send_email_verification(&self) -> Result<(), ProviderError> {
        let mut inner = lock(&self.inner);
        inner.record("send_email_verification");
        let email = inner.current_email()?;
        inner.verification_emails.push(email);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), ProviderError> {
        let mut inner = lock(&self.inner);
        inner.record("update_password");
        inner.current_account()?.password = new_password.to_owned();
        Ok(())
    }

    async fn verify_before_update_email(&self, new_email: &str) -> Result<(), ProviderError> {
        let mut inner = lock(&self.inner);
        inner.record("verify_before_update_email");
        reject_scripted(new_email)?;
        if inner.accounts.contains_key(new_email) {
            return Err(ProviderError::EmailInUse(new_email.to_owned()));
        }
        inner.current_account()?.pending_email = Some(new_email.to_owned());
        Ok(())
    }

    async fn reauthenticate_with_credential(&self, credential: &Credential) -> Result<(), ProviderError> {
        let mut inner = lock(&self.inner);
        inner.record("reauthenticate_with_credential");
        let account = inner.current_account()?;
        if account.user.email.as_deref() != Some(credential.email.as_str()) {
            return Err(ProviderError::Rejected("credential does not belong to the current user".into()));
        }
        if account.password != credential.password {
            return Err(ProviderError::WrongPassword);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;
