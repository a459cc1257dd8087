//! Engine configuration and construction-time validation.
//!
//! DESIGN
//! ======
//! Configuration mistakes are programmer errors: [`EngineConfigBuilder::build`]
//! and [`crate::SessionEngine::new`] reject them with a [`ConfigError`]
//! before any provider event is processed. Runtime failures never use this
//! type.
//!
//! The fuse collection name can also come from the environment
//! (`AUTHSYNC_FUSE_COLLECTION`) via [`FuseSettings::from_env`]; the store
//! handle itself always comes from code.

use std::env::VarError;
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::provider::IdentityProvider;
use crate::session::{Document, ProviderUser};
use crate::store::DocumentStore;

pub const FUSE_COLLECTION_ENV: &str = "AUTHSYNC_FUSE_COLLECTION";

/// Builds the initial payload of a brand-new profile document.
pub type OnCreate = Arc<dyn Fn(&ProviderUser) -> Document + Send + Sync>;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("fuse collection name must not be empty")]
    EmptyCollectionName,
    #[error("fuse collection name must not contain '/': {0}")]
    InvalidCollectionName(String),
    #[error("fuse requires a tokio runtime; construct the engine inside one")]
    NoRuntime,
    #[error("invalid {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

fn validate_collection_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyCollectionName);
    }
    if name.contains('/') {
        return Err(ConfigError::InvalidCollectionName(name.to_owned()));
    }
    Ok(())
}

// =============================================================================
// FUSE
// =============================================================================

/// Fuse settings that can be loaded from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuseSettings {
    pub collection_name: String,
}

impl FuseSettings {
    /// Read `AUTHSYNC_FUSE_COLLECTION`. Unset means fuse is off; a set but
    /// blank or malformed value is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for a blank, non-unicode or
    /// slash-containing value.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(FUSE_COLLECTION_ENV) {
            Ok(raw) => parse_collection_env(Some(&raw)),
            Err(VarError::NotPresent) => Ok(None),
            Err(e @ VarError::NotUnicode(_)) => {
                Err(ConfigError::InvalidEnv { var: FUSE_COLLECTION_ENV.into(), reason: e.to_string() })
            }
        }
    }
}

fn parse_collection_env(raw: Option<&str>) -> Result<Option<FuseSettings>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let name = raw.trim();
    validate_collection_name(name)
        .map_err(|e| ConfigError::InvalidEnv { var: FUSE_COLLECTION_ENV.into(), reason: e.to_string() })?;
    Ok(Some(FuseSettings { collection_name: name.to_owned() }))
}

/// Links each signed-in user to `collection_name/{uid}` in `store`.
pub struct FuseSpec {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) collection_name: String,
    pub(crate) on_create: Option<OnCreate>,
}

impl FuseSpec {
    pub fn new(store: Arc<dyn DocumentStore>, collection_name: impl Into<String>) -> Self {
        Self { store, collection_name: collection_name.into(), on_create: None }
    }

    pub fn from_settings(store: Arc<dyn DocumentStore>, settings: FuseSettings) -> Self {
        Self::new(store, settings.collection_name)
    }

    /// Payload for documents that do not exist yet. Never applied to an
    /// existing document.
    #[must_use]
    pub fn on_create<F>(mut self, on_create: F) -> Self
    where
        F: Fn(&ProviderUser) -> Document + Send + Sync + 'static,
    {
        self.on_create = Some(Arc::new(on_create));
        self
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

impl fmt::Debug for FuseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuseSpec")
            .field("collection_name", &self.collection_name)
            .field("on_create", &self.on_create.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Validated engine configuration. Build with [`EngineConfig::builder`].
pub struct EngineConfig {
    pub(crate) provider: Arc<dyn IdentityProvider>,
    pub(crate) fuse: Option<FuseSpec>,
    pub(crate) diagnostics: Arc<dyn DiagnosticSink>,
}

impl EngineConfig {
    pub fn builder(provider: Arc<dyn IdentityProvider>) -> EngineConfigBuilder {
        EngineConfigBuilder { provider, fuse: None, diagnostics: None }
    }

    #[must_use]
    pub fn is_fused(&self) -> bool {
        self.fuse.is_some()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("fuse", &self.fuse)
            .finish_non_exhaustive()
    }
}

pub struct EngineConfigBuilder {
    provider: Arc<dyn IdentityProvider>,
    fuse: Option<FuseSpec>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn fuse(mut self, spec: FuseSpec) -> Self {
        self.fuse = Some(spec);
        self
    }

    /// Replace the default [`TracingSink`].
    #[must_use]
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Validate and finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the fuse collection name is blank or contains `/`.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if let Some(fuse) = &self.fuse {
            validate_collection_name(&fuse.collection_name)?;
        }
        Ok(EngineConfig {
            provider: self.provider,
            fuse: self.fuse,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Arc::new(TracingSink)),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
