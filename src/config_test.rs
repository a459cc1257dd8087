use super::*;
use crate::memory::{MemoryProvider, MemoryStore};
use serde_json::json;

fn provider() -> Arc<dyn IdentityProvider> {
    Arc::new(MemoryProvider::new())
}

fn store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

// =============================================================================
// parse_collection_env
// =============================================================================

#[test]
fn unset_env_disables_fuse() {
    assert_eq!(parse_collection_env(None), Ok(None));
}

#[test]
fn env_value_is_trimmed() {
    let settings = parse_collection_env(Some("  profiles ")).unwrap().unwrap();
    assert_eq!(settings.collection_name, "profiles");
}

#[test]
fn blank_env_value_is_rejected() {
    let err = parse_collection_env(Some("   ")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == FUSE_COLLECTION_ENV));
    assert!(err.to_string().contains("must not be empty"));
}

#[test]
fn nested_path_env_value_is_rejected() {
    let err = parse_collection_env(Some("users/profiles")).unwrap_err();
    assert!(err.to_string().contains("'/'"));
}

// =============================================================================
// EngineConfigBuilder
// =============================================================================

#[test]
fn builder_without_fuse_is_unfused() {
    let config = EngineConfig::builder(provider()).build().unwrap();
    assert!(!config.is_fused());
}

#[test]
fn builder_with_fuse_is_fused() {
    let config = EngineConfig::builder(provider())
        .fuse(FuseSpec::new(store(), "profiles"))
        .build()
        .unwrap();
    assert!(config.is_fused());
    assert!(format!("{config:?}").contains("profiles"));
}

#[test]
fn builder_rejects_empty_collection_name() {
    let err = EngineConfig::builder(provider())
        .fuse(FuseSpec::new(store(), ""))
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigError::EmptyCollectionName);
}

#[test]
fn builder_rejects_slash_in_collection_name() {
    let err = EngineConfig::builder(provider())
        .fuse(FuseSpec::new(store(), "a/b"))
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigError::InvalidCollectionName("a/b".into()));
}

#[test]
fn fuse_spec_from_settings_keeps_name() {
    let spec = FuseSpec::from_settings(store(), FuseSettings { collection_name: "people".into() });
    assert_eq!(spec.collection_name(), "people");
    assert!(spec.on_create.is_none());
}

#[test]
fn on_create_hook_is_stored() {
    let spec = FuseSpec::new(store(), "profiles").on_create(|user| {
        json!({ "email": user.email, "plan": "free" })
            .as_object()
            .cloned()
            .unwrap_or_default()
    });
    let hook = spec.on_create.clone().unwrap();
    let payload = hook(&ProviderUser::new("u1", "a@b.com"));
    assert_eq!(payload.get("plan"), Some(&json!("free")));
    assert!(format!("{spec:?}").contains("on_create: true"));
}
