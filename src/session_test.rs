use super::*;
use serde_json::json;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

// =============================================================================
// resolve_status
// =============================================================================

#[test]
fn created_is_unsolved() {
    assert_eq!(resolve_status(&Transition::Created, false), Some(Status::Unsolved));
    assert_eq!(resolve_status(&Transition::Created, true), Some(Status::Unsolved));
}

#[test]
fn signed_out_is_signed_out() {
    assert_eq!(resolve_status(&Transition::SignedOut, true), Some(Status::SignedOut));
}

#[test]
fn unverified_user_is_pending_with_or_without_fuse() {
    let user = ProviderUser::new("u1", "a@b.com");
    let t = Transition::SignedIn { user: &user, document: None };
    assert_eq!(resolve_status(&t, false), Some(Status::Pending));
    assert_eq!(resolve_status(&t, true), Some(Status::Pending));
}

#[test]
fn verified_user_without_fuse_is_signed_in() {
    let user = ProviderUser::new("u1", "a@b.com").verified(true);
    let t = Transition::SignedIn { user: &user, document: None };
    assert_eq!(resolve_status(&t, false), Some(Status::SignedIn));
}

#[test]
fn verified_user_with_fuse_waits_for_document() {
    let user = ProviderUser::new("u1", "a@b.com").verified(true);
    let waiting = Transition::SignedIn { user: &user, document: None };
    assert_eq!(resolve_status(&waiting, true), None);
    assert!(resolve_session(&waiting, true).is_none());

    let profile = Document::new();
    let loaded = Transition::SignedIn { user: &user, document: Some(&profile) };
    assert_eq!(resolve_status(&loaded, true), Some(Status::SignedIn));
}

// =============================================================================
// project_user_data
// =============================================================================

#[test]
fn projection_is_empty_without_user() {
    assert!(project_user_data(&Transition::Created).is_none());
    assert!(project_user_data(&Transition::SignedOut).is_none());
}

#[test]
fn projection_copies_provider_fields() {
    let mut user = ProviderUser::new("u1", "a@b.com").verified(true);
    user.display_name = Some("Ada".into());
    user.photo_url = Some("https://example.com/a.png".into());
    let data = project_user_data(&Transition::SignedIn { user: &user, document: None }).unwrap();

    assert_eq!(data.uid, "u1");
    assert_eq!(data.email.as_deref(), Some("a@b.com"));
    assert!(data.email_verified);
    assert_eq!(data.display_name.as_deref(), Some("Ada"));
    assert_eq!(data.photo_url.as_deref(), Some("https://example.com/a.png"));
    assert!(data.profile.is_empty());
}

#[test]
fn projection_merges_document_fields() {
    let user = ProviderUser::new("u1", "a@b.com").verified(true);
    let profile = doc(json!({"nickname": "x", "age": 3}));
    let data = project_user_data(&Transition::SignedIn { user: &user, document: Some(&profile) }).unwrap();
    assert_eq!(data.profile_field("nickname"), Some(&json!("x")));
    assert_eq!(data.profile_field("age"), Some(&json!(3)));
}

#[test]
fn provider_fields_win_over_document_fields() {
    let user = ProviderUser::new("u1", "a@b.com").verified(true);
    let profile = doc(json!({"email": "spoof@evil.com", "emailVerified": false, "photoURL": "x", "nickname": "n"}));
    let data = project_user_data(&Transition::SignedIn { user: &user, document: Some(&profile) }).unwrap();

    assert_eq!(data.email.as_deref(), Some("a@b.com"));
    assert!(data.email_verified);
    assert!(data.profile_field("email").is_none());
    assert!(data.profile_field("photoURL").is_none());

    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["email"], "a@b.com");
    assert_eq!(json["emailVerified"], true);
    assert_eq!(json["nickname"], "n");
}

// =============================================================================
// Serialization
// =============================================================================

#[test]
fn status_serializes_to_upper_case_names() {
    assert_eq!(serde_json::to_value(Status::SignedOut).unwrap(), json!("SIGNEDOUT"));
    assert_eq!(serde_json::to_value(Status::Pending).unwrap(), json!("PENDING"));
    assert_eq!(Status::SignedIn.to_string(), "SIGNEDIN");
}

#[test]
fn status_accepts_unverified_alias() {
    let status: Status = serde_json::from_value(json!("UNVERIFIED")).unwrap();
    assert_eq!(status, Status::Pending);
}

#[test]
fn session_serializes_camel_case() {
    let user = ProviderUser::new("u1", "a@b.com");
    let session = resolve_session(&Transition::SignedIn { user: &user, document: None }, false).unwrap();
    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["userData"]["uid"], "u1");
    assert_eq!(json["userData"]["isAnonymous"], false);
}

#[test]
fn default_session_is_unsolved() {
    let session = Session::default();
    assert_eq!(session.status, Status::Unsolved);
    assert!(session.user_data.is_none());
    assert!(!session.status.has_user());
}
