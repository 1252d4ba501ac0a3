//! End-to-end session flows against the in-process provider: startup
//! resolution, sign-up/sign-in/sign-out, profile updates, and teardown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use homeroom::error::{AppError, ErrorSurface};
use homeroom::identity::{
    decide, profile_row, Filter, GateDecision, IdentityProvider, MemoryProvider, ProfileFields,
    Role, SessionManager, Snapshot, PROFILES_TABLE,
};

fn teacher_fields() -> ProfileFields {
    ProfileFields {
        name: "A".into(),
        role: Role::Teacher,
        class: None,
        subject: Some("Math".into()),
    }
}

fn student_fields() -> ProfileFields {
    ProfileFields {
        name: "S".into(),
        role: Role::Student,
        class: Some("9B".into()),
        subject: None,
    }
}

// Push events land asynchronously; poll until the snapshot satisfies `pred`.
async fn wait_for(manager: &SessionManager, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
    for _ in 0..200 {
        let s = manager.snapshot();
        if pred(&s) {
            return s;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("snapshot did not settle: {:?}", manager.snapshot());
}

#[tokio::test]
async fn snapshot_before_initialize_is_loading_and_gate_pends() {
    let manager = SessionManager::new(Arc::new(MemoryProvider::new()));
    let s = manager.snapshot();
    assert!(s.loading);
    assert!(s.user.is_none());
    assert!(s.profile.is_none());
    // while loading, the gate may only pend, never redirect
    assert_eq!(decide(&s, None), GateDecision::Pending);
    assert_eq!(decide(&s, Some(Role::Teacher)), GateDecision::Pending);
}

#[tokio::test]
async fn initialize_without_stored_session_settles_anonymous() -> Result<()> {
    let manager = SessionManager::new(Arc::new(MemoryProvider::new()));
    manager.initialize().await?;
    let s = manager.snapshot();
    assert_eq!(s, Snapshot::anonymous());
    assert_eq!(decide(&s, None), GateDecision::Redirect("/login"));
    Ok(())
}

#[tokio::test]
async fn initialize_restores_stored_session_and_profile() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let user = provider.sign_up("a@x.com", "secret123").await?;
    provider
        .insert(PROFILES_TABLE, vec![profile_row(&user, &teacher_fields())])
        .await?;

    let manager = SessionManager::new(provider);
    manager.initialize().await?;
    let s = manager.snapshot();
    assert!(!s.loading);
    assert_eq!(s.user.as_ref().map(|u| u.email.as_str()), Some("a@x.com"));
    assert_eq!(s.profile.as_ref().map(|p| p.role), Some(Role::Teacher));
    Ok(())
}

#[tokio::test]
async fn sign_up_creates_profile_row_and_settles_snapshot() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider.clone());
    manager.initialize().await?;

    let user = manager.sign_up("a@x.com", "secret123", teacher_fields()).await?;

    let rows = provider.select(PROFILES_TABLE, &Filter::eq("id", user.id.clone())).await?;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("email").unwrap(), "a@x.com");
    assert_eq!(row.get("name").unwrap(), "A");
    assert_eq!(row.get("role").unwrap(), "teacher");
    assert_eq!(row.get("subject").unwrap(), "Math");

    let s = wait_for(&manager, |s| {
        !s.loading && s.user.is_some() && s.profile.is_some()
    })
    .await;
    assert_eq!(s.user.unwrap().email, "a@x.com");
    assert_eq!(s.profile.unwrap().role, Role::Teacher);
    Ok(())
}

#[tokio::test]
async fn sign_in_updates_snapshot_through_push_event() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider.clone());
    manager.initialize().await?;

    manager.sign_up("s@x.com", "secret123", student_fields()).await?;
    wait_for(&manager, |s| s.profile.is_some()).await;
    manager.sign_out().await?;
    wait_for(&manager, |s| s.user.is_none() && !s.loading).await;

    manager.sign_in("s@x.com", "secret123").await?;
    let s = wait_for(&manager, |s| s.user.is_some() && s.profile.is_some()).await;
    assert_eq!(s.profile.unwrap().role, Role::Student);
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_surface_inline_and_leave_snapshot_alone() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider.clone());
    manager.initialize().await?;
    manager.sign_up("s@x.com", "secret123", student_fields()).await?;
    wait_for(&manager, |s| s.profile.is_some()).await;
    manager.sign_out().await?;
    wait_for(&manager, |s| s.user.is_none() && !s.loading).await;

    let err = manager.sign_in("s@x.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    assert_eq!(err.surface(), ErrorSurface::InlineForm);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.snapshot(), Snapshot::anonymous());
    Ok(())
}

#[tokio::test]
async fn sign_out_clears_user_and_profile() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider);
    manager.initialize().await?;
    manager.sign_up("s@x.com", "secret123", student_fields()).await?;
    wait_for(&manager, |s| s.profile.is_some()).await;
    // let any second in-flight resolution land before observing the clear
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.sign_out().await?;
    // profile is cleared eagerly, before the push event arrives
    assert!(manager.snapshot().profile.is_none());
    let s = wait_for(&manager, |s| s.user.is_none()).await;
    assert_eq!(s, Snapshot::anonymous());
    Ok(())
}

#[tokio::test]
async fn update_profile_adopts_server_confirmed_row() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider.clone());
    manager.initialize().await?;
    let user = manager.sign_up("s@x.com", "secret123", student_fields()).await?;
    wait_for(&manager, |s| s.profile.is_some()).await;

    let mut updates = homeroom::identity::Row::new();
    updates.insert("name".into(), serde_json::Value::from("Aanya"));
    let profile = manager.update_profile(updates).await?;
    assert_eq!(profile.name, "Aanya");
    assert_eq!(manager.snapshot().profile.unwrap().name, "Aanya");

    let rows = provider.select(PROFILES_TABLE, &Filter::eq("id", user.id)).await?;
    assert_eq!(rows[0].get("name").unwrap(), "Aanya");
    Ok(())
}

#[tokio::test]
async fn update_profile_without_user_is_an_auth_error() -> Result<()> {
    let manager = SessionManager::new(Arc::new(MemoryProvider::new()));
    manager.initialize().await?;
    let err = manager.update_profile(homeroom::identity::Row::new()).await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    Ok(())
}

#[tokio::test]
async fn teardown_is_idempotent_and_stops_event_delivery() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider.clone());
    manager.initialize().await?;

    manager.teardown();
    manager.teardown(); // second call is a no-op, not a fault

    // events after teardown must not mutate the snapshot
    provider.sign_up("late@x.com", "secret123").await?;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(manager.snapshot().user.is_none());
    Ok(())
}

#[tokio::test]
async fn second_initialize_is_rejected() -> Result<()> {
    let manager = SessionManager::new(Arc::new(MemoryProvider::new()));
    manager.initialize().await?;
    let err = manager.initialize().await.unwrap_err();
    assert!(matches!(err, AppError::Internal { .. }));
    Ok(())
}

#[tokio::test]
async fn token_refresh_keeps_identity_and_profile() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let manager = SessionManager::new(provider.clone());
    manager.initialize().await?;
    manager.sign_up("s@x.com", "secret123", student_fields()).await?;
    wait_for(&manager, |s| s.profile.is_some()).await;

    provider.refresh_token().expect("live session to refresh");
    tokio::time::sleep(Duration::from_millis(30)).await;
    let s = manager.snapshot();
    assert_eq!(s.user.as_ref().map(|u| u.email.as_str()), Some("s@x.com"));
    assert_eq!(s.profile.as_ref().map(|p| p.role), Some(Role::Student));
    Ok(())
}
