//! Signup profiles, approval and team administration.

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{harness, TEAM_A, TEAM_B};
use dispatch_shared::email::{ApprovalMailer, LogMailer};
use dispatch_shared::error::{DispatchError, Result};
use dispatch_shared::store::DispatchStore;
use dispatch_shared::teams;
use dispatch_shared::types::{AppUser, CreateTeamRequest, CreateUserRequest, Role, UserStatus};
use dispatch_shared::users;

struct CountingMailer {
    sent: AtomicUsize,
}

#[async_trait]
impl ApprovalMailer for CountingMailer {
    async fn send_approval(&self, _user: &AppUser) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct BrokenMailer;

#[async_trait]
impl ApprovalMailer for BrokenMailer {
    async fn send_approval(&self, _user: &AppUser) -> Result<()> {
        Err(DispatchError::Internal("mail relay down".to_string()))
    }
}

fn signup(role: Role, team: Option<&str>) -> CreateUserRequest {
    CreateUserRequest {
        name: "Riley Novak".to_string(),
        email: "riley@example.com".to_string(),
        requested_role: role,
        team_id: team.map(|t| t.to_string()),
    }
}

#[tokio::test]
async fn test_profile_starts_pending() {
    let h = harness().await;
    let store = h.store.as_ref();

    let user = users::create_profile(store, "new-1", signup(Role::Closer, Some(TEAM_A)))
        .await
        .unwrap();
    assert_eq!(user.role, Role::Pending);
    assert_eq!(user.status, UserStatus::PendingApproval);
    assert!(!user.is_active());

    let pending = store.list_pending_approvals().await.unwrap();
    let request = pending.iter().find(|p| p.user_id == "new-1").unwrap();
    assert_eq!(request.requested_role, Role::Closer);
    assert_eq!(request.team_id.as_deref(), Some(TEAM_A));

    let duplicate = users::create_profile(store, "new-1", signup(Role::Closer, Some(TEAM_A))).await;
    assert!(matches!(duplicate, Err(DispatchError::Conflict(_))));
}

#[tokio::test]
async fn test_profile_validation() {
    let h = harness().await;
    let store = h.store.as_ref();

    let mut bad_email = signup(Role::Setter, None);
    bad_email.email = "riley.example.com".to_string();
    assert!(matches!(
        users::create_profile(store, "u", bad_email).await,
        Err(DispatchError::InvalidArgument(_))
    ));

    assert!(matches!(
        users::create_profile(store, "u", signup(Role::Pending, None)).await,
        Err(DispatchError::InvalidArgument(_))
    ));

    assert!(matches!(
        users::create_profile(store, "u", signup(Role::Setter, Some("team-z"))).await,
        Err(DispatchError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_pending_list_is_scoped_to_team() {
    let h = harness().await;
    let store = h.store.as_ref();
    users::create_profile(store, "new-a", signup(Role::Setter, Some(TEAM_A))).await.unwrap();
    users::create_profile(store, "new-b", signup(Role::Closer, Some(TEAM_B))).await.unwrap();
    users::create_profile(store, "new-none", signup(Role::Closer, None)).await.unwrap();

    let mine = users::list_pending_approvals(store, &h.manager).await.unwrap();
    let ids: Vec<&str> = mine.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(ids, vec!["new-a"]);

    let all = users::list_pending_approvals(store, &h.admin).await.unwrap();
    assert_eq!(all.len(), 3);

    let by_setter = users::list_pending_approvals(store, &h.setter).await;
    assert!(matches!(by_setter, Err(DispatchError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_manager_approves_own_team() {
    let h = harness().await;
    let store = h.store.as_ref();
    let mailer = CountingMailer {
        sent: AtomicUsize::new(0),
    };
    users::create_profile(store, "new-a", signup(Role::Closer, Some(TEAM_A))).await.unwrap();

    let denied = users::approve_user(store, &mailer, &h.other_team_manager, "new-a").await;
    assert!(matches!(denied, Err(DispatchError::PermissionDenied(_))));

    let by_closer = users::approve_user(store, &mailer, &h.closer, "new-a").await;
    assert!(matches!(by_closer, Err(DispatchError::PermissionDenied(_))));

    let approved = users::approve_user(store, &mailer, &h.manager, "new-a").await.unwrap();
    assert_eq!(approved.role, Role::Closer);
    assert_eq!(approved.status, UserStatus::Active);
    assert_eq!(mailer.sent.load(Ordering::SeqCst), 1);
    assert!(store.list_pending_approvals().await.unwrap().is_empty());

    let again = users::approve_user(store, &mailer, &h.manager, "new-a").await;
    assert!(matches!(again, Err(DispatchError::FailedPrecondition(_))));
    assert_eq!(mailer.sent.load(Ordering::SeqCst), 1);

    let closers = teams::list_team_closers(store, &h.manager, TEAM_A).await.unwrap();
    assert!(closers.iter().any(|u| u.user_id == "new-a"));
}

#[tokio::test]
async fn test_approval_survives_mail_failure() {
    let h = harness().await;
    let store = h.store.as_ref();
    users::create_profile(store, "new-a", signup(Role::Setter, Some(TEAM_A))).await.unwrap();

    let approved = users::approve_user(store, &BrokenMailer, &h.admin, "new-a").await.unwrap();
    assert_eq!(approved.role, Role::Setter);

    let stored = store.get_user("new-a").await.unwrap().unwrap();
    assert!(stored.is_active());
}

#[tokio::test]
async fn test_signup_retry_restores_lost_request() {
    let h = harness().await;
    let store = h.store.as_ref();
    users::create_profile(store, "new-a", signup(Role::Closer, Some(TEAM_A))).await.unwrap();
    // Profile written, approval request lost
    store.remove_pending_approval("new-a").await.unwrap();
    assert!(users::list_pending_approvals(store, &h.manager).await.unwrap().is_empty());

    let retried = users::create_profile(store, "new-a", signup(Role::Closer, Some(TEAM_A)))
        .await
        .unwrap();
    assert_eq!(retried.status, UserStatus::PendingApproval);

    let mine = users::list_pending_approvals(store, &h.manager).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].requested_role, Role::Closer);

    // With the request in place a repeat is a plain duplicate
    let duplicate = users::create_profile(store, "new-a", signup(Role::Closer, Some(TEAM_A))).await;
    assert!(matches!(duplicate, Err(DispatchError::Conflict(_))));

    // Active accounts never get a request back
    let active = users::create_profile(store, "closer-1", signup(Role::Admin, Some(TEAM_A))).await;
    assert!(matches!(active, Err(DispatchError::Conflict(_))));
    assert_eq!(store.list_pending_approvals().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeat_approval_clears_stale_request() {
    let h = harness().await;
    let store = h.store.as_ref();
    users::create_profile(store, "new-a", signup(Role::Setter, Some(TEAM_A))).await.unwrap();
    let request = store.list_pending_approvals().await.unwrap().remove(0);

    users::approve_user(store, &LogMailer, &h.manager, "new-a").await.unwrap();
    // User activated, request removal lost
    store.put_pending_approval(&request).await.unwrap();

    let again = users::approve_user(store, &LogMailer, &h.manager, "new-a").await;
    assert!(matches!(again, Err(DispatchError::FailedPrecondition(_))));
    assert!(store.list_pending_approvals().await.unwrap().is_empty());
    assert!(store.get_user("new-a").await.unwrap().unwrap().is_active());
}

#[tokio::test]
async fn test_teamless_signup_needs_admin() {
    let h = harness().await;
    let store = h.store.as_ref();
    users::create_profile(store, "drifter", signup(Role::Closer, None)).await.unwrap();

    let by_manager = users::approve_user(store, &LogMailer, &h.manager, "drifter").await;
    assert!(matches!(by_manager, Err(DispatchError::PermissionDenied(_))));

    let by_manager_assign = users::assign_team(store, &h.manager, "drifter", TEAM_A).await;
    assert!(matches!(by_manager_assign, Err(DispatchError::PermissionDenied(_))));

    let moved = users::assign_team(store, &h.admin, "drifter", TEAM_A).await.unwrap();
    assert_eq!(moved.team_id.as_deref(), Some(TEAM_A));

    // Now visible to, and approvable by, the team's manager
    let mine = users::list_pending_approvals(store, &h.manager).await.unwrap();
    assert_eq!(mine.len(), 1);
    users::approve_user(store, &LogMailer, &h.manager, "drifter").await.unwrap();
}

#[tokio::test]
async fn test_set_role_is_admin_only() {
    let h = harness().await;
    let store = h.store.as_ref();

    let by_manager = users::set_role(store, &h.manager, "closer-1", Role::Manager).await;
    assert!(matches!(by_manager, Err(DispatchError::PermissionDenied(_))));

    let to_pending = users::set_role(store, &h.admin, "closer-1", Role::Pending).await;
    assert!(matches!(to_pending, Err(DispatchError::InvalidArgument(_))));

    let promoted = users::set_role(store, &h.admin, "closer-1", Role::Manager).await.unwrap();
    assert_eq!(promoted.role, Role::Manager);

    let closers = teams::list_team_closers(store, &h.manager, TEAM_A).await.unwrap();
    let ids: Vec<&str> = closers.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec!["closer-2"]);
}

#[tokio::test]
async fn test_create_team() {
    let h = harness().await;
    let store = h.store.as_ref();
    let req = |offset| CreateTeamRequest {
        name: "Charlie".to_string(),
        region_id: "east".to_string(),
        utc_offset_minutes: offset,
    };

    let by_manager = teams::create_team(store, &h.manager, req(-300)).await;
    assert!(matches!(by_manager, Err(DispatchError::PermissionDenied(_))));

    for offset in [24 * 60, i32::MAX, i32::MIN] {
        let bad_offset = teams::create_team(store, &h.admin, req(offset)).await;
        assert!(matches!(bad_offset, Err(DispatchError::InvalidArgument(_))));
    }

    let team = teams::create_team(store, &h.admin, req(-300)).await.unwrap();
    assert_eq!(team.utc_offset_minutes, -300);
    assert_eq!(teams::list_teams(store, &h.setter).await.unwrap().len(), 3);

    let hidden = teams::get_team(store, &h.manager, &team.team_id).await;
    assert!(matches!(hidden, Err(DispatchError::PermissionDenied(_))));
}
