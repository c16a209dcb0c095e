//! Profiles, pending approvals and role/team administration.

use chrono::Utc;

use crate::email::ApprovalMailer;
use crate::error::{DispatchError, Result};
use crate::guard;
use crate::store::DispatchStore;
use crate::types::{AppUser, CreateUserRequest, PendingApproval, Role, UserStatus};

async fn load_user(store: &dyn DispatchStore, user_id: &str) -> Result<AppUser> {
    store
        .get_user(user_id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("User {} not found", user_id)))
}

async fn find_pending(store: &dyn DispatchStore, user_id: &str) -> Result<Option<PendingApproval>> {
    Ok(store
        .list_pending_approvals()
        .await?
        .into_iter()
        .find(|p| p.user_id == user_id))
}

async fn ensure_team_exists(store: &dyn DispatchStore, team_id: &str) -> Result<()> {
    match store.get_team(team_id).await? {
        Some(_) => Ok(()),
        None => Err(DispatchError::NotFound(format!("Team {} not found", team_id))),
    }
}

/// Create the caller's profile right after signup.
///
/// The account starts as `pending` until a manager or admin approves the
/// requested role. The profile and its approval request are two writes;
/// repeating the call after a failure between them restores the request.
pub async fn create_profile(store: &dyn DispatchStore, user_id: &str, req: CreateUserRequest) -> Result<AppUser> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() {
        return Err(DispatchError::InvalidArgument("name is required".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(DispatchError::InvalidArgument("A valid email is required".to_string()));
    }
    if req.requested_role == Role::Pending {
        return Err(DispatchError::InvalidArgument(
            "requested_role must be setter, closer, manager or admin".to_string(),
        ));
    }

    let team_id = req
        .team_id
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if let Some(team_id) = &team_id {
        ensure_team_exists(store, team_id).await?;
    }

    let now = Utc::now();
    let user = AppUser {
        user_id: user_id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role: Role::Pending,
        team_id: team_id.clone(),
        status: UserStatus::PendingApproval,
        created_at: now,
    };
    let pending = PendingApproval {
        user_id: user_id.to_string(),
        team_id,
        requested_role: req.requested_role,
        requested_at: now,
    };

    if let Err(e) = store.insert_user(&user).await {
        if !matches!(e, DispatchError::Conflict(_)) {
            return Err(e);
        }
        let existing = load_user(store, user_id).await?;
        if existing.status != UserStatus::PendingApproval || find_pending(store, user_id).await?.is_some() {
            return Err(e);
        }
        tracing::warn!("Restoring missing approval request for {}", user_id);
        store
            .put_pending_approval(&PendingApproval {
                team_id: existing.team_id.clone(),
                requested_at: existing.created_at,
                ..pending
            })
            .await?;
        return Ok(existing);
    }

    if let Err(e) = store.put_pending_approval(&pending).await {
        tracing::error!(
            "Profile {} stored without its approval request; a retry will restore it: {}",
            user_id,
            e
        );
        return Err(e);
    }

    tracing::info!(
        "Profile created for {} (requested {})",
        user_id,
        req.requested_role.as_str()
    );
    Ok(user)
}

pub async fn get_profile(store: &dyn DispatchStore, user_id: &str) -> Result<AppUser> {
    load_user(store, user_id).await
}

/// Admins see every request; managers see their own team's.
pub async fn list_pending_approvals(store: &dyn DispatchStore, actor: &AppUser) -> Result<Vec<PendingApproval>> {
    if !actor.is_active() || !actor.role.is_supervisor() {
        return Err(DispatchError::PermissionDenied(
            "Only managers and admins may review approvals".to_string(),
        ));
    }

    let pending = store.list_pending_approvals().await?;
    if actor.role == Role::Admin {
        return Ok(pending);
    }
    Ok(pending
        .into_iter()
        .filter(|p| p.team_id.is_some() && p.team_id == actor.team_id)
        .collect())
}

/// Activate a pending account with the role it asked for. The approval
/// email is best effort.
pub async fn approve_user(
    store: &dyn DispatchStore,
    mailer: &dyn ApprovalMailer,
    actor: &AppUser,
    user_id: &str,
) -> Result<AppUser> {
    let mut user = load_user(store, user_id).await?;

    if !guard::can_approve_user(actor, &user) {
        return Err(DispatchError::PermissionDenied(format!(
            "{} may not approve user {}",
            actor.role.as_str(),
            user_id
        )));
    }
    let pending = find_pending(store, &user.user_id).await?;
    if user.status == UserStatus::Active {
        // Left over from an approval whose second write failed
        if pending.is_some() {
            tracing::warn!("Clearing stale approval request for active user {}", user_id);
            store.remove_pending_approval(&user.user_id).await?;
        }
        return Err(DispatchError::FailedPrecondition(format!(
            "User {} is already active",
            user_id
        )));
    }

    let role = match pending {
        Some(p) => p.requested_role,
        None if user.role != Role::Pending => user.role,
        None => {
            return Err(DispatchError::FailedPrecondition(format!(
                "User {} has no requested role; set one first",
                user_id
            )))
        }
    };

    user.role = role;
    user.status = UserStatus::Active;
    store.save_user(&user).await?;
    if let Err(e) = store.remove_pending_approval(&user.user_id).await {
        tracing::error!(
            "User {} activated but approval request not cleared; approving again clears it: {}",
            user.user_id,
            e
        );
        return Err(e);
    }

    tracing::info!("User {} approved as {} by {}", user.user_id, role.as_str(), actor.user_id);

    if let Err(e) = mailer.send_approval(&user).await {
        tracing::error!("Approval email for {} failed: {}", user.user_id, e);
    }
    Ok(user)
}

pub async fn assign_team(store: &dyn DispatchStore, actor: &AppUser, user_id: &str, team_id: &str) -> Result<AppUser> {
    if !guard::can_administer_teams(actor) {
        return Err(DispatchError::PermissionDenied(
            "Only admins may assign teams".to_string(),
        ));
    }
    let team_id = team_id.trim();
    if team_id.is_empty() {
        return Err(DispatchError::InvalidArgument("team_id is required".to_string()));
    }
    ensure_team_exists(store, team_id).await?;

    let mut user = load_user(store, user_id).await?;
    user.team_id = Some(team_id.to_string());
    store.save_user(&user).await?;

    // Keep an open request visible to the new team's managers.
    if let Some(mut pending) = find_pending(store, &user.user_id).await? {
        pending.team_id = Some(team_id.to_string());
        store.put_pending_approval(&pending).await?;
    }

    tracing::info!("User {} moved to team {} by {}", user.user_id, team_id, actor.user_id);
    Ok(user)
}

pub async fn set_role(store: &dyn DispatchStore, actor: &AppUser, user_id: &str, role: Role) -> Result<AppUser> {
    if !guard::can_administer_teams(actor) {
        return Err(DispatchError::PermissionDenied(
            "Only admins may change roles".to_string(),
        ));
    }
    if role == Role::Pending {
        return Err(DispatchError::InvalidArgument(
            "Use approval to manage pending accounts".to_string(),
        ));
    }

    let mut user = load_user(store, user_id).await?;
    user.role = role;
    store.save_user(&user).await?;

    tracing::info!("User {} is now {} (set by {})", user.user_id, role.as_str(), actor.user_id);
    Ok(user)
}
