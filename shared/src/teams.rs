use crate::error::{DispatchError, Result};
use crate::guard;
use crate::schedule;
use crate::store::DispatchStore;
use crate::types::{AppUser, CreateTeamRequest, Role, Team};

pub async fn create_team(store: &dyn DispatchStore, actor: &AppUser, req: CreateTeamRequest) -> Result<Team> {
    if !guard::can_administer_teams(actor) {
        return Err(DispatchError::PermissionDenied(
            "Only admins may create teams".to_string(),
        ));
    }

    let name = req.name.trim();
    if name.is_empty() {
        return Err(DispatchError::InvalidArgument("name is required".to_string()));
    }
    schedule::team_offset(req.utc_offset_minutes)?;

    let team = Team {
        team_id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        region_id: req.region_id.trim().to_string(),
        utc_offset_minutes: req.utc_offset_minutes,
    };
    store.insert_team(&team).await?;

    tracing::info!("Team {} ({}) created by {}", team.team_id, team.name, actor.user_id);
    Ok(team)
}

pub async fn list_teams(store: &dyn DispatchStore, actor: &AppUser) -> Result<Vec<Team>> {
    if !actor.is_active() {
        return Err(DispatchError::PermissionDenied("Account is not active".to_string()));
    }
    store.list_teams().await
}

pub async fn get_team(store: &dyn DispatchStore, actor: &AppUser, team_id: &str) -> Result<Team> {
    if !guard::can_view_team(actor, team_id) {
        return Err(DispatchError::PermissionDenied(format!("Cannot view team {}", team_id)));
    }
    store
        .get_team(team_id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("Team {} not found", team_id)))
}

/// Active closers of a team, for the assignment picker.
pub async fn list_team_closers(store: &dyn DispatchStore, actor: &AppUser, team_id: &str) -> Result<Vec<AppUser>> {
    let team = get_team(store, actor, team_id).await?;
    Ok(store
        .list_team_users(&team.team_id)
        .await?
        .into_iter()
        .filter(|user| user.role == Role::Closer && user.is_active())
        .collect())
}
