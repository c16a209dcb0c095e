use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{DispatchStore, LeadUpdate};
use crate::error::{DispatchError, Result};
use crate::types::{ActivityEntry, AppUser, Connection, Lead, PendingApproval, Team};

#[derive(Default)]
struct Tables {
    leads: HashMap<String, Lead>,
    activity: HashMap<String, Vec<ActivityEntry>>,
    users: HashMap<String, AppUser>,
    pending: HashMap<String, PendingApproval>,
    teams: HashMap<String, Team>,
    connections: HashMap<String, Connection>,
}

/// Process-local store with the same conditional-write semantics as
/// `DynamoStore`. Used by tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| DispatchError::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.leads.contains_key(&lead.lead_id) {
            return Err(DispatchError::Conflict(format!("Lead {} already exists", lead.lead_id)));
        }
        tables.leads.insert(lead.lead_id.clone(), lead.clone());
        Ok(())
    }

    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>> {
        Ok(self.lock()?.leads.get(lead_id).cloned())
    }

    async fn list_team_leads(&self, team_id: &str) -> Result<Vec<Lead>> {
        let tables = self.lock()?;
        let mut leads: Vec<Lead> = tables
            .leads
            .values()
            .filter(|lead| lead.team_id == team_id)
            .cloned()
            .collect();
        leads.sort_by_key(|lead| lead.created_at);
        Ok(leads)
    }

    async fn list_all_leads(&self) -> Result<Vec<Lead>> {
        let tables = self.lock()?;
        let mut leads: Vec<Lead> = tables.leads.values().cloned().collect();
        leads.sort_by_key(|lead| lead.created_at);
        Ok(leads)
    }

    async fn update_lead(&self, update: &LeadUpdate) -> Result<Lead> {
        let mut tables = self.lock()?;
        let lead = tables
            .leads
            .get_mut(&update.lead_id)
            .ok_or_else(|| DispatchError::NotFound("Lead not found".to_string()))?;

        if !update.expected_status.contains(&lead.status) {
            return Err(DispatchError::Conflict(format!(
                "Lead is now {}",
                lead.status.as_str()
            )));
        }
        if update.require_unassigned && lead.assigned_closer_id.is_some() {
            return Err(DispatchError::Conflict("Lead was already accepted".to_string()));
        }

        update.apply_to(lead);
        Ok(lead.clone())
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        self.lock()?
            .activity
            .entry(entry.lead_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_activity(&self, lead_id: &str) -> Result<Vec<ActivityEntry>> {
        Ok(self.lock()?.activity.get(lead_id).cloned().unwrap_or_default())
    }

    async fn insert_user(&self, user: &AppUser) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.users.contains_key(&user.user_id) {
            return Err(DispatchError::Conflict("User profile already exists".to_string()));
        }
        tables.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<AppUser>> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    async fn save_user(&self, user: &AppUser) -> Result<()> {
        self.lock()?.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn list_team_users(&self, team_id: &str) -> Result<Vec<AppUser>> {
        let tables = self.lock()?;
        let mut users: Vec<AppUser> = tables
            .users
            .values()
            .filter(|user| user.belongs_to(team_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    async fn put_pending_approval(&self, pending: &PendingApproval) -> Result<()> {
        self.lock()?
            .pending
            .insert(pending.user_id.clone(), pending.clone());
        Ok(())
    }

    async fn remove_pending_approval(&self, user_id: &str) -> Result<()> {
        self.lock()?.pending.remove(user_id);
        Ok(())
    }

    async fn list_pending_approvals(&self) -> Result<Vec<PendingApproval>> {
        let tables = self.lock()?;
        let mut pending: Vec<PendingApproval> = tables.pending.values().cloned().collect();
        pending.sort_by_key(|p| p.requested_at);
        Ok(pending)
    }

    async fn insert_team(&self, team: &Team) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.teams.contains_key(&team.team_id) {
            return Err(DispatchError::Conflict(format!("Team {} already exists", team.team_id)));
        }
        tables.teams.insert(team.team_id.clone(), team.clone());
        Ok(())
    }

    async fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        Ok(self.lock()?.teams.get(team_id).cloned())
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let tables = self.lock()?;
        let mut teams: Vec<Team> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn save_connection(&self, connection: &Connection) -> Result<()> {
        self.lock()?
            .connections
            .insert(connection.connection_id.clone(), connection.clone());
        Ok(())
    }

    async fn remove_connection(&self, connection_id: &str) -> Result<()> {
        self.lock()?.connections.remove(connection_id);
        Ok(())
    }

    async fn list_team_connections(&self, team_id: &str) -> Result<Vec<Connection>> {
        let tables = self.lock()?;
        Ok(tables
            .connections
            .values()
            .filter(|c| c.team_id.as_deref() == Some(team_id))
            .cloned()
            .collect())
    }
}
