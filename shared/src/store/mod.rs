//! Persistence seam between the handlers and the document store.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use crate::error::Result;
use crate::types::{ActivityEntry, AppUser, Connection, Lead, LeadStatus, PendingApproval, Team};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// Conditional write against a single lead.
///
/// The store applies the changes only if the stored status is one of
/// `expected_status` (and, with `require_unassigned`, no closer is set).
/// A failed condition is a `Conflict`; a missing lead is `NotFound`.
#[derive(Debug, Clone)]
pub struct LeadUpdate {
    pub lead_id: String,
    pub expected_status: Vec<LeadStatus>,
    pub require_unassigned: bool,
    pub status: Option<LeadStatus>,
    /// (closer id, closer name)
    pub assigned_closer: Option<(String, String)>,
    pub scheduled_appointment_time: Option<DateTime<FixedOffset>>,
    pub setter_verified: Option<bool>,
    pub disposition_notes: Option<String>,
    pub append_photo_urls: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl LeadUpdate {
    pub fn new(lead_id: &str, expected_status: &[LeadStatus]) -> Self {
        Self {
            lead_id: lead_id.to_string(),
            expected_status: expected_status.to_vec(),
            require_unassigned: false,
            status: None,
            assigned_closer: None,
            scheduled_appointment_time: None,
            setter_verified: None,
            disposition_notes: None,
            append_photo_urls: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Apply the changes to an in-memory copy.
    pub fn apply_to(&self, lead: &mut Lead) {
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some((id, name)) = &self.assigned_closer {
            lead.assigned_closer_id = Some(id.clone());
            lead.assigned_closer_name = Some(name.clone());
        }
        if let Some(at) = self.scheduled_appointment_time {
            lead.scheduled_appointment_time = Some(at);
        }
        if let Some(verified) = self.setter_verified {
            lead.setter_verified = verified;
        }
        if let Some(notes) = &self.disposition_notes {
            lead.disposition_notes = notes.clone();
        }
        lead.photo_urls.extend(self.append_photo_urls.iter().cloned());
        lead.updated_at = self.updated_at;
    }
}

#[async_trait]
pub trait DispatchStore: Send + Sync {
    // --- LEADS ---
    async fn insert_lead(&self, lead: &Lead) -> Result<()>;
    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>>;
    async fn list_team_leads(&self, team_id: &str) -> Result<Vec<Lead>>;
    async fn list_all_leads(&self) -> Result<Vec<Lead>>;
    async fn update_lead(&self, update: &LeadUpdate) -> Result<Lead>;
    async fn append_activity(&self, entry: &ActivityEntry) -> Result<()>;
    async fn list_activity(&self, lead_id: &str) -> Result<Vec<ActivityEntry>>;

    // --- USERS ---
    /// Fails with `Conflict` when the user already exists.
    async fn insert_user(&self, user: &AppUser) -> Result<()>;
    async fn get_user(&self, user_id: &str) -> Result<Option<AppUser>>;
    async fn save_user(&self, user: &AppUser) -> Result<()>;
    async fn list_team_users(&self, team_id: &str) -> Result<Vec<AppUser>>;
    async fn put_pending_approval(&self, pending: &PendingApproval) -> Result<()>;
    async fn remove_pending_approval(&self, user_id: &str) -> Result<()>;
    async fn list_pending_approvals(&self) -> Result<Vec<PendingApproval>>;

    // --- TEAMS ---
    async fn insert_team(&self, team: &Team) -> Result<()>;
    async fn get_team(&self, team_id: &str) -> Result<Option<Team>>;
    async fn list_teams(&self) -> Result<Vec<Team>>;

    // --- CONNECTIONS ---
    async fn save_connection(&self, connection: &Connection) -> Result<()>;
    async fn remove_connection(&self, connection_id: &str) -> Result<()>;
    async fn list_team_connections(&self, team_id: &str) -> Result<Vec<Connection>>;
}
