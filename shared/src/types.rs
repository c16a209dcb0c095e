use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

// ========== LEAD ==========

/// Pipeline status of a lead.
///
/// `in_process` is read as `accepted`; only `accepted` is ever written.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    WaitingAssignment,
    #[serde(alias = "in_process")]
    Accepted,
    Scheduled,
    Rescheduled,
    NeedsVerification,
    Completed,
}

impl LeadStatus {
    /// Statuses that promise a future appointment.
    pub const SCHEDULED_FAMILY: [LeadStatus; 3] = [
        LeadStatus::Scheduled,
        LeadStatus::Rescheduled,
        LeadStatus::NeedsVerification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::WaitingAssignment => "waiting_assignment",
            LeadStatus::Accepted => "accepted",
            LeadStatus::Scheduled => "scheduled",
            LeadStatus::Rescheduled => "rescheduled",
            LeadStatus::NeedsVerification => "needs_verification",
            LeadStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting_assignment" => Some(LeadStatus::WaitingAssignment),
            "accepted" | "in_process" => Some(LeadStatus::Accepted),
            "scheduled" => Some(LeadStatus::Scheduled),
            "rescheduled" => Some(LeadStatus::Rescheduled),
            "needs_verification" => Some(LeadStatus::NeedsVerification),
            "completed" => Some(LeadStatus::Completed),
            _ => None,
        }
    }

    pub fn is_scheduled_family(&self) -> bool {
        Self::SCHEDULED_FAMILY.contains(self)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchType {
    Immediate,
    Scheduled,
}

impl DispatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchType::Immediate => "immediate",
            DispatchType::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "immediate" => Some(DispatchType::Immediate),
            "scheduled" => Some(DispatchType::Scheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lead {
    pub lead_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub status: LeadStatus,
    pub dispatch_type: DispatchType,
    pub team_id: String,
    pub setter_id: Option<String>,
    pub setter_name: Option<String>,
    pub assigned_closer_id: Option<String>,
    pub assigned_closer_name: Option<String>,
    /// Keeps the team's offset so the local calendar date survives storage.
    pub scheduled_appointment_time: Option<DateTime<FixedOffset>>,
    pub setter_verified: bool,
    pub disposition_notes: String,
    pub photo_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub dispatch_type: DispatchType,
    /// Defaults to the caller's team.
    pub team_id: Option<String>,
    /// `YYYY-MM-DD`, required for scheduled dispatch
    pub appointment_date: Option<String>,
    /// `HH:MM`, required for scheduled dispatch
    pub appointment_time: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AcceptLeadRequest {
    pub on_behalf_of: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleLeadRequest {
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub requires_verification: bool,
}

#[derive(Debug, Deserialize)]
pub struct CompleteLeadRequest {
    pub notes: String,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptJobRequest {
    pub lead_id: String,
    pub on_behalf_of: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

// ========== ACTIVITY ==========

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Accepted,
    Scheduled,
    Completed,
    Verified,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Accepted => "accepted",
            ActivityAction::Scheduled => "scheduled",
            ActivityAction::Completed => "completed",
            ActivityAction::Verified => "verified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(ActivityAction::Created),
            "accepted" => Some(ActivityAction::Accepted),
            "scheduled" => Some(ActivityAction::Scheduled),
            "completed" => Some(ActivityAction::Completed),
            "verified" => Some(ActivityAction::Verified),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActivityEntry {
    pub lead_id: String,
    pub action: ActivityAction,
    pub actor_id: String,
    pub actor_name: String,
    /// Set when someone accepts on behalf of another user.
    pub assignee_id: Option<String>,
    pub from_status: Option<LeadStatus>,
    pub to_status: LeadStatus,
    pub at: DateTime<Utc>,
}

// ========== USER ==========

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Setter,
    Closer,
    Manager,
    Admin,
    Pending,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Setter => "setter",
            Role::Closer => "closer",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "setter" => Some(Role::Setter),
            "closer" => Some(Role::Closer),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            "pending" => Some(Role::Pending),
            _ => None,
        }
    }

    pub fn is_supervisor(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    PendingApproval,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::PendingApproval => "pending_approval",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(UserStatus::Active),
            "pending_approval" => Some(UserStatus::PendingApproval),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub team_id: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl AppUser {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active && self.role != Role::Pending
    }

    pub fn belongs_to(&self, team_id: &str) -> bool {
        self.team_id.as_deref() == Some(team_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub requested_role: Role,
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveUserRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignTeamRequest {
    pub team_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PendingApproval {
    pub user_id: String,
    pub team_id: Option<String>,
    pub requested_role: Role,
    pub requested_at: DateTime<Utc>,
}

// ========== TEAM ==========

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Team {
    pub team_id: String,
    pub name: String,
    pub region_id: String,
    /// Local offset used to anchor appointment times.
    ///
    /// This is a fixed offset, not a zone: it does not follow daylight
    /// saving. A team in a DST region has to be updated when its clocks
    /// change, otherwise appointments booked across the change land an hour
    /// off from the wall-clock time the setter entered.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub region_id: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

// ========== CONNECTION ==========

/// WebSocket connection stored alongside the team it listens to
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub team_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}
