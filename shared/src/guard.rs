//! Who may do what to a lead.
//!
//! Everything here is pure: the caller passes the actor it resolved for the
//! request and the lead as read from the store.

use crate::types::{AppUser, Lead, Role};

/// Status transitions an actor can request on an existing lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadAction {
    Accept,
    Schedule,
    Complete,
    Verify,
}

impl LeadAction {
    pub const ALL: [LeadAction; 4] = [
        LeadAction::Accept,
        LeadAction::Schedule,
        LeadAction::Complete,
        LeadAction::Verify,
    ];
}

pub fn can_transition(actor: &AppUser, lead: &Lead, action: LeadAction) -> bool {
    if !actor.is_active() {
        return false;
    }

    match actor.role {
        Role::Admin | Role::Manager => actor.belongs_to(&lead.team_id),
        Role::Closer => {
            let assigned_to_actor = lead.assigned_closer_id.as_deref() == Some(actor.user_id.as_str());
            match action {
                LeadAction::Accept => {
                    lead.assigned_closer_id.is_none() && actor.belongs_to(&lead.team_id)
                }
                _ => assigned_to_actor,
            }
        }
        Role::Setter | Role::Pending => false,
    }
}

pub fn can_create_lead(actor: &AppUser, team_id: &str) -> bool {
    if !actor.is_active() {
        return false;
    }
    match actor.role {
        Role::Admin => true,
        Role::Manager | Role::Setter => actor.belongs_to(team_id),
        Role::Closer | Role::Pending => false,
    }
}

/// Accepting for someone else is reserved for supervisors.
pub fn can_accept_on_behalf(actor: &AppUser) -> bool {
    actor.is_active() && actor.role.is_supervisor()
}

/// Whether `user` may be assigned a lead of `team_id`.
pub fn can_be_assigned(user: &AppUser, team_id: &str) -> bool {
    user.is_active()
        && user.belongs_to(team_id)
        && matches!(user.role, Role::Closer | Role::Manager | Role::Admin)
}

pub fn can_view_team(actor: &AppUser, team_id: &str) -> bool {
    actor.is_active() && (actor.role == Role::Admin || actor.belongs_to(team_id))
}

/// Managers approve their own team; admins approve anyone.
pub fn can_approve_user(actor: &AppUser, user: &AppUser) -> bool {
    if !actor.is_active() {
        return false;
    }
    match actor.role {
        Role::Admin => true,
        Role::Manager => match user.team_id.as_deref() {
            Some(team_id) => actor.belongs_to(team_id),
            None => false,
        },
        _ => false,
    }
}

pub fn can_administer_teams(actor: &AppUser) -> bool {
    actor.is_active() && actor.role == Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DispatchType, LeadStatus, UserStatus};
    use chrono::Utc;

    fn user(id: &str, role: Role, team: &str) -> AppUser {
        AppUser {
            user_id: id.to_string(),
            name: id.to_string(),
            email: format!("{}@example.com", id),
            role,
            team_id: Some(team.to_string()),
            status: UserStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn lead(team: &str, closer: Option<&str>) -> Lead {
        Lead {
            lead_id: "lead-1".to_string(),
            customer_name: "Dana".to_string(),
            customer_phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            status: LeadStatus::WaitingAssignment,
            dispatch_type: DispatchType::Immediate,
            team_id: team.to_string(),
            setter_id: Some("setter-1".to_string()),
            setter_name: Some("Sam".to_string()),
            assigned_closer_id: closer.map(|c| c.to_string()),
            assigned_closer_name: closer.map(|c| c.to_string()),
            scheduled_appointment_time: None,
            setter_verified: false,
            disposition_notes: String::new(),
            photo_urls: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_setter_never_transitions() {
        let setter = user("setter-1", Role::Setter, "team-a");
        for lead in [lead("team-a", None), lead("team-a", Some("setter-1"))] {
            for action in LeadAction::ALL {
                assert!(!can_transition(&setter, &lead, action), "{:?}", action);
            }
        }
    }

    #[test]
    fn test_closer_truth_table() {
        let closer = user("closer-1", Role::Closer, "team-a");

        let unassigned = lead("team-a", None);
        let own = lead("team-a", Some("closer-1"));
        let others = lead("team-a", Some("closer-2"));
        let other_team = lead("team-b", None);

        assert!(can_transition(&closer, &unassigned, LeadAction::Accept));
        assert!(!can_transition(&closer, &unassigned, LeadAction::Schedule));
        assert!(!can_transition(&closer, &unassigned, LeadAction::Complete));
        assert!(!can_transition(&closer, &unassigned, LeadAction::Verify));

        assert!(!can_transition(&closer, &own, LeadAction::Accept));
        assert!(can_transition(&closer, &own, LeadAction::Schedule));
        assert!(can_transition(&closer, &own, LeadAction::Complete));
        assert!(can_transition(&closer, &own, LeadAction::Verify));

        for action in LeadAction::ALL {
            assert!(!can_transition(&closer, &others, action), "{:?}", action);
            assert!(!can_transition(&closer, &other_team, action), "{:?}", action);
        }
    }

    #[test]
    fn test_supervisors_scoped_to_team() {
        for role in [Role::Manager, Role::Admin] {
            let actor = user("boss", role, "team-a");
            for action in LeadAction::ALL {
                assert!(can_transition(&actor, &lead("team-a", None), action));
                assert!(can_transition(&actor, &lead("team-a", Some("closer-9")), action));
                assert!(!can_transition(&actor, &lead("team-b", None), action));
                assert!(!can_transition(&actor, &lead("team-b", Some("closer-9")), action));
            }
        }
    }

    #[test]
    fn test_inactive_actor_denied() {
        let mut manager = user("m", Role::Manager, "team-a");
        manager.status = UserStatus::PendingApproval;
        assert!(!can_transition(&manager, &lead("team-a", None), LeadAction::Accept));

        let pending = user("p", Role::Pending, "team-a");
        assert!(!can_transition(&pending, &lead("team-a", None), LeadAction::Accept));
        assert!(!can_create_lead(&pending, "team-a"));
    }

    #[test]
    fn test_create_rules() {
        assert!(can_create_lead(&user("s", Role::Setter, "team-a"), "team-a"));
        assert!(!can_create_lead(&user("s", Role::Setter, "team-a"), "team-b"));
        assert!(!can_create_lead(&user("c", Role::Closer, "team-a"), "team-a"));
        assert!(can_create_lead(&user("a", Role::Admin, "team-a"), "team-b"));
    }

    #[test]
    fn test_approval_rules() {
        let applicant = user("new", Role::Closer, "team-a");
        assert!(can_approve_user(&user("m", Role::Manager, "team-a"), &applicant));
        assert!(!can_approve_user(&user("m", Role::Manager, "team-b"), &applicant));
        assert!(can_approve_user(&user("a", Role::Admin, "team-b"), &applicant));
        assert!(!can_approve_user(&user("c", Role::Closer, "team-a"), &applicant));
        assert!(!can_approve_user(&user("s", Role::Setter, "team-a"), &applicant));
    }
}
