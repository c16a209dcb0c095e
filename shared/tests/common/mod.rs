//! Shared fixtures: two teams and one user per role, in a fresh in-memory store.

#![allow(dead_code)]

use chrono::Utc;
use std::sync::Arc;

use dispatch_shared::store::{DispatchStore, MemoryStore};
use dispatch_shared::types::{AppUser, CreateLeadRequest, DispatchType, Role, Team, UserStatus};

pub const TEAM_A: &str = "team-a";
pub const TEAM_B: &str = "team-b";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub setter: AppUser,
    pub closer: AppUser,
    pub other_closer: AppUser,
    pub manager: AppUser,
    pub admin: AppUser,
    pub other_team_manager: AppUser,
}

pub fn user(id: &str, role: Role, team: &str) -> AppUser {
    AppUser {
        user_id: id.to_string(),
        name: format!("{} name", id),
        email: format!("{}@example.com", id),
        role,
        team_id: Some(team.to_string()),
        status: UserStatus::Active,
        created_at: Utc::now(),
    }
}

pub async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    for (id, name, offset) in [(TEAM_A, "Alpha", -7 * 60), (TEAM_B, "Bravo", 0)] {
        store
            .insert_team(&Team {
                team_id: id.to_string(),
                name: name.to_string(),
                region_id: "west".to_string(),
                utc_offset_minutes: offset,
            })
            .await
            .unwrap();
    }

    let h = Harness {
        store,
        setter: user("setter-1", Role::Setter, TEAM_A),
        closer: user("closer-1", Role::Closer, TEAM_A),
        other_closer: user("closer-2", Role::Closer, TEAM_A),
        manager: user("manager-1", Role::Manager, TEAM_A),
        admin: user("admin-1", Role::Admin, TEAM_A),
        other_team_manager: user("manager-2", Role::Manager, TEAM_B),
    };
    for u in [
        &h.setter,
        &h.closer,
        &h.other_closer,
        &h.manager,
        &h.admin,
        &h.other_team_manager,
    ] {
        h.store.insert_user(u).await.unwrap();
    }
    h
}

pub fn immediate_lead() -> CreateLeadRequest {
    CreateLeadRequest {
        customer_name: "Dana Whitfield".to_string(),
        customer_phone: "555-0100".to_string(),
        address: "12 Orchard Ln".to_string(),
        dispatch_type: DispatchType::Immediate,
        team_id: None,
        appointment_date: None,
        appointment_time: None,
    }
}

pub fn scheduled_lead(date: &str, time: &str) -> CreateLeadRequest {
    CreateLeadRequest {
        dispatch_type: DispatchType::Scheduled,
        appointment_date: Some(date.to_string()),
        appointment_time: Some(time.to_string()),
        ..immediate_lead()
    }
}
