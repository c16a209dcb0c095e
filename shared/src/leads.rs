//! Lead lifecycle: create, accept, schedule, complete, verify.
//!
//! Every operation takes the caller's profile explicitly and re-reads the
//! lead; writes are conditional on the status that was read, so a concurrent
//! change surfaces as `Conflict` instead of being overwritten.

use chrono::Utc;

use crate::error::{DispatchError, Result};
use crate::guard::{self, LeadAction};
use crate::photos;
use crate::schedule;
use crate::store::{DispatchStore, LeadUpdate};
use crate::types::{
    ActivityAction, ActivityEntry, AppUser, CompleteLeadRequest, CreateLeadRequest, DispatchType,
    Lead, LeadStatus, ScheduleLeadRequest,
};

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DispatchError::InvalidArgument(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

async fn load_lead(store: &dyn DispatchStore, lead_id: &str) -> Result<Lead> {
    store
        .get_lead(lead_id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("Lead {} not found", lead_id)))
}

async fn team_utc_offset(store: &dyn DispatchStore, team_id: &str) -> Result<i32> {
    store
        .get_team(team_id)
        .await?
        .map(|team| team.utc_offset_minutes)
        .ok_or_else(|| DispatchError::NotFound(format!("Team {} not found", team_id)))
}

fn ensure_allowed(actor: &AppUser, lead: &Lead, action: LeadAction) -> Result<()> {
    if guard::can_transition(actor, lead, action) {
        Ok(())
    } else {
        Err(DispatchError::PermissionDenied(format!(
            "{} may not {:?} lead {}",
            actor.role.as_str(),
            action,
            lead.lead_id
        )))
    }
}

/// The transition itself is already committed; a failed activity write is
/// logged and swallowed.
async fn record_activity(
    store: &dyn DispatchStore,
    lead: &Lead,
    action: ActivityAction,
    actor: &AppUser,
    assignee_id: Option<String>,
    from_status: Option<LeadStatus>,
) {
    let entry = ActivityEntry {
        lead_id: lead.lead_id.clone(),
        action,
        actor_id: actor.user_id.clone(),
        actor_name: actor.name.clone(),
        assignee_id,
        from_status,
        to_status: lead.status,
        at: Utc::now(),
    };
    if let Err(e) = store.append_activity(&entry).await {
        tracing::error!("Failed to record {} activity for lead {}: {}", action.as_str(), lead.lead_id, e);
    }
}

pub async fn create_lead(store: &dyn DispatchStore, actor: &AppUser, req: CreateLeadRequest) -> Result<Lead> {
    let team_id = match req.team_id.as_deref().or(actor.team_id.as_deref()) {
        Some(team_id) if !team_id.trim().is_empty() => team_id.trim().to_string(),
        _ => return Err(DispatchError::InvalidArgument("team_id is required".to_string())),
    };

    if !guard::can_create_lead(actor, &team_id) {
        return Err(DispatchError::PermissionDenied(format!(
            "{} may not create leads for team {}",
            actor.role.as_str(),
            team_id
        )));
    }

    let customer_name = required(&req.customer_name, "customer_name")?;
    let customer_phone = required(&req.customer_phone, "customer_phone")?;
    let address = required(&req.address, "address")?;
    let utc_offset = team_utc_offset(store, &team_id).await?;

    let (status, scheduled_appointment_time) = match req.dispatch_type {
        DispatchType::Immediate => (LeadStatus::WaitingAssignment, None),
        DispatchType::Scheduled => {
            let date = req.appointment_date.as_deref().unwrap_or_default();
            let time = req.appointment_time.as_deref().unwrap_or_default();
            let at = schedule::compose_appointment_time(
                &required(date, "appointment_date")?,
                &required(time, "appointment_time")?,
                utc_offset,
            )?;
            (LeadStatus::Scheduled, Some(at))
        }
    };

    let now = Utc::now();
    let lead = Lead {
        lead_id: uuid::Uuid::new_v4().to_string(),
        customer_name,
        customer_phone,
        address,
        status,
        dispatch_type: req.dispatch_type,
        team_id,
        setter_id: Some(actor.user_id.clone()),
        setter_name: Some(actor.name.clone()),
        assigned_closer_id: None,
        assigned_closer_name: None,
        scheduled_appointment_time,
        setter_verified: false,
        disposition_notes: String::new(),
        photo_urls: vec![],
        created_at: now,
        updated_at: now,
    };

    store.insert_lead(&lead).await?;
    record_activity(store, &lead, ActivityAction::Created, actor, None, None).await;

    tracing::info!(
        "Lead {} created by {} for team {} ({})",
        lead.lead_id,
        actor.user_id,
        lead.team_id,
        lead.status.as_str()
    );
    Ok(lead)
}

pub async fn get_lead(store: &dyn DispatchStore, actor: &AppUser, lead_id: &str) -> Result<Lead> {
    let lead = load_lead(store, lead_id).await?;
    if !guard::can_view_team(actor, &lead.team_id) {
        return Err(DispatchError::PermissionDenied(
            "Lead belongs to another team".to_string(),
        ));
    }
    Ok(lead)
}

pub async fn list_team_leads(store: &dyn DispatchStore, actor: &AppUser, team_id: &str) -> Result<Vec<Lead>> {
    if !guard::can_view_team(actor, team_id) {
        return Err(DispatchError::PermissionDenied(format!(
            "Cannot view leads of team {}",
            team_id
        )));
    }
    store.list_team_leads(team_id).await
}

pub async fn list_activity(store: &dyn DispatchStore, actor: &AppUser, lead_id: &str) -> Result<Vec<ActivityEntry>> {
    let lead = get_lead(store, actor, lead_id).await?;
    let mut entries = store.list_activity(&lead.lead_id).await?;
    entries.sort_by_key(|entry| entry.at);
    Ok(entries)
}

/// Assign a closer to an unassigned lead.
///
/// `waiting_assignment` leads become `accepted`; pre-booked `scheduled`
/// leads keep their status and gain the closer. Supervisors may name
/// another team member with `on_behalf_of`.
pub async fn accept_lead(
    store: &dyn DispatchStore,
    actor: &AppUser,
    lead_id: &str,
    on_behalf_of: Option<&str>,
) -> Result<Lead> {
    let lead = load_lead(store, lead_id).await?;

    if !actor.is_active() || !actor.belongs_to(&lead.team_id) {
        return Err(DispatchError::PermissionDenied(
            "Lead belongs to another team".to_string(),
        ));
    }
    if lead.assigned_closer_id.is_some() {
        return Err(DispatchError::Conflict("Lead was already accepted".to_string()));
    }
    if !matches!(lead.status, LeadStatus::WaitingAssignment | LeadStatus::Scheduled) {
        return Err(DispatchError::FailedPrecondition(format!(
            "Lead cannot be accepted while {}",
            lead.status.as_str()
        )));
    }
    ensure_allowed(actor, &lead, LeadAction::Accept)?;

    let assignee = match on_behalf_of {
        Some(user_id) if user_id != actor.user_id => {
            if !guard::can_accept_on_behalf(actor) {
                return Err(DispatchError::PermissionDenied(
                    "Only managers and admins may accept on behalf of someone else".to_string(),
                ));
            }
            store
                .get_user(user_id)
                .await?
                .ok_or_else(|| DispatchError::NotFound(format!("User {} not found", user_id)))?
        }
        _ => actor.clone(),
    };
    if !guard::can_be_assigned(&assignee, &lead.team_id) {
        return Err(DispatchError::InvalidArgument(format!(
            "User {} cannot be assigned leads of team {}",
            assignee.user_id, lead.team_id
        )));
    }

    let mut update = LeadUpdate::new(&lead.lead_id, &[lead.status]);
    update.require_unassigned = true;
    update.assigned_closer = Some((assignee.user_id.clone(), assignee.name.clone()));
    if lead.status == LeadStatus::WaitingAssignment {
        update.status = Some(LeadStatus::Accepted);
    }

    let updated = store.update_lead(&update).await?;

    let on_behalf = (assignee.user_id != actor.user_id).then(|| assignee.user_id.clone());
    record_activity(store, &updated, ActivityAction::Accepted, actor, on_behalf, Some(lead.status)).await;

    tracing::info!(
        "Lead {} accepted by {} for {}",
        updated.lead_id,
        actor.user_id,
        assignee.user_id
    );
    Ok(updated)
}

/// Book (or re-book) the appointment. The date and time are read in the
/// team's own offset.
pub async fn schedule_lead(
    store: &dyn DispatchStore,
    actor: &AppUser,
    lead_id: &str,
    req: ScheduleLeadRequest,
) -> Result<Lead> {
    let lead = load_lead(store, lead_id).await?;
    ensure_allowed(actor, &lead, LeadAction::Schedule)?;

    if lead.status == LeadStatus::Completed {
        return Err(DispatchError::FailedPrecondition(
            "Completed leads cannot be scheduled".to_string(),
        ));
    }

    let utc_offset = team_utc_offset(store, &lead.team_id).await?;
    let at = schedule::compose_appointment_time(
        &required(&req.date, "date")?,
        &required(&req.time, "time")?,
        utc_offset,
    )?;

    let status = if req.requires_verification {
        LeadStatus::NeedsVerification
    } else if lead.scheduled_appointment_time.is_some() {
        LeadStatus::Rescheduled
    } else {
        LeadStatus::Scheduled
    };

    let mut update = LeadUpdate::new(&lead.lead_id, &[lead.status]);
    update.status = Some(status);
    update.scheduled_appointment_time = Some(at);
    if req.requires_verification {
        update.setter_verified = Some(false);
    }

    let updated = store.update_lead(&update).await?;
    record_activity(store, &updated, ActivityAction::Scheduled, actor, None, Some(lead.status)).await;

    tracing::info!(
        "Lead {} {} for {} by {}",
        updated.lead_id,
        status.as_str(),
        at.to_rfc3339(),
        actor.user_id
    );
    Ok(updated)
}

pub async fn complete_lead(
    store: &dyn DispatchStore,
    actor: &AppUser,
    lead_id: &str,
    req: CompleteLeadRequest,
) -> Result<Lead> {
    let lead = load_lead(store, lead_id).await?;
    ensure_allowed(actor, &lead, LeadAction::Complete)?;

    let notes = required(&req.notes, "notes")?;
    if lead.assigned_closer_id.is_none() {
        return Err(DispatchError::FailedPrecondition(
            "Lead has no assigned closer".to_string(),
        ));
    }
    if !matches!(
        lead.status,
        LeadStatus::Accepted | LeadStatus::Scheduled | LeadStatus::Rescheduled
    ) {
        return Err(DispatchError::FailedPrecondition(format!(
            "Lead cannot be completed while {}",
            lead.status.as_str()
        )));
    }

    let photo_urls: Vec<String> = req
        .photo_urls
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();
    if let Some(foreign) = photo_urls.iter().find(|url| !photos::is_lead_photo_url(url, &lead.lead_id)) {
        return Err(DispatchError::InvalidArgument(format!(
            "Photo {} was not uploaded for lead {}",
            foreign, lead.lead_id
        )));
    }

    let mut update = LeadUpdate::new(&lead.lead_id, &[lead.status]);
    update.status = Some(LeadStatus::Completed);
    update.disposition_notes = Some(notes);
    update.append_photo_urls = photo_urls;

    let updated = store.update_lead(&update).await?;
    record_activity(store, &updated, ActivityAction::Completed, actor, None, Some(lead.status)).await;

    tracing::info!("Lead {} completed by {}", updated.lead_id, actor.user_id);
    Ok(updated)
}

/// Confirm a `needs_verification` appointment.
pub async fn verify_lead(store: &dyn DispatchStore, actor: &AppUser, lead_id: &str) -> Result<Lead> {
    let lead = load_lead(store, lead_id).await?;
    ensure_allowed(actor, &lead, LeadAction::Verify)?;

    if lead.status != LeadStatus::NeedsVerification {
        return Err(DispatchError::FailedPrecondition(format!(
            "Lead cannot be verified while {}",
            lead.status.as_str()
        )));
    }

    let mut update = LeadUpdate::new(&lead.lead_id, &[LeadStatus::NeedsVerification]);
    update.status = Some(LeadStatus::Scheduled);
    update.setter_verified = Some(true);

    let updated = store.update_lead(&update).await?;
    record_activity(store, &updated, ActivityAction::Verified, actor, None, Some(lead.status)).await;

    tracing::info!("Lead {} verified by {}", updated.lead_id, actor.user_id);
    Ok(updated)
}

/// Upcoming appointments of a team in `[start, end)`. Bare dates are read as
/// local midnight in the team's offset.
pub async fn scheduled_queue(
    store: &dyn DispatchStore,
    actor: &AppUser,
    team_id: &str,
    start: &str,
    end: &str,
) -> Result<Vec<Lead>> {
    if !guard::can_view_team(actor, team_id) {
        return Err(DispatchError::PermissionDenied(format!(
            "Cannot view leads of team {}",
            team_id
        )));
    }

    let utc_offset = team_utc_offset(store, team_id).await?;
    let start = schedule::parse_window_bound(&required(start, "start")?, utc_offset)?;
    let end = schedule::parse_window_bound(&required(end, "end")?, utc_offset)?;

    let leads = store.list_team_leads(team_id).await?;
    schedule::scheduled_queue(&leads, team_id, start, end)
}

/// Check that `actor` may attach photos to the lead, i.e. could complete it.
pub async fn authorize_photo_upload(store: &dyn DispatchStore, actor: &AppUser, lead_id: &str) -> Result<Lead> {
    let lead = load_lead(store, lead_id).await?;
    ensure_allowed(actor, &lead, LeadAction::Complete)?;
    if lead.status == LeadStatus::Completed {
        return Err(DispatchError::FailedPrecondition(
            "Lead is already completed".to_string(),
        ));
    }
    Ok(lead)
}
