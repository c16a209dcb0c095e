//! Turning lead changes into client notifications.

use serde::Serialize;

use crate::sockets::messages::BroadcastMessage;
use crate::types::{Lead, LeadStatus};

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LeadCreated,
    LeadAccepted,
    LeadScheduled,
    LeadRescheduled,
    LeadNeedsVerification,
    LeadVerified,
    LeadCompleted,
    LeadUpdated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LeadCreated => "lead_created",
            NotificationKind::LeadAccepted => "lead_accepted",
            NotificationKind::LeadScheduled => "lead_scheduled",
            NotificationKind::LeadRescheduled => "lead_rescheduled",
            NotificationKind::LeadNeedsVerification => "lead_needs_verification",
            NotificationKind::LeadVerified => "lead_verified",
            NotificationKind::LeadCompleted => "lead_completed",
            NotificationKind::LeadUpdated => "lead_updated",
        }
    }
}

/// Classify a change from `old` (absent for inserts) to `new`.
pub fn classify_change(old: Option<&Lead>, new: &Lead) -> NotificationKind {
    let old = match old {
        Some(old) => old,
        None => return NotificationKind::LeadCreated,
    };

    if old.assigned_closer_id.is_none() && new.assigned_closer_id.is_some() {
        return NotificationKind::LeadAccepted;
    }

    let appointment_moved = old.scheduled_appointment_time != new.scheduled_appointment_time;
    match (old.status, new.status) {
        (_, LeadStatus::Completed) if old.status != LeadStatus::Completed => NotificationKind::LeadCompleted,
        (LeadStatus::NeedsVerification, LeadStatus::Scheduled) if new.setter_verified => {
            NotificationKind::LeadVerified
        }
        (from, LeadStatus::NeedsVerification) if from != LeadStatus::NeedsVerification || appointment_moved => {
            NotificationKind::LeadNeedsVerification
        }
        (from, LeadStatus::Scheduled) if from != LeadStatus::Scheduled || appointment_moved => {
            NotificationKind::LeadScheduled
        }
        (from, LeadStatus::Rescheduled) if from != LeadStatus::Rescheduled || appointment_moved => {
            NotificationKind::LeadRescheduled
        }
        _ => NotificationKind::LeadUpdated,
    }
}

/// The message pushed to the lead's team.
pub fn notification_for_change(old: Option<&Lead>, new: &Lead) -> BroadcastMessage {
    let kind = classify_change(old, new);
    BroadcastMessage::new(
        kind.as_str(),
        serde_json::json!({
            "lead_id": new.lead_id,
            "team_id": new.team_id,
            "status": new.status,
            "previous_status": old.map(|o| o.status),
            "assigned_closer_id": new.assigned_closer_id,
            "assigned_closer_name": new.assigned_closer_name,
            "scheduled_appointment_time": new.scheduled_appointment_time,
            "customer_name": new.customer_name,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DispatchType;
    use chrono::{DateTime, Utc};

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            lead_id: "lead-1".to_string(),
            customer_name: "Dana".to_string(),
            customer_phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            status,
            dispatch_type: DispatchType::Immediate,
            team_id: "team-a".to_string(),
            setter_id: Some("setter-1".to_string()),
            setter_name: Some("Sam".to_string()),
            assigned_closer_id: None,
            assigned_closer_name: None,
            scheduled_appointment_time: None,
            setter_verified: false,
            disposition_notes: String::new(),
            photo_urls: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn at(s: &str) -> Option<DateTime<chrono::FixedOffset>> {
        Some(DateTime::parse_from_rfc3339(s).unwrap())
    }

    #[test]
    fn test_insert_is_created() {
        assert_eq!(classify_change(None, &lead(LeadStatus::WaitingAssignment)), NotificationKind::LeadCreated);
    }

    #[test]
    fn test_assignment_is_accepted() {
        let old = lead(LeadStatus::WaitingAssignment);
        let mut new = lead(LeadStatus::Accepted);
        new.assigned_closer_id = Some("closer-1".to_string());
        assert_eq!(classify_change(Some(&old), &new), NotificationKind::LeadAccepted);

        // pre-booked job keeps its status
        let old = lead(LeadStatus::Scheduled);
        let mut new = lead(LeadStatus::Scheduled);
        new.assigned_closer_id = Some("closer-1".to_string());
        assert_eq!(classify_change(Some(&old), &new), NotificationKind::LeadAccepted);
    }

    #[test]
    fn test_scheduling_transitions() {
        let mut accepted = lead(LeadStatus::Accepted);
        accepted.assigned_closer_id = Some("closer-1".to_string());

        let mut scheduled = accepted.clone();
        scheduled.status = LeadStatus::Scheduled;
        scheduled.scheduled_appointment_time = at("2025-07-10T21:00:00-07:00");
        assert_eq!(classify_change(Some(&accepted), &scheduled), NotificationKind::LeadScheduled);

        let mut moved = scheduled.clone();
        moved.status = LeadStatus::Rescheduled;
        moved.scheduled_appointment_time = at("2025-07-11T10:00:00-07:00");
        assert_eq!(classify_change(Some(&scheduled), &moved), NotificationKind::LeadRescheduled);

        let mut moved_again = moved.clone();
        moved_again.scheduled_appointment_time = at("2025-07-12T10:00:00-07:00");
        assert_eq!(classify_change(Some(&moved), &moved_again), NotificationKind::LeadRescheduled);

        let mut pending = scheduled.clone();
        pending.status = LeadStatus::NeedsVerification;
        assert_eq!(classify_change(Some(&scheduled), &pending), NotificationKind::LeadNeedsVerification);

        let mut verified = pending.clone();
        verified.status = LeadStatus::Scheduled;
        verified.setter_verified = true;
        assert_eq!(classify_change(Some(&pending), &verified), NotificationKind::LeadVerified);
    }

    #[test]
    fn test_completion_and_other_edits() {
        let mut accepted = lead(LeadStatus::Accepted);
        accepted.assigned_closer_id = Some("closer-1".to_string());
        let mut done = accepted.clone();
        done.status = LeadStatus::Completed;
        assert_eq!(classify_change(Some(&accepted), &done), NotificationKind::LeadCompleted);

        let mut touched = accepted.clone();
        touched.customer_phone = "555-0199".to_string();
        assert_eq!(classify_change(Some(&accepted), &touched), NotificationKind::LeadUpdated);
    }

    #[test]
    fn test_message_shape() {
        let message = notification_for_change(None, &lead(LeadStatus::WaitingAssignment));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "lead_created");
        assert_eq!(json["lead_id"], "lead-1");
        assert_eq!(json["team_id"], "team-a");
        assert_eq!(json["status"], "waiting_assignment");
    }
}
