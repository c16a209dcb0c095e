//! Data-quality checks over stored leads.

use serde::Serialize;

use crate::types::{Lead, LeadStatus};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScheduleViolation {
    pub lead_id: String,
    pub team_id: String,
    pub status: LeadStatus,
}

/// Leads in the scheduled family that carry no appointment time.
pub fn find_schedule_violations<'a, I>(leads: I) -> Vec<ScheduleViolation>
where
    I: IntoIterator<Item = &'a Lead>,
{
    leads
        .into_iter()
        .filter(|lead| lead.status.is_scheduled_family() && lead.scheduled_appointment_time.is_none())
        .map(|lead| ScheduleViolation {
            lead_id: lead.lead_id.clone(),
            team_id: lead.team_id.clone(),
            status: lead.status,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DispatchType;
    use chrono::{DateTime, Utc};

    fn lead(id: &str, status: LeadStatus, at: Option<&str>) -> Lead {
        Lead {
            lead_id: id.to_string(),
            customer_name: "Dana".to_string(),
            customer_phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            status,
            dispatch_type: DispatchType::Scheduled,
            team_id: "team-a".to_string(),
            setter_id: None,
            setter_name: None,
            assigned_closer_id: None,
            assigned_closer_name: None,
            scheduled_appointment_time: at.map(|s| DateTime::parse_from_rfc3339(s).unwrap()),
            setter_verified: false,
            disposition_notes: String::new(),
            photo_urls: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_flags_only_scheduled_family_without_time() {
        let leads = vec![
            lead("ok", LeadStatus::Scheduled, Some("2025-07-10T15:00:00+00:00")),
            lead("bad", LeadStatus::Scheduled, None),
            lead("bad-verify", LeadStatus::NeedsVerification, None),
            lead("waiting", LeadStatus::WaitingAssignment, None),
            lead("done", LeadStatus::Completed, None),
        ];
        let ids: Vec<String> = find_schedule_violations(&leads)
            .into_iter()
            .map(|v| v.lead_id)
            .collect();
        assert_eq!(ids, vec!["bad", "bad-verify"]);
    }

    #[test]
    fn test_clean_data_has_no_violations() {
        let leads = vec![lead("ok", LeadStatus::Rescheduled, Some("2025-07-10T15:00:00+00:00"))];
        assert!(find_schedule_violations(&leads).is_empty());
    }
}
