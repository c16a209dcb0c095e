//! Appointment time handling and the scheduled queue.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::error::{DispatchError, Result};
use crate::types::Lead;

const TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

/// Offset for a team's `utc_offset_minutes`. The same offset applies on
/// every date; there is no daylight saving adjustment.
pub fn team_offset(utc_offset_minutes: i32) -> Result<FixedOffset> {
    utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            DispatchError::InvalidArgument(format!(
                "Invalid UTC offset: {} minutes",
                utc_offset_minutes
            ))
        })
}

/// Reduce whatever the client sent as a date to the plain `YYYY-MM-DD`
/// calendar date. A full timestamp keeps its date part as written; it is
/// never converted to another zone first.
fn calendar_date(date: &str) -> Result<NaiveDate> {
    let date = date.trim();
    let day = match date.find('T') {
        Some(idx) => &date[..idx],
        None => date,
    };
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| DispatchError::InvalidArgument(format!("Invalid date '{}', expected YYYY-MM-DD", date)))
}

fn time_of_day(time: &str) -> Result<NaiveTime> {
    let time = time.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time, fmt).ok())
        .ok_or_else(|| DispatchError::InvalidArgument(format!("Invalid time '{}', expected HH:MM", time)))
}

/// Compose an appointment instant from a calendar date and a time of day,
/// both read as local to the team's offset.
pub fn compose_appointment_time(
    date: &str,
    time: &str,
    utc_offset_minutes: i32,
) -> Result<DateTime<FixedOffset>> {
    let offset = team_offset(utc_offset_minutes)?;
    let local = calendar_date(date)?.and_time(time_of_day(time)?);
    offset
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| DispatchError::InvalidArgument(format!("Ambiguous local time {}", local)))
}

/// Parse a window bound: RFC 3339, or a bare date meaning local midnight.
pub fn parse_window_bound(value: &str, utc_offset_minutes: i32) -> Result<DateTime<FixedOffset>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(instant);
    }
    compose_appointment_time(value, "00:00", utc_offset_minutes)
}

/// Leads of `team_id` in the scheduled family whose appointment falls in
/// `[start, end)`, earliest first. Leads missing an appointment are skipped.
pub fn scheduled_queue<'a, I>(
    leads: I,
    team_id: &str,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Result<Vec<Lead>>
where
    I: IntoIterator<Item = &'a Lead>,
{
    if start >= end {
        return Err(DispatchError::InvalidArgument(
            "Window start must be before window end".to_string(),
        ));
    }

    let mut queue: Vec<Lead> = leads
        .into_iter()
        .filter(|lead| lead.team_id == team_id && lead.status.is_scheduled_family())
        .filter(|lead| match lead.scheduled_appointment_time {
            Some(at) => at >= start && at < end,
            None => false,
        })
        .cloned()
        .collect();

    queue.sort_by_key(|lead| lead.scheduled_appointment_time);
    Ok(queue)
}
