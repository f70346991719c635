//! Slot parsing and the `(doctor, date, time)` occupancy check.
//!
//! The partial unique index `appointments_active_slot` is what actually keeps
//! two active appointments out of one slot; [`has_conflict`] is the cheap
//! pre-check in front of it.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite};
use time::{macros::format_description, Date, Time};
use uuid::Uuid;

use crate::{AppError, AppResult};

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]");

pub fn parse_date(raw: &str) -> AppResult<Date> {
    Date::parse(raw.trim(), DATE_FORMAT).map_err(|err| {
        AppError::invalid_field("Invalid date", "date", format!("date must be YYYY-MM-DD: {err}"))
    })
}

pub fn parse_time(raw: &str) -> AppResult<Time> {
    parse_time_field(raw, "time")
}

/// An `HH:MM` time, reported against `field` when malformed.
pub fn parse_time_field(raw: &str, field: &str) -> AppResult<Time> {
    Time::parse(raw.trim(), TIME_FORMAT).map_err(|err| {
        AppError::invalid_field("Invalid time", field, format!("{field} must be HH:MM: {err}"))
    })
}

pub fn format_date(date: Date) -> AppResult<String> {
    Ok(date.format(DATE_FORMAT)?)
}

pub fn format_time(time: Time) -> AppResult<String> {
    Ok(time.format(TIME_FORMAT)?)
}

/// Parses a date and a time together; both fields are reported when both are bad.
pub fn parse_moment(date: &str, time: &str) -> AppResult<(Date, Time)> {
    match (parse_date(date), parse_time(time)) {
        (Ok(date), Ok(time)) => Ok((date, time)),
        (Err(AppError::Validation { errors: mut date_errors, .. }), Err(AppError::Validation { errors, .. })) => {
            date_errors.extend(errors);
            Err(AppError::validation("Invalid date and time", date_errors))
        }
        (Err(err), _) | (_, Err(err)) => Err(err),
    }
}

/// The unit of booking exclusivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub doctor_id: Uuid,
    pub date: Date,
    pub time: Time,
}

impl Slot {
    pub fn parse(doctor_id: Uuid, date: &str, time: &str) -> AppResult<Slot> {
        let (date, time) = parse_moment(date, time)?;
        Ok(Slot { doctor_id, date, time })
    }

    pub fn date_str(&self) -> AppResult<String> {
        format_date(self.date)
    }

    pub fn time_str(&self) -> AppResult<String> {
        format_time(self.time)
    }
}

/// How a reschedule onto the appointment's own current slot is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSlotPolicy {
    /// The appointment does not conflict with itself; the reschedule is a no-op.
    #[default]
    Allow,
    /// The current slot counts as occupied.
    Conflict,
}

impl SameSlotPolicy {
    /// Which appointment id, if any, the conflict check should skip.
    pub fn excluding(self, appointment_id: Uuid) -> Option<Uuid> {
        match self {
            SameSlotPolicy::Allow => Some(appointment_id),
            SameSlotPolicy::Conflict => None,
        }
    }
}

impl FromStr for SameSlotPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(SameSlotPolicy::Allow),
            "conflict" => Ok(SameSlotPolicy::Conflict),
            other => Err(anyhow!("unknown same-slot policy {other:?}, expected allow or conflict")),
        }
    }
}

impl fmt::Display for SameSlotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SameSlotPolicy::Allow => write!(f, "allow"),
            SameSlotPolicy::Conflict => write!(f, "conflict"),
        }
    }
}

/// True if an active appointment other than `excluding` holds `slot`.
pub async fn has_conflict<'e, E>(db: E, slot: &Slot, excluding: Option<Uuid>) -> AppResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let excluding = excluding.map(|id| id.to_string());
    let found: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM appointments \
         WHERE doctor_id=? AND date=? AND time=? AND status<>'cancelled' \
         AND (? IS NULL OR appointment_id<>?) LIMIT 1",
    )
        .bind(slot.doctor_id.to_string())
        .bind(slot.date_str()?)
        .bind(slot.time_str()?)
        .bind(&excluding)
        .bind(&excluding)
        .fetch_optional(db)
        .await?;

    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;

    #[test]
    fn parses_boundary_formats() {
        let slot = Slot::parse(Uuid::nil(), "2025-06-01", "09:00").unwrap();
        assert_eq!(slot.date, date!(2025 - 06 - 01));
        assert_eq!(slot.time, time!(09:00));
        assert_eq!(slot.date_str().unwrap(), "2025-06-01");
        assert_eq!(slot.time_str().unwrap(), "09:00");
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(parse_date("2025-13-40"), Err(AppError::Validation { .. })));
        assert!(matches!(parse_time("25:99"), Err(AppError::Validation { .. })));
        assert!(matches!(parse_date("01/06/2025"), Err(AppError::Validation { .. })));
        assert!(matches!(parse_time("09:00:30"), Err(AppError::Validation { .. })));
    }

    #[test]
    fn reports_both_bad_fields() {
        let Err(AppError::Validation { errors, .. }) = Slot::parse(Uuid::nil(), "2025-13-40", "25:99") else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["date", "time"]);
    }

    #[test]
    fn policy_controls_self_exclusion() {
        let id = Uuid::now_v7();
        assert_eq!(SameSlotPolicy::Allow.excluding(id), Some(id));
        assert_eq!(SameSlotPolicy::Conflict.excluding(id), None);
        assert_eq!("CONFLICT".parse::<SameSlotPolicy>().unwrap(), SameSlotPolicy::Conflict);
    }
}
