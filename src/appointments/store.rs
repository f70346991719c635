use std::{fmt, str::FromStr};

use anyhow::anyhow;
use futures_util::TryStreamExt;
use serde::Serialize;
use sqlx::{Executor, Sqlite};
use time::{Date, Time};
use uuid::Uuid;

use crate::{
    appresult::is_unique_violation,
    auth::Identity,
    db::AppointmentRow,
    slot,
    AppError, AppResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AppointmentStatus {
    Booked,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(AppointmentStatus::Booked),
            other => Err(anyhow!("unknown appointment status {other:?}")),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub date: Date,
    pub time: Time,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn view(&self) -> AppResult<AppointmentView> {
        Ok(AppointmentView {
            appointment_id: self.id.to_string(),
            patient_id: self.patient_id.to_string(),
            doctor_id: self.doctor_id.map(|id| id.to_string()),
            date: slot::format_date(self.date)?,
            time: slot::format_time(self.time)?,
            status: self.status.as_str(),
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = AppError;

    fn try_from(row: AppointmentRow) -> AppResult<Appointment> {
        Ok(Appointment {
            id: Uuid::parse_str(&row.appointment_id)?,
            patient_id: Uuid::parse_str(&row.patient_id)?,
            doctor_id: row.doctor_id.as_deref().map(Uuid::parse_str).transpose()?,
            date: slot::parse_date(&row.date)?,
            time: slot::parse_time(&row.time)?,
            status: row.status.parse()?,
        })
    }
}

/// The public shape of an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    pub appointment_id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub date: String,
    pub time: String,
    pub status: &'static str,
}

const SLOT_TAKEN: &str = "Appointment already exists at this time";

fn slot_violation(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(SLOT_TAKEN.to_owned())
    } else {
        err.into()
    }
}

/// Inserts `appointment`. A taken slot surfaces as `Conflict`.
pub async fn insert<'e, E>(db: E, appointment: &Appointment, created_at: &str) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO appointments (appointment_id,patient_id,doctor_id,date,time,status,created_at) \
         VALUES (?,?,?,?,?,?,?)",
    )
        .bind(appointment.id.to_string())
        .bind(appointment.patient_id.to_string())
        .bind(appointment.doctor_id.map(|id| id.to_string()))
        .bind(slot::format_date(appointment.date)?)
        .bind(slot::format_time(appointment.time)?)
        .bind(appointment.status.as_str())
        .bind(created_at)
        .execute(db)
        .await
        .map_err(slot_violation)?;
    Ok(())
}

pub async fn find<'e, E>(db: E, id: Uuid) -> AppResult<Option<Appointment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<AppointmentRow> = sqlx::query_as("SELECT * FROM appointments WHERE appointment_id=?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.map(Appointment::try_from).transpose()
}

pub async fn delete<'e, E>(db: E, id: Uuid) -> AppResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM appointments WHERE appointment_id=?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Moves an appointment to `date`/`time`; id and status are untouched.
/// A taken slot surfaces as `Conflict`.
pub async fn move_to<'e, E>(db: E, id: Uuid, date: Date, time: Time) -> AppResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE appointments SET date=?, time=? WHERE appointment_id=?")
        .bind(slot::format_date(date)?)
        .bind(slot::format_time(time)?)
        .bind(id.to_string())
        .execute(db)
        .await
        .map_err(slot_violation)?;
    Ok(result.rows_affected() > 0)
}

/// Every appointment `identity` takes part in, by date then time.
pub async fn list_for<'e, E>(db: E, identity: Identity) -> AppResult<Vec<AppointmentView>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (query, id) = match identity {
        Identity::Patient(id) => ("SELECT * FROM appointments WHERE patient_id=? ORDER BY date, time", id),
        Identity::Doctor(id) => ("SELECT * FROM appointments WHERE doctor_id=? ORDER BY date, time", id),
    };

    let rows: Vec<AppointmentRow> = sqlx::query_as(query)
        .bind(id.to_string())
        .fetch(db)
        .try_collect()
        .await?;

    rows.into_iter()
        .map(|row| Appointment::try_from(row)?.view())
        .collect()
}
