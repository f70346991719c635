use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::Response,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::Weekday;
use tracing::info;
use uuid::Uuid;

use crate::{
    appresult::FieldError,
    auth::{kind, DoctorKind, Identity},
    cache::{self, Cache},
    res::{self, AppJson, AppPath},
    slot, AppError, AppResult, AppState,
};

use super::{directory, invalidate, read_through};

const WEEK: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
];

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SetAvailability {
    pub availability_start: Option<String>,
    pub availability_end: Option<String>,
    pub days_available: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub doctor_id: String,
    pub availability_start: Option<String>,
    pub availability_end: Option<String>,
    pub days_available: Vec<String>,
}

/// Splits the stored comma list back into day names.
pub(super) fn days_of(stored: Option<&str>) -> Vec<String> {
    stored
        .map(|days| {
            days.split(',')
                .map(str::trim)
                .filter(|day| !day.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn weekday(raw: &str) -> Option<Weekday> {
    let raw = raw.trim();
    WEEK.into_iter().find(|day| day.to_string().eq_ignore_ascii_case(raw))
}

impl SetAvailability {
    /// Checks the window and normalizes the day names, in request order with
    /// duplicates removed.
    fn validate(&self) -> AppResult<(String, String, Vec<String>)> {
        let mut errors = Vec::new();

        let mut clock = |raw: &Option<String>, field: &str| match raw {
            None => {
                errors.push(FieldError::new(field, format!("{field} is required")));
                None
            }
            Some(raw) => match slot::parse_time_field(raw, field) {
                Ok(time) => Some(time),
                Err(AppError::Validation { errors: bad, .. }) => {
                    errors.extend(bad);
                    None
                }
                Err(_) => None,
            },
        };
        let start = clock(&self.availability_start, "availability_start");
        let end = clock(&self.availability_end, "availability_end");

        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                errors.push(FieldError::new("availability_end", "availability_end must be after availability_start"));
            }
        }

        let mut days = Vec::new();
        match self.days_available.as_deref() {
            None | Some([]) => errors.push(FieldError::new(
                "days_available",
                "days_available must be a non-empty list of strings",
            )),
            Some(raw_days) => {
                for raw in raw_days {
                    match weekday(raw) {
                        Some(day) if !days.contains(&day) => days.push(day),
                        Some(_) => {}
                        None => errors.push(FieldError::new("days_available", format!("{raw:?} is not a day of the week"))),
                    }
                }
            }
        }

        match (start, end) {
            (Some(start), Some(end)) if errors.is_empty() => Ok((
                slot::format_time(start)?,
                slot::format_time(end)?,
                days.iter().map(Weekday::to_string).collect(),
            )),
            _ => Err(AppError::validation("Invalid input", errors)),
        }
    }
}

/// Replaces the calling doctor's availability window.
pub async fn set(
    db_pool: &SqlitePool,
    cache: &Arc<dyn Cache>,
    identity: Identity,
    request: SetAvailability,
) -> AppResult<Availability> {
    let doctor_id = identity.doctor("Unauthorized, only doctors can set availability")?;
    if !kind::exists::<DoctorKind, _>(db_pool, doctor_id).await? {
        return Err(AppError::NotFound("Doctor not found".to_owned()));
    }

    let (start, end, days) = request.validate()?;

    sqlx::query("UPDATE doctors SET availability_start=?, availability_end=?, days_available=? WHERE doctor_id=?")
        .bind(&start)
        .bind(&end)
        .bind(days.join(","))
        .bind(doctor_id.to_string())
        .execute(db_pool)
        .await?;

    invalidate(cache, doctor_id).await;
    info!(%doctor_id, %start, %end, days = %days.join(","), "availability updated");

    Ok(Availability {
        doctor_id: doctor_id.to_string(),
        availability_start: Some(start),
        availability_end: Some(end),
        days_available: days,
    })
}

pub async fn get(db_pool: &SqlitePool, cache: &dyn Cache, doctor_id: Uuid) -> AppResult<Availability> {
    read_through(cache, &cache::doctor_availability_key(doctor_id), async {
        let row = directory::find(db_pool, doctor_id).await?;
        Ok::<_, AppError>(row.map(|row| Availability {
            days_available: days_of(row.days_available.as_deref()),
            doctor_id: row.doctor_id,
            availability_start: row.availability_start,
            availability_end: row.availability_end,
        }))
    })
    .await?
    .ok_or(AppError::NotFound("Requested doctor not found".to_owned()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_availability(
    State(db_pool): State<SqlitePool>,
    State(cache): State<Arc<dyn Cache>>,
    identity: Identity,
    AppJson(request): AppJson<SetAvailability>,
) -> AppResult<Response> {
    let availability = set(&db_pool, &cache, identity, request).await?;
    Ok(res::ok("Availability updated successfully", availability))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_availability(
    State(db_pool): State<SqlitePool>,
    State(cache): State<Arc<dyn Cache>>,
    _identity: Identity,
    AppPath(doctor_id): AppPath<Uuid>,
) -> AppResult<Response> {
    let availability = get(&db_pool, cache.as_ref(), doctor_id).await?;
    Ok(res::ok("Availability fetched successfully", availability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        doctors::testing::{insert_doctor, pool},
    };

    fn window(start: &str, end: &str, days: &[&str]) -> SetAvailability {
        SetAvailability {
            availability_start: Some(start.into()),
            availability_end: Some(end.into()),
            days_available: Some(days.iter().map(|d| d.to_string()).collect()),
        }
    }

    #[test]
    fn normalizes_day_names() {
        let (start, end, days) = window("08:00", "16:30", &["monday", "FRIDAY", "Monday"]).validate().unwrap();
        assert_eq!((start.as_str(), end.as_str()), ("08:00", "16:30"));
        assert_eq!(days, ["Monday", "Friday"]);
    }

    #[test]
    fn rejects_bad_windows() {
        let fields = |request: SetAvailability| match request.validate() {
            Err(AppError::Validation { errors, .. }) => errors.into_iter().map(|e| e.field).collect::<Vec<_>>(),
            other => panic!("expected validation error, got {other:?}"),
        };

        assert_eq!(fields(window("8am", "16:00", &["Monday"])), ["availability_start"]);
        assert_eq!(fields(window("16:00", "08:00", &["Monday"])), ["availability_end"]);
        assert_eq!(fields(window("08:00", "16:00", &[])), ["days_available"]);
        assert_eq!(fields(window("08:00", "16:00", &["Funday"])), ["days_available"]);
        assert_eq!(
            fields(SetAvailability::default()),
            ["availability_start", "availability_end", "days_available"]
        );
    }

    #[test]
    fn splits_stored_days() {
        assert_eq!(days_of(Some("Monday,Friday")), ["Monday", "Friday"]);
        assert!(days_of(Some("")).is_empty());
        assert!(days_of(None).is_empty());
    }

    #[tokio::test]
    async fn setting_invalidates_cached_reads() {
        let db_pool = pool().await;
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::default());
        let id = insert_doctor(&db_pool, "a@example.com").await;

        let before = get(&db_pool, cache.as_ref(), id).await.unwrap();
        assert_eq!(before.availability_start, None);
        assert!(before.days_available.is_empty());
        directory::details(&db_pool, cache.as_ref(), id).await.unwrap();

        let set_to = set(&db_pool, &cache, Identity::Doctor(id), window("09:00", "17:00", &["tuesday"]))
            .await
            .unwrap();

        let after = get(&db_pool, cache.as_ref(), id).await.unwrap();
        assert_eq!(after, set_to);
        assert_eq!(after.days_available, ["Tuesday"]);

        let details = directory::details(&db_pool, cache.as_ref(), id).await.unwrap();
        assert_eq!(details.availability_start.as_deref(), Some("09:00"));
        assert_eq!(details.days_available, ["Tuesday"]);
    }

    #[tokio::test]
    async fn only_doctors_set_availability() {
        let db_pool = pool().await;
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::default());

        let as_patient = set(&db_pool, &cache, Identity::Patient(Uuid::now_v7()), window("09:00", "17:00", &["Monday"])).await;
        assert!(matches!(as_patient, Err(AppError::Unauthorized(_))));

        let ghost = set(&db_pool, &cache, Identity::Doctor(Uuid::now_v7()), window("09:00", "17:00", &["Monday"])).await;
        assert!(matches!(ghost, Err(AppError::NotFound(_))));
    }
}
