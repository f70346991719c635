use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::Response,
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::Identity,
    cache::{self, Cache},
    db::DoctorRow,
    res::{self, AppPath},
    AppError, AppResult, AppState,
};

use super::{availability::days_of, read_through};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DoctorSummary {
    pub doctor_id: String,
    pub firstname: String,
    pub lastname: String,
    pub specialization: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorDetails {
    pub doctor_id: String,
    pub firstname: String,
    pub lastname: String,
    pub specialization: String,
    pub availability_start: Option<String>,
    pub availability_end: Option<String>,
    pub days_available: Vec<String>,
}

impl From<DoctorRow> for DoctorDetails {
    fn from(row: DoctorRow) -> Self {
        DoctorDetails {
            days_available: days_of(row.days_available.as_deref()),
            doctor_id: row.doctor_id,
            firstname: row.firstname,
            lastname: row.lastname,
            specialization: row.specialization,
            availability_start: row.availability_start,
            availability_end: row.availability_end,
        }
    }
}

pub async fn all(db_pool: &SqlitePool) -> AppResult<Vec<DoctorSummary>> {
    let doctors: Vec<DoctorSummary> = sqlx::query_as(
        "SELECT doctor_id,firstname,lastname,specialization FROM doctors ORDER BY employee_id",
    )
        .fetch(db_pool)
        .try_collect()
        .await?;
    Ok(doctors)
}

pub(super) async fn find(db_pool: &SqlitePool, doctor_id: Uuid) -> AppResult<Option<DoctorRow>> {
    Ok(sqlx::query_as("SELECT * FROM doctors WHERE doctor_id=?")
        .bind(doctor_id.to_string())
        .fetch_optional(db_pool)
        .await?)
}

pub async fn details(db_pool: &SqlitePool, cache: &dyn Cache, doctor_id: Uuid) -> AppResult<DoctorDetails> {
    read_through(cache, &cache::doctor_details_key(doctor_id), async {
        Ok::<_, AppError>(find(db_pool, doctor_id).await?.map(DoctorDetails::from))
    })
    .await?
    .ok_or(AppError::NotFound("Requested doctor not found".to_owned()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_doctors(State(db_pool): State<SqlitePool>, _identity: Identity) -> AppResult<Response> {
    let doctors = all(&db_pool).await?;
    if doctors.is_empty() {
        return Err(AppError::NotFound("No doctors found".to_owned()));
    }
    Ok(res::ok("Doctors fetched successfully", doctors))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_doctor(
    State(db_pool): State<SqlitePool>,
    State(cache): State<Arc<dyn Cache>>,
    _identity: Identity,
    AppPath(doctor_id): AppPath<Uuid>,
) -> AppResult<Response> {
    let details = details(&db_pool, cache.as_ref(), doctor_id).await?;
    Ok(res::ok("Doctor details fetched successfully", details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        doctors::testing::{insert_doctor, pool},
    };

    #[tokio::test]
    async fn lists_in_registration_order() {
        let db_pool = pool().await;
        assert!(all(&db_pool).await.unwrap().is_empty());

        let first = insert_doctor(&db_pool, "a@example.com").await;
        let second = insert_doctor(&db_pool, "b@example.com").await;

        let ids: Vec<_> = all(&db_pool).await.unwrap().into_iter().map(|d| d.doctor_id).collect();
        assert_eq!(ids, [first.to_string(), second.to_string()]);
    }

    #[tokio::test]
    async fn details_are_served_from_cache() {
        let db_pool = pool().await;
        let cache = MemoryCache::default();
        let id = insert_doctor(&db_pool, "a@example.com").await;

        let fresh = details(&db_pool, &cache, id).await.unwrap();
        assert_eq!(fresh.specialization, "Cardiology");
        assert!(fresh.days_available.is_empty());

        sqlx::query("UPDATE doctors SET specialization='Oncology' WHERE doctor_id=?")
            .bind(id.to_string())
            .execute(&db_pool)
            .await
            .unwrap();
        assert_eq!(details(&db_pool, &cache, id).await.unwrap(), fresh);

        cache.delete(&cache::doctor_details_key(id)).await;
        assert_eq!(details(&db_pool, &cache, id).await.unwrap().specialization, "Oncology");
    }

    #[tokio::test]
    async fn unknown_doctor_is_not_found() {
        let db_pool = pool().await;
        let err = details(&db_pool, &MemoryCache::default(), Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
