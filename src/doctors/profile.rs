use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, response::Response};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    appresult::FieldError,
    auth::{validate::humanize, Identity},
    cache::Cache,
    db::DoctorRow,
    res::{self, AppJson},
    AppError, AppResult, AppState,
};

use super::{directory, invalidate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorProfile {
    pub doctor_id: String,
    pub employee_id: i64,
    pub firstname: String,
    pub lastname: String,
    pub specialization: String,
    pub image: Option<String>,
    pub email: String,
    pub phone: String,
}

impl From<DoctorRow> for DoctorProfile {
    fn from(row: DoctorRow) -> Self {
        DoctorProfile {
            doctor_id: row.doctor_id,
            employee_id: row.employee_id,
            firstname: row.firstname,
            lastname: row.lastname,
            specialization: row.specialization,
            image: row.image,
            email: row.email,
            phone: row.phone,
        }
    }
}

/// Fields a doctor may change on their own profile. Absent fields are kept.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DoctorProfileUpdate {
    pub image: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Updated {
    doctor_id: String,
    firstname: String,
    lastname: String,
    specialization: String,
    image: Option<String>,
}

impl DoctorProfileUpdate {
    fn check(&self) -> AppResult<()> {
        let errors: Vec<_> = [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("specialization", &self.specialization),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()))
        .map(|(field, _)| FieldError::new(field, format!("{} cannot be empty", humanize(field))))
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation("Profile update unsuccessful", errors))
        }
    }
}

const DOCTORS_ONLY: &str = "Unauthorized, only doctors can access this profile";

pub async fn load(db_pool: &SqlitePool, identity: Identity) -> AppResult<DoctorProfile> {
    let doctor_id = identity.doctor(DOCTORS_ONLY)?;
    directory::find(db_pool, doctor_id)
        .await?
        .map(DoctorProfile::from)
        .ok_or(AppError::NotFound("Doctor not found".to_owned()))
}

/// Applies `update` to the calling doctor and drops their cached details.
pub async fn update(
    db_pool: &SqlitePool,
    cache: &Arc<dyn Cache>,
    identity: Identity,
    update: DoctorProfileUpdate,
) -> AppResult<DoctorProfile> {
    let doctor_id = identity.doctor(DOCTORS_ONLY)?;
    update.check()?;

    let row: Option<DoctorRow> = sqlx::query_as(
        "UPDATE doctors SET image=COALESCE(?,image), firstname=COALESCE(?,firstname), \
         lastname=COALESCE(?,lastname), specialization=COALESCE(?,specialization) \
         WHERE doctor_id=? RETURNING *",
    )
        .bind(&update.image)
        .bind(update.firstname.as_deref().map(str::trim))
        .bind(update.lastname.as_deref().map(str::trim))
        .bind(update.specialization.as_deref().map(str::trim))
        .bind(doctor_id.to_string())
        .fetch_optional(db_pool)
        .await?;
    let profile = row
        .map(DoctorProfile::from)
        .ok_or(AppError::NotFound("Doctor not found".to_owned()))?;

    invalidate(cache, doctor_id).await;
    info!(%doctor_id, "doctor profile updated");
    Ok(profile)
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_profile(State(db_pool): State<SqlitePool>, identity: Identity) -> AppResult<Response> {
    let profile = load(&db_pool, identity).await?;
    Ok(res::ok("Profile fetched successfully", profile))
}

async fn apply(
    db_pool: SqlitePool,
    cache: Arc<dyn Cache>,
    identity: Identity,
    request: DoctorProfileUpdate,
    code: StatusCode,
    message: &str,
) -> AppResult<Response> {
    let profile = update(&db_pool, &cache, identity, request).await?;
    let updated = Updated {
        doctor_id: profile.doctor_id,
        firstname: profile.firstname,
        lastname: profile.lastname,
        specialization: profile.specialization,
        image: profile.image,
    };
    Ok(res::success(code, message, updated))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_profile(
    State(db_pool): State<SqlitePool>,
    State(cache): State<Arc<dyn Cache>>,
    identity: Identity,
    AppJson(request): AppJson<DoctorProfileUpdate>,
) -> AppResult<Response> {
    apply(db_pool, cache, identity, request, StatusCode::OK, "Profile updated successfully").await
}

/// Same update as PUT, answered with 201.
#[debug_handler(state = AppState)]
pub(crate) async fn create_profile(
    State(db_pool): State<SqlitePool>,
    State(cache): State<Arc<dyn Cache>>,
    identity: Identity,
    AppJson(request): AppJson<DoctorProfileUpdate>,
) -> AppResult<Response> {
    apply(db_pool, cache, identity, request, StatusCode::CREATED, "Profile created successfully").await
}
