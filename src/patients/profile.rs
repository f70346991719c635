use axum::{debug_handler, extract::State, http::StatusCode, response::Response};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{
    appresult::{is_unique_violation, FieldError},
    auth::{kind, Identity, PatientKind},
    db::PatientRow,
    res::{self, AppJson},
    AppError, AppResult, AppState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientProfile {
    pub id: String,
    pub image: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub age: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub blood_group: Option<String>,
}

impl From<PatientRow> for PatientProfile {
    fn from(row: PatientRow) -> Self {
        PatientProfile {
            id: row.patient_id,
            image: row.image,
            name: format!("{} {}", row.firstname, row.lastname),
            email: row.email,
            phone: row.phone,
            address: row.address,
            age: row.age,
            weight: row.weight,
            height: row.height,
            blood_group: row.blood_group,
        }
    }
}

/// Partial profile update; absent fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PatientProfileUpdate {
    pub image: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub age: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub blood_group: Option<String>,
}

const PATIENTS_ONLY: &str = "Unauthorized, only patients can access this profile";
const FAILED: &str = "Profile update unsuccessful";

async fn find(db_pool: &SqlitePool, patient_id: Uuid) -> AppResult<Option<PatientRow>> {
    Ok(sqlx::query_as("SELECT * FROM patients WHERE patient_id=?")
        .bind(patient_id.to_string())
        .fetch_optional(db_pool)
        .await?)
}

pub async fn load(db_pool: &SqlitePool, identity: Identity) -> AppResult<PatientProfile> {
    let patient_id = identity.patient(PATIENTS_ONLY)?;
    find(db_pool, patient_id)
        .await?
        .map(PatientProfile::from)
        .ok_or(AppError::NotFound("Patient not found".to_owned()))
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim)
}

/// Validates a changed e-mail or phone number the way registration does.
async fn check(db_pool: &SqlitePool, current: &PatientRow, patient_id: Uuid, update: &PatientProfileUpdate) -> AppResult<()> {
    let email = trimmed(&update.email).filter(|email| *email != current.email);
    let phone = trimmed(&update.phone).filter(|phone| *phone != current.phone);

    let mut errors = Vec::new();
    for (field, value) in [("firstName", &update.first_name), ("lastName", &update.last_name)] {
        if trimmed(value).is_some_and(str::is_empty) {
            errors.push(FieldError::new(field, "Name cannot be empty"));
        }
    }

    kind::validate_contact(email, phone, &mut errors);
    if let Some(email) = email {
        if kind::taken::<PatientKind, _>(db_pool, "email", email, Some(patient_id)).await? {
            errors.push(FieldError::new("email", "Email already in use"));
        }
    }
    if let Some(phone) = phone {
        if kind::taken::<PatientKind, _>(db_pool, "phone", phone, Some(patient_id)).await? {
            errors.push(FieldError::new("phone", "Phone number already in use"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(FAILED, errors))
    }
}

pub async fn update(db_pool: &SqlitePool, identity: Identity, update: PatientProfileUpdate) -> AppResult<PatientProfile> {
    let patient_id = identity.patient(PATIENTS_ONLY)?;
    let current = find(db_pool, patient_id)
        .await?
        .ok_or(AppError::NotFound("Patient not found".to_owned()))?;
    check(db_pool, &current, patient_id, &update).await?;

    let row: Option<PatientRow> = sqlx::query_as(
        "UPDATE patients SET image=COALESCE(?,image), firstname=COALESCE(?,firstname), \
         lastname=COALESCE(?,lastname), email=COALESCE(?,email), phone=COALESCE(?,phone), \
         address=COALESCE(?,address), age=COALESCE(?,age), weight=COALESCE(?,weight), \
         height=COALESCE(?,height), blood_group=COALESCE(?,blood_group) \
         WHERE patient_id=? RETURNING *",
    )
        .bind(&update.image)
        .bind(trimmed(&update.first_name))
        .bind(trimmed(&update.last_name))
        .bind(trimmed(&update.email))
        .bind(trimmed(&update.phone))
        .bind(&update.address)
        .bind(&update.age)
        .bind(&update.weight)
        .bind(&update.height)
        .bind(&update.blood_group)
        .bind(patient_id.to_string())
        .fetch_optional(db_pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("Email or phone number already in use".to_owned())
            } else {
                err.into()
            }
        })?;

    let profile = row
        .map(PatientProfile::from)
        .ok_or(AppError::NotFound("Patient not found".to_owned()))?;
    info!(%patient_id, "patient profile updated");
    Ok(profile)
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_profile(State(db_pool): State<SqlitePool>, identity: Identity) -> AppResult<Response> {
    let profile = load(&db_pool, identity).await?;
    Ok(res::ok("Profile fetched successfully", profile))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_profile(
    State(db_pool): State<SqlitePool>,
    identity: Identity,
    AppJson(request): AppJson<PatientProfileUpdate>,
) -> AppResult<Response> {
    let profile = update(&db_pool, identity, request).await?;
    Ok(res::ok("Profile updated successfully", profile))
}

/// Same update as PUT, answered with 201.
#[debug_handler(state = AppState)]
pub(crate) async fn create_profile(
    State(db_pool): State<SqlitePool>,
    identity: Identity,
    AppJson(request): AppJson<PatientProfileUpdate>,
) -> AppResult<Response> {
    let profile = update(&db_pool, identity, request).await?;
    Ok(res::success(StatusCode::CREATED, "Profile created successfully", profile))
}
