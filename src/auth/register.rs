use axum::{extract::State, response::Response};
use serde_json::Map;
use sqlx::SqlitePool;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    appresult::{is_unique_violation, FieldError},
    res::{self, AppJson},
    AppError, AppResult,
};

use super::{kind::{self, Registration, UserKind}, password, validate};

const FAILED: &str = "Registration unsuccessful";

/// Validates, hashes and stores a new account of kind `K`.
pub async fn register_user<K: UserKind>(db_pool: &SqlitePool, registration: Registration) -> AppResult<K::Registered> {
    let mut errors = Vec::new();

    for field in K::required_fields() {
        if registration.field(field).is_none() {
            errors.push(FieldError::new(*field, format!("{} is required", validate::humanize(field))));
        }
    }

    let email = registration.field("email");
    let phone = registration.field("phone");

    if let Some(email) = email {
        if kind::taken::<K, _>(db_pool, "email", email, None).await? {
            errors.push(FieldError::new("email", "Email already in use"));
        }
    }
    if let Some(phone) = phone {
        if kind::taken::<K, _>(db_pool, "phone", phone, None).await? {
            errors.push(FieldError::new("phone", "Phone number already in use"));
        }
    }

    kind::validate_contact(email, phone, &mut errors);
    K::check_fields(&registration, &mut errors);

    if !errors.is_empty() {
        return Err(AppError::validation(FAILED, errors));
    }

    let password_hash = password::hash(registration.text("password")).await?;
    let id = Uuid::now_v7();
    let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;

    let mut tx = db_pool.begin().await?;
    let registered = match K::insert(&mut *tx, id, &registration, &password_hash, &created_at).await {
        Ok(registered) => registered,
        Err(err) if is_unique_violation(&err) => {
            // Lost a race with a concurrent registration.
            let field = if err.to_string().contains("phone") { "phone" } else { "email" };
            return Err(AppError::invalid_field(FAILED, field, format!("{} already in use", validate::humanize(field))));
        }
        Err(err) => return Err(err.into()),
    };
    tx.commit().await?;

    info!(role = K::ROLE.as_str(), %id, "registered account");
    Ok(registered)
}

pub(crate) async fn register<K: UserKind>(
    State(db_pool): State<SqlitePool>,
    AppJson(registration): AppJson<Registration>,
) -> AppResult<Response> {
    let registered = register_user::<K>(&db_pool, registration).await?;
    let mut data = Map::new();
    data.insert(K::ROLE.as_str().to_owned(), serde_json::to_value(registered)?);
    Ok(res::created("Registration successful", data))
}
