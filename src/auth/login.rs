use axum::{extract::State, response::Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{res::{self, AppJson}, AppError, AppResult};

use super::{kind::{self, UserKind}, password, validate, Identity, Role, TokenSigner};

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    /// Doctors only. Accepted as a number or a numeric string.
    pub employee_id: Option<Value>,
}

pub struct LoggedIn {
    pub access_token: String,
    pub identity: Identity,
    pub profile: Value,
}

fn required(field: &str) -> AppError {
    AppError::invalid_field(format!("{field} is required"), field, format!("{field} is required"))
}

fn employee_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Checks credentials for an account of kind `K` and issues a token.
pub async fn authenticate<K: UserKind>(
    db_pool: &SqlitePool,
    tokens: &TokenSigner,
    request: LoginRequest,
) -> AppResult<LoggedIn> {
    let email = request.email.ok_or_else(|| required("email"))?;
    let password = request.password.ok_or_else(|| required("password"))?;
    let employee_id = match K::ROLE {
        Role::Doctor => Some(request.employee_id.ok_or_else(|| required("employee_id"))?),
        Role::Patient => None,
    };

    let Some(account) = kind::credentials::<K, _>(db_pool, &email).await? else {
        return Err(AppError::NotFound(format!("{} not found", validate::humanize(K::ROLE.as_str()))));
    };

    if let Some(employee_id) = employee_id {
        if employee_number(&employee_id) != account.employee_id {
            return Err(AppError::InvalidCredentials("Invalid employee ID".to_owned()));
        }
    }

    if !password::verify(password, account.password.clone()).await? {
        return Err(AppError::InvalidCredentials("Invalid password".to_owned()));
    }

    let identity = Identity::new(K::ROLE, Uuid::parse_str(&account.id)?);
    let access_token = tokens.issue(identity)?;
    info!(role = K::ROLE.as_str(), id = %account.id, "login");

    Ok(LoggedIn {
        access_token,
        identity,
        profile: json!({
            (format!("{}Id", K::ROLE.as_str())): account.id,
            "firstName": account.firstname,
            "lastName": account.lastname,
            "email": account.email,
            "phone": account.phone,
        }),
    })
}

pub(crate) async fn login<K: UserKind>(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenSigner>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Response> {
    let logged_in = authenticate::<K>(&db_pool, &tokens, request).await?;

    let mut data = Map::new();
    data.insert("accessToken".to_owned(), Value::String(logged_in.access_token));
    data.insert(logged_in.identity.role().as_str().to_owned(), logged_in.profile);
    Ok(res::ok("Login successful", data))
}
