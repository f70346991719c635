//! The two kinds of account, and the capability set the generic register and
//! login flows need from each of them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{appresult::FieldError, slot, AppResult};

use super::{validate, Identity, Role};

/// Registration body shared by both kinds; which fields are required depends
/// on the kind.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Registration {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub specialization: Option<String>,
    pub date_of_birth: Option<String>,
}

impl Registration {
    /// A field's trimmed value; empty strings count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "firstname" => self.firstname.as_deref(),
            "lastname" => self.lastname.as_deref(),
            "email" => self.email.as_deref(),
            "phone" => self.phone.as_deref(),
            "password" => self.password.as_deref(),
            "specialization" => self.specialization.as_deref(),
            "date_of_birth" => self.date_of_birth.as_deref(),
            _ => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    pub(crate) fn text(&self, name: &str) -> String {
        self.field(name).unwrap_or_default().to_owned()
    }
}

/// What login needs to know about an account.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: String,
    pub password: String,
    pub employee_id: Option<i64>,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
}

#[async_trait]
pub trait UserKind: Send + Sync + 'static {
    const ROLE: Role;
    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    /// Column holding the employee number, or `NULL` for kinds without one.
    const EMPLOYEE_COLUMN: &'static str;

    type Registered: Serialize + Send;

    fn required_fields() -> &'static [&'static str];

    /// Kind-specific format checks, run after the presence checks.
    fn check_fields(_registration: &Registration, _errors: &mut Vec<FieldError>) {}

    /// Inserts an already validated registration.
    async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        registration: &Registration,
        password_hash: &str,
        created_at: &str,
    ) -> Result<Self::Registered, sqlx::Error>;
}

pub struct PatientKind;
pub struct DoctorKind;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRegistered {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRegistered {
    pub id: String,
    pub employee_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
}

#[async_trait]
impl UserKind for PatientKind {
    const ROLE: Role = Role::Patient;
    const TABLE: &'static str = "patients";
    const ID_COLUMN: &'static str = "patient_id";
    const EMPLOYEE_COLUMN: &'static str = "NULL";

    type Registered = PatientRegistered;

    fn required_fields() -> &'static [&'static str] {
        &["firstname", "lastname", "email", "phone", "password", "date_of_birth"]
    }

    fn check_fields(registration: &Registration, errors: &mut Vec<FieldError>) {
        if let Some(dob) = registration.field("date_of_birth") {
            if slot::parse_date(dob).is_err() {
                errors.push(FieldError::new("date_of_birth", "Date of birth must be YYYY-MM-DD"));
            }
        }
    }

    async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        registration: &Registration,
        password_hash: &str,
        created_at: &str,
    ) -> Result<PatientRegistered, sqlx::Error> {
        let registered = PatientRegistered {
            id: id.to_string(),
            first_name: registration.text("firstname"),
            last_name: registration.text("lastname"),
            email: registration.text("email"),
            phone: registration.text("phone"),
            date_of_birth: registration.text("date_of_birth"),
        };

        sqlx::query(
            "INSERT INTO patients (patient_id,firstname,lastname,email,phone,date_of_birth,password,created_at) \
             VALUES (?,?,?,?,?,?,?,?)",
        )
            .bind(&registered.id)
            .bind(&registered.first_name)
            .bind(&registered.last_name)
            .bind(&registered.email)
            .bind(&registered.phone)
            .bind(&registered.date_of_birth)
            .bind(password_hash)
            .bind(created_at)
            .execute(conn)
            .await?;

        Ok(registered)
    }
}

#[async_trait]
impl UserKind for DoctorKind {
    const ROLE: Role = Role::Doctor;
    const TABLE: &'static str = "doctors";
    const ID_COLUMN: &'static str = "doctor_id";
    const EMPLOYEE_COLUMN: &'static str = "employee_id";

    type Registered = DoctorRegistered;

    fn required_fields() -> &'static [&'static str] {
        &["firstname", "lastname", "email", "phone", "password", "specialization"]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        registration: &Registration,
        password_hash: &str,
        created_at: &str,
    ) -> Result<DoctorRegistered, sqlx::Error> {
        let employee_id = sqlx::query("INSERT INTO employee_id_seq DEFAULT VALUES")
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

        let registered = DoctorRegistered {
            id: id.to_string(),
            employee_id,
            first_name: registration.text("firstname"),
            last_name: registration.text("lastname"),
            email: registration.text("email"),
            phone: registration.text("phone"),
            specialization: registration.text("specialization"),
        };

        sqlx::query(
            "INSERT INTO doctors (doctor_id,employee_id,firstname,lastname,specialization,email,phone,password,created_at) \
             VALUES (?,?,?,?,?,?,?,?,?)",
        )
            .bind(&registered.id)
            .bind(employee_id)
            .bind(&registered.first_name)
            .bind(&registered.last_name)
            .bind(&registered.specialization)
            .bind(&registered.email)
            .bind(&registered.phone)
            .bind(password_hash)
            .bind(created_at)
            .execute(conn)
            .await?;

        Ok(registered)
    }
}

/// True if `column` already holds `value` on an account other than `except`.
pub async fn taken<'e, K, E>(db: E, column: &str, value: &str, except: Option<Uuid>) -> AppResult<bool>
where
    K: UserKind,
    E: Executor<'e, Database = Sqlite>,
{
    let except = except.map(|id| id.to_string());
    let query = format!(
        "SELECT 1 FROM {table} WHERE {column}=? AND (? IS NULL OR {id}<>?) LIMIT 1",
        table = K::TABLE,
        id = K::ID_COLUMN,
    );
    let found: Option<(i64,)> = sqlx::query_as(&query)
        .bind(value)
        .bind(&except)
        .bind(&except)
        .fetch_optional(db)
        .await?;

    Ok(found.is_some())
}

pub async fn credentials<'e, K, E>(db: E, email: &str) -> AppResult<Option<Credentials>>
where
    K: UserKind,
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!(
        "SELECT {id} AS id,password,{employee} AS employee_id,firstname,lastname,email,phone \
         FROM {table} WHERE email=?",
        id = K::ID_COLUMN,
        employee = K::EMPLOYEE_COLUMN,
        table = K::TABLE,
    );

    Ok(sqlx::query_as(&query).bind(email).fetch_optional(db).await?)
}

async fn email_in<'e, K, E>(db: E, id: Uuid) -> AppResult<Option<String>>
where
    K: UserKind,
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("SELECT email FROM {} WHERE {}=?", K::TABLE, K::ID_COLUMN);
    let row: Option<(String,)> = sqlx::query_as(&query)
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    Ok(row.map(|(email,)| email))
}

/// The e-mail on the caller's own account, looked up in the table its role
/// names. `None` means the account no longer exists.
pub async fn email_of<'e, E>(db: E, identity: Identity) -> AppResult<Option<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    match identity {
        Identity::Patient(id) => email_in::<PatientKind, _>(db, id).await,
        Identity::Doctor(id) => email_in::<DoctorKind, _>(db, id).await,
    }
}

pub fn validate_contact(email: Option<&str>, phone: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(phone) = phone {
        if !validate::is_phone(phone) {
            errors.push(FieldError::new("phone", "Phone number is invalid"));
        }
    }
    if let Some(email) = email {
        if !validate::is_email(email) {
            errors.push(FieldError::new("email", "Email is invalid"));
        }
    }
}

pub async fn exists<'e, K, E>(db: E, id: Uuid) -> AppResult<bool>
where
    K: UserKind,
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("SELECT 1 FROM {} WHERE {}=?", K::TABLE, K::ID_COLUMN);
    let found: Option<(i64,)> = sqlx::query_as(&query)
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    Ok(found.is_some())
}
