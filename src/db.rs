use std::str::FromStr;

use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};

// Ids are stored as hyphenated uuid text, dates as YYYY-MM-DD, times as HH:MM.

#[derive(Debug, Clone, FromRow)]
pub struct PatientRow {
    pub patient_id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub image: Option<String>,
    pub address: Option<String>,
    pub age: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub blood_group: Option<String>,

    // unique: patient_id
    // unique: email
    // unique: phone
}

#[derive(Debug, Clone, FromRow)]
pub struct DoctorRow {
    pub doctor_id: String,
    pub employee_id: i64,
    pub firstname: String,
    pub lastname: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub image: Option<String>,
    pub availability_start: Option<String>,
    pub availability_end: Option<String>,
    pub days_available: Option<String>,

    // unique: doctor_id
    // unique: employee_id (from employee_id_seq, never reused)
    // unique: email
    // unique: phone
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub date: String,
    pub time: String,
    pub status: String,
    pub created_at: String,

    // unique: appointment_id
    // unique: doctor_id, date, time where status <> 'cancelled'
}

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
}

/// A private in-memory database. It is pinned to one connection that never
/// expires, because every new `:memory:` connection would start out empty.
pub async fn in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    migrate(&db_pool).await.map_err(|err| sqlx::Error::Migrate(Box::new(err)))?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(db_pool).await
}
