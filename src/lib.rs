pub mod appointments;
pub mod appresult;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod doctors;
pub mod notify;
pub mod patients;
pub mod res;
pub mod slot;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use appointments::AppointmentService;
use auth::TokenSigner;
use cache::Cache;
use notify::Notifier;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub tokens: TokenSigner,
    pub cache: Arc<dyn Cache>,
    pub appointments: AppointmentService,
}

impl AppState {
    pub fn new(
        db_pool: SqlitePool,
        tokens: TokenSigner,
        cache: Arc<dyn Cache>,
        notifier: Arc<dyn Notifier>,
        same_slot: slot::SameSlotPolicy,
    ) -> Self {
        let appointments = AppointmentService::new(db_pool.clone(), notifier, same_slot);
        Self { db_pool, tokens, cache, appointments }
    }
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .nest("/api/patients", patients::router())
        .nest("/api/doctors", doctors::router())
        .nest("/api/appointments", appointments::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
