//! Appointment booking, cancellation, rescheduling and the read side.

mod book;
mod cancel;
mod reschedule;
pub mod store;
mod view;

use std::sync::Arc;

use axum::{routing::{delete, get, post, put}, Router};
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::{kind, Identity},
    notify::{self, Mail, Notifier},
    slot::SameSlotPolicy,
    AppError, AppResult, AppState,
};

pub use book::BookRequest;
pub use reschedule::RescheduleRequest;
pub use store::{Appointment, AppointmentStatus, AppointmentView};

/// The appointment workflows, wired to their store and notifier.
#[derive(Clone)]
pub struct AppointmentService {
    db_pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    same_slot: SameSlotPolicy,
}

impl AppointmentService {
    pub fn new(db_pool: SqlitePool, notifier: Arc<dyn Notifier>, same_slot: SameSlotPolicy) -> Self {
        Self { db_pool, notifier, same_slot }
    }

    pub fn same_slot(&self) -> SameSlotPolicy {
        self.same_slot
    }

    /// The caller's patient id and e-mail. A vanished account is `NotFound`,
    /// a doctor is `Unauthorized` with `refusal`.
    async fn acting_patient(&self, identity: Identity, refusal: &str) -> AppResult<(Uuid, String)> {
        let email = kind::email_of(&self.db_pool, identity)
            .await?
            .ok_or(AppError::NotFound("User not found".to_owned()))?;
        let patient_id = identity.patient(refusal)?;
        Ok((patient_id, email))
    }

    fn notify(&self, mail: Mail) {
        notify::dispatch(&self.notifier, mail);
    }
}

/// Loads `appointment_id` and checks it belongs to `patient_id`.
async fn owned_by<'e, E>(db: E, patient_id: Uuid, appointment_id: Uuid, refusal: &str) -> AppResult<Appointment>
where
    E: Executor<'e, Database = Sqlite>,
{
    let appointment = store::find(db, appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Appointment with ID {appointment_id} not found")))?;

    if appointment.patient_id != patient_id {
        return Err(AppError::Unauthorized(refusal.to_owned()));
    }
    Ok(appointment)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view::list_appointments))
        .route("/book", post(book::book_appointment))
        .route("/cancel/{appointment_id}", delete(cancel::cancel_appointment))
        .route("/reschedule/{appointment_id}", put(reschedule::reschedule_appointment))
        .route("/{appointment_id}", get(view::view_appointment))
}
