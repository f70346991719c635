use axum::{
    debug_handler,
    extract::State,
    response::Response,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::Identity,
    notify::Mail,
    res::{self, AppPath},
    AppError, AppResult, AppState,
};

use super::{owned_by, store, AppointmentService};

impl AppointmentService {
    /// Cancels one of the calling patient's appointments. The row is removed,
    /// which frees its slot.
    pub async fn cancel(&self, identity: Identity, appointment_id: Uuid) -> AppResult<()> {
        let (patient_id, email) = self
            .acting_patient(identity, "Unauthorized, only patients can cancel appointments")
            .await?;

        owned_by(
            &self.db_pool,
            patient_id,
            appointment_id,
            "You are not authorized to cancel this appointment",
        )
        .await?;

        if !store::delete(&self.db_pool, appointment_id).await? {
            return Err(AppError::NotFound(format!("Appointment with ID {appointment_id} not found")));
        }
        info!(%appointment_id, %patient_id, "appointment cancelled");

        self.notify(Mail::new(email, "Appointment Cancellation", "Your appointment has been cancelled."));
        Ok(())
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_appointment(
    State(appointments): State<AppointmentService>,
    identity: Identity,
    AppPath(appointment_id): AppPath<Uuid>,
) -> AppResult<Response> {
    appointments.cancel(identity, appointment_id).await?;
    Ok(res::ok(
        "Appointment cancelled successfully",
        json!({ "appointmentId": appointment_id }),
    ))
}
