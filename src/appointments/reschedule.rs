use axum::{
    debug_handler,
    extract::State,
    response::Response,
};
use serde::Deserialize;
use time::{Date, Time};
use tracing::info;
use uuid::Uuid;

use crate::{
    appresult::FieldError,
    auth::Identity,
    notify::Mail,
    res::{self, AppJson, AppPath},
    slot::{self, Slot},
    AppError, AppResult, AppState,
};

use super::{owned_by, store, AppointmentService, AppointmentView};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub date: Option<String>,
    pub time: Option<String>,
}

impl RescheduleRequest {
    fn moment(&self) -> AppResult<(Date, Time)> {
        match (&self.date, &self.time) {
            (Some(date), Some(time)) => slot::parse_moment(date, time),
            (date, time) => {
                let mut errors = Vec::new();
                if date.is_none() {
                    errors.push(FieldError::new("date", "Date is required"));
                }
                if time.is_none() {
                    errors.push(FieldError::new("time", "Time is required"));
                }
                Err(AppError::validation("Invalid input", errors))
            }
        }
    }
}

impl AppointmentService {
    /// Moves one of the calling patient's appointments to a new date and time.
    /// On any failure the appointment keeps its old slot.
    pub async fn reschedule(
        &self,
        identity: Identity,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> AppResult<AppointmentView> {
        let (patient_id, email) = self
            .acting_patient(identity, "Unauthorized, only patients can reschedule appointments")
            .await?;

        let mut tx = self.db_pool.begin().await?;

        let mut appointment = owned_by(
            &mut *tx,
            patient_id,
            appointment_id,
            "You are not authorized to reschedule this appointment",
        )
        .await?;

        let (date, time) = request.moment()?;

        if let Some(doctor_id) = appointment.doctor_id {
            let target = Slot { doctor_id, date, time };
            if slot::has_conflict(&mut *tx, &target, self.same_slot.excluding(appointment_id)).await? {
                return Err(AppError::Conflict("Appointment already exists at this time".to_owned()));
            }
        }

        if !store::move_to(&mut *tx, appointment_id, date, time).await? {
            return Err(AppError::NotFound(format!("Appointment with ID {appointment_id} not found")));
        }
        tx.commit().await?;

        appointment.date = date;
        appointment.time = time;
        let view = appointment.view()?;
        info!(%appointment_id, %patient_id, date = %view.date, time = %view.time, "appointment rescheduled");

        self.notify(Mail::new(
            email,
            "Appointment Rescheduled",
            format!("Your appointment has been rescheduled to {} at {}.", view.date, view.time),
        ));
        Ok(view)
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn reschedule_appointment(
    State(appointments): State<AppointmentService>,
    identity: Identity,
    AppPath(appointment_id): AppPath<Uuid>,
    AppJson(request): AppJson<RescheduleRequest>,
) -> AppResult<Response> {
    let view = appointments.reschedule(identity, appointment_id, request).await?;
    Ok(res::ok("Appointment rescheduled successfully", view))
}
