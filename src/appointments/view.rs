use axum::{
    debug_handler,
    extract::State,
    response::Response,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{kind, Bearer, Identity},
    res::{self, AppPath},
    AppError, AppResult, AppState,
};

use super::{owned_by, store, AppointmentService, AppointmentView};

impl AppointmentService {
    /// Every appointment the caller takes part in: a patient's bookings or a
    /// doctor's schedule.
    pub async fn list(&self, identity: Identity) -> AppResult<Vec<AppointmentView>> {
        kind::email_of(&self.db_pool, identity)
            .await?
            .ok_or(AppError::NotFound("User not found".to_owned()))?;

        store::list_for(&self.db_pool, identity).await
    }

    /// One of the calling patient's appointments. `token_subject` is the raw
    /// `sub` claim and must name the same patient as `identity`.
    pub async fn fetch(&self, identity: Identity, token_subject: &str, appointment_id: Uuid) -> AppResult<AppointmentView> {
        let (patient_id, _) = self
            .acting_patient(identity, "Unauthorized, only patients can view appointment details")
            .await?;

        let appointment = owned_by(
            &self.db_pool,
            patient_id,
            appointment_id,
            "You are not authorized to view this appointment",
        )
        .await?;

        if appointment.patient_id.to_string() != token_subject {
            return Err(AppError::Unauthorized("You are not authorized to view this appointment".to_owned()));
        }
        appointment.view()
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_appointments(
    State(appointments): State<AppointmentService>,
    identity: Identity,
) -> AppResult<Response> {
    let list = appointments.list(identity).await?;
    Ok(res::ok("Appointments fetched successfully", json!({ "appointments": list })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn view_appointment(
    State(appointments): State<AppointmentService>,
    Bearer(claims): Bearer,
    AppPath(appointment_id): AppPath<Uuid>,
) -> AppResult<Response> {
    let identity = claims.identity()?;
    let view = appointments.fetch(identity, &claims.sub, appointment_id).await?;
    Ok(res::ok("Appointment fetched successfully", view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        appointments::{testing::fixture, BookRequest},
        slot::SameSlotPolicy,
    };

    fn book(doctor: Identity, date: &str, time: &str) -> BookRequest {
        BookRequest {
            doctor_id: Some(doctor.subject().to_string()),
            date: Some(date.into()),
            time: Some(time.into()),
        }
    }

    #[tokio::test]
    async fn lists_by_role_in_slot_order() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let p1 = fx.patient("p1@example.com").await;
        let p2 = fx.patient("p2@example.com").await;
        let doctor = fx.doctor("d@example.com").await;
        let idle = fx.doctor("idle@example.com").await;

        fx.service.book(p1, book(doctor, "2025-06-02", "08:00")).await.unwrap();
        fx.service.book(p1, book(doctor, "2025-06-01", "10:00")).await.unwrap();
        fx.service.book(p2, book(doctor, "2025-06-01", "09:00")).await.unwrap();

        let mine = fx.service.list(p1).await.unwrap();
        let dates: Vec<_> = mine.iter().map(|a| (a.date.as_str(), a.time.as_str())).collect();
        assert_eq!(dates, [("2025-06-01", "10:00"), ("2025-06-02", "08:00")]);

        let schedule = fx.service.list(doctor).await.unwrap();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule[0].time, "09:00");

        assert!(fx.service.list(idle).await.unwrap().is_empty());

        let err = fx.service.list(Identity::Patient(Uuid::now_v7())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn fetch_checks_role_owner_and_subject() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let owner = fx.patient("owner@example.com").await;
        let other = fx.patient("other@example.com").await;
        let doctor = fx.doctor("d@example.com").await;

        let booked = fx.service.book(owner, book(doctor, "2025-06-01", "09:00")).await.unwrap();
        let id = Uuid::parse_str(&booked.appointment_id).unwrap();
        let owner_sub = owner.subject().to_string();

        assert_eq!(fx.service.fetch(owner, &owner_sub, id).await.unwrap(), booked);

        let as_doctor = fx.service.fetch(doctor, &doctor.subject().to_string(), id).await;
        assert!(matches!(as_doctor, Err(AppError::Unauthorized(_))));

        let as_other = fx.service.fetch(other, &other.subject().to_string(), id).await;
        assert!(matches!(as_other, Err(AppError::Unauthorized(_))));

        let mismatched = fx.service.fetch(owner, &other.subject().to_string(), id).await;
        assert!(matches!(mismatched, Err(AppError::Unauthorized(_))));

        let missing = fx.service.fetch(owner, &owner_sub, Uuid::now_v7()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
