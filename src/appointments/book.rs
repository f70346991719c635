use axum::{debug_handler, extract::State, response::Response};
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    appresult::FieldError,
    auth::{kind, DoctorKind, Identity},
    notify::Mail,
    res::{self, AppJson},
    slot::{self, Slot},
    AppError, AppResult, AppState,
};

use super::{store, Appointment, AppointmentService, AppointmentStatus, AppointmentView};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookRequest {
    pub doctor_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl BookRequest {
    fn slot(&self) -> AppResult<Slot> {
        let mut errors = Vec::new();
        let doctor_id = match self.doctor_id.as_deref() {
            None => {
                errors.push(FieldError::new("doctor_id", "Doctor id is required"));
                None
            }
            Some(raw) => match Uuid::parse_str(raw.trim()) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push(FieldError::new("doctor_id", "Doctor id is invalid"));
                    None
                }
            },
        };
        if self.date.is_none() {
            errors.push(FieldError::new("date", "Date is required"));
        }
        if self.time.is_none() {
            errors.push(FieldError::new("time", "Time is required"));
        }

        match (doctor_id, &self.date, &self.time) {
            (Some(doctor_id), Some(date), Some(time)) if errors.is_empty() => Slot::parse(doctor_id, date, time),
            _ => Err(AppError::validation("Invalid input", errors)),
        }
    }
}

impl AppointmentService {
    /// Books `request`'s slot for the calling patient.
    pub async fn book(&self, identity: Identity, request: BookRequest) -> AppResult<AppointmentView> {
        let (patient_id, email) = self
            .acting_patient(identity, "Unauthorized, only patients can book appointments")
            .await?;

        let slot = request.slot()?;

        if !kind::exists::<DoctorKind, _>(&self.db_pool, slot.doctor_id).await? {
            return Err(AppError::NotFound("Doctor not found".to_owned()));
        }

        if slot::has_conflict(&self.db_pool, &slot, None).await? {
            return Err(AppError::Conflict("Appointment already exists".to_owned()));
        }

        let appointment = Appointment {
            id: Uuid::now_v7(),
            patient_id,
            doctor_id: Some(slot.doctor_id),
            date: slot.date,
            time: slot.time,
            status: AppointmentStatus::Booked,
        };
        let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        // The unique slot index still rejects a booking that raced past the check.
        store::insert(&self.db_pool, &appointment, &created_at).await?;

        let view = appointment.view()?;
        info!(appointment_id = %appointment.id, %patient_id, doctor_id = %slot.doctor_id, date = %view.date, time = %view.time, "appointment booked");

        self.notify(Mail::new(
            email,
            "Appointment Confirmation",
            format!("Your appointment is booked for {} at {}.", view.date, view.time),
        ));
        Ok(view)
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn book_appointment(
    State(appointments): State<AppointmentService>,
    identity: Identity,
    AppJson(request): AppJson<BookRequest>,
) -> AppResult<Response> {
    let view = appointments.book(identity, request).await?;
    Ok(res::created("Appointment booked successfully", view))
}

#[cfg(test)]
mod tests {
    use futures_util::future::join;

    use super::*;
    use crate::{
        appointments::testing::{failing_fixture, fixture},
        slot::SameSlotPolicy,
    };

    fn request(doctor: Identity, date: &str, time: &str) -> BookRequest {
        BookRequest {
            doctor_id: Some(doctor.subject().to_string()),
            date: Some(date.into()),
            time: Some(time.into()),
        }
    }

    #[tokio::test]
    async fn books_and_notifies() {
        let mut fx = fixture(SameSlotPolicy::Allow).await;
        let patient = fx.patient("p@example.com").await;
        let doctor = fx.doctor("d@example.com").await;

        let view = fx.service.book(patient, request(doctor, "2025-06-01", "09:00")).await.unwrap();
        assert_eq!(view.status, "booked");
        assert_eq!(view.date, "2025-06-01");
        assert_eq!(view.time, "09:00");
        assert_eq!(view.patient_id, patient.subject().to_string());
        assert_eq!(view.doctor_id, Some(doctor.subject().to_string()));

        let mail = fx.mail.recv().await.unwrap();
        assert_eq!(mail.recipient, "p@example.com");
        assert_eq!(mail.body, "Your appointment is booked for 2025-06-01 at 09:00.");
    }

    #[tokio::test]
    async fn second_booking_of_slot_conflicts() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let p1 = fx.patient("p1@example.com").await;
        let p2 = fx.patient("p2@example.com").await;
        let doctor = fx.doctor("d@example.com").await;

        fx.service.book(p1, request(doctor, "2025-06-01", "09:00")).await.unwrap();
        let err = fx.service.book(p2, request(doctor, "2025-06-01", "09:00")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let other_time = fx.service.book(p2, request(doctor, "2025-06-01", "09:30")).await;
        assert!(other_time.is_ok());
    }

    #[tokio::test]
    async fn concurrent_bookings_admit_exactly_one() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let p1 = fx.patient("p1@example.com").await;
        let p2 = fx.patient("p2@example.com").await;
        let doctor = fx.doctor("d@example.com").await;

        let (a, b) = join(
            fx.service.book(p1, request(doctor, "2025-06-01", "09:00")),
            fx.service.book(p2, request(doctor, "2025-06-01", "09:00")),
        )
        .await;

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert!(matches!(a.err().or(b.err()), Some(AppError::Conflict(_))));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointments")
            .fetch_one(fx.db())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn store_index_rejects_duplicate_slot() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let p1 = fx.patient("p1@example.com").await;
        let doctor = fx.doctor("d@example.com").await;
        let view = fx.service.book(p1, request(doctor, "2025-06-01", "09:00")).await.unwrap();

        // Bypass the pre-check entirely.
        let mut duplicate = store::find(fx.db(), Uuid::parse_str(&view.appointment_id).unwrap())
            .await
            .unwrap()
            .unwrap();
        duplicate.id = Uuid::now_v7();
        let err = store::insert(fx.db(), &duplicate, "2025-01-01T00:00:00Z").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn doctors_cannot_book() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let doctor = fx.doctor("d@example.com").await;

        let err = fx.service.book(doctor, request(doctor, "2025-06-01", "09:00")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unknown_caller_is_not_found() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let doctor = fx.doctor("d@example.com").await;

        let ghost = Identity::Patient(Uuid::now_v7());
        let err = fx.service.book(ghost, request(doctor, "2025-06-01", "09:00")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn unparseable_slot_creates_nothing() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let patient = fx.patient("p@example.com").await;
        let doctor = fx.doctor("d@example.com").await;

        let bad_date = fx.service.book(patient, request(doctor, "2025-13-40", "09:00")).await;
        assert!(matches!(bad_date, Err(AppError::Validation { .. })));
        let bad_time = fx.service.book(patient, request(doctor, "2025-06-01", "25:99")).await;
        assert!(matches!(bad_time, Err(AppError::Validation { .. })));

        let mine = store::list_for(fx.db(), patient).await.unwrap();
        assert!(mine.is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_listed() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let patient = fx.patient("p@example.com").await;

        let Err(AppError::Validation { errors, .. }) = fx.service.book(patient, BookRequest::default()).await else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["doctor_id", "date", "time"]);
    }

    #[tokio::test]
    async fn unknown_doctor_is_not_found() {
        let fx = fixture(SameSlotPolicy::Allow).await;
        let patient = fx.patient("p@example.com").await;

        let ghost = Identity::Doctor(Uuid::now_v7());
        let err = fx.service.book(patient, request(ghost, "2025-06-01", "09:00")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn booking_survives_failed_notification() {
        let mut fx = failing_fixture(SameSlotPolicy::Allow).await;
        let patient = fx.patient("p@example.com").await;
        let doctor = fx.doctor("d@example.com").await;

        let view = fx.service.book(patient, request(doctor, "2025-06-01", "09:00")).await.unwrap();
        let attempted = fx.mail.recv().await.unwrap();
        assert_eq!(attempted.subject, "Appointment Confirmation");

        let id = Uuid::parse_str(&view.appointment_id).unwrap();
        let stored = store::find(fx.db(), id).await.unwrap().unwrap();
        assert_eq!(stored.view().unwrap(), view);
    }
}
