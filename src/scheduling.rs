use serde::Deserialize;
use sqlx::PgPool;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::model::{Appointment, AppointmentRequest, AppointmentStatus, RequestStatus};

/// Fixed slot length for appointments created from approved requests.
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// Compose the appointment instant from a request's date and time. Requests
/// carry wall-clock values; the clinic calendar runs in UTC.
pub fn scheduled_at(date: Date, time: Time) -> OffsetDateTime {
    PrimitiveDateTime::new(date, time).assume_utc()
}

#[derive(Debug, Deserialize)]
pub struct NewAppointmentRequest {
    pub animal_id: Uuid,
    pub veterinarian_id: Option<Uuid>,
    pub requested_date: Date,
    pub requested_time: Time,
    pub notes: Option<String>,
}

/// Appointment request workflow: tutors submit, staff approve or reject.
/// `pending -> {approved, rejected}`, both terminal.
pub struct SchedulingService {
    db_pool: PgPool,
}

impl SchedulingService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Tutor-submitted request, entering the workflow as `pending`.
    pub async fn submit_request(
        &self,
        clinic_id: Uuid,
        tutor_id: Uuid,
        req: &NewAppointmentRequest,
    ) -> Result<AppointmentRequest> {
        // The animal must belong to the same clinic; a foreign id is a
        // tenant-isolation violation, not a scheduling error.
        let animal_in_clinic: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM animals WHERE id = $1 AND clinic_id = $2)",
        )
        .bind(req.animal_id)
        .bind(clinic_id)
        .fetch_one(&self.db_pool)
        .await?;

        if !animal_in_clinic {
            return Err(AppError::NotFound("animal"));
        }

        // Same boundary for a requested veterinarian: a foreign id would be
        // copied into the appointment on approval.
        if let Some(veterinarian_id) = req.veterinarian_id {
            let vet_in_clinic: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM veterinarians WHERE id = $1 AND clinic_id = $2)",
            )
            .bind(veterinarian_id)
            .bind(clinic_id)
            .fetch_one(&self.db_pool)
            .await?;

            if !vet_in_clinic {
                return Err(AppError::NotFound("veterinarian"));
            }
        }

        let request = sqlx::query_as::<_, AppointmentRequest>(
            "INSERT INTO appointment_requests
                 (clinic_id, tutor_id, animal_id, veterinarian_id,
                  requested_date, requested_time, notes, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING *",
        )
        .bind(clinic_id)
        .bind(tutor_id)
        .bind(req.animal_id)
        .bind(req.veterinarian_id)
        .bind(req.requested_date)
        .bind(req.requested_time)
        .bind(&req.notes)
        .bind(RequestStatus::Pending.as_str())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            "Appointment request {} submitted for clinic {}",
            request.id, clinic_id
        );
        Ok(request)
    }

    /// Pending requests for a clinic, newest first.
    pub async fn pending_requests(&self, clinic_id: Uuid) -> Result<Vec<AppointmentRequest>> {
        let requests = sqlx::query_as::<_, AppointmentRequest>(
            "SELECT * FROM appointment_requests
             WHERE clinic_id = $1 AND status = $2
             ORDER BY created_at DESC",
        )
        .bind(clinic_id)
        .bind(RequestStatus::Pending.as_str())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(requests)
    }

    /// Requests submitted by one tutor, newest first (tutor portal view).
    pub async fn requests_for_tutor(
        &self,
        clinic_id: Uuid,
        tutor_id: Uuid,
    ) -> Result<Vec<AppointmentRequest>> {
        let requests = sqlx::query_as::<_, AppointmentRequest>(
            "SELECT * FROM appointment_requests
             WHERE clinic_id = $1 AND tutor_id = $2
             ORDER BY created_at DESC",
        )
        .bind(clinic_id)
        .bind(tutor_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(requests)
    }

    /// Approve a pending request: create the confirmed appointment, then
    /// mark the request reviewed. The two writes are independent statements,
    /// not a transaction; a crash between them leaves the appointment in
    /// place with the request still pending.
    pub async fn approve(
        &self,
        clinic_id: Uuid,
        request_id: Uuid,
        reviewer: Uuid,
    ) -> Result<Appointment> {
        let request = self.fetch_pending(clinic_id, request_id).await?;

        let appointment = self.create_appointment_from_request(&request).await?;
        self.mark_reviewed(request.id, RequestStatus::Approved, reviewer, None)
            .await?;

        info!(
            "Request {} approved by {}, appointment {} created",
            request.id, reviewer, appointment.id
        );
        Ok(appointment)
    }

    /// Reject a pending request with a reason.
    pub async fn reject(
        &self,
        clinic_id: Uuid,
        request_id: Uuid,
        reviewer: Uuid,
        reason: &str,
    ) -> Result<()> {
        let request = self.fetch_pending(clinic_id, request_id).await?;

        self.mark_reviewed(request.id, RequestStatus::Rejected, reviewer, Some(reason))
            .await?;

        info!("Request {} rejected by {}", request.id, reviewer);
        Ok(())
    }

    /// Move an appointment through its lifecycle (confirmed, in progress,
    /// completed, cancelled).
    pub async fn update_status(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let appointment = sqlx::query_as::<_, Appointment>(
            "UPDATE appointments SET status = $3, updated_at = $4
             WHERE id = $1 AND clinic_id = $2
             RETURNING *",
        )
        .bind(appointment_id)
        .bind(clinic_id)
        .bind(status.as_str())
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("appointment"))?;

        info!(
            "Appointment {} moved to {} in clinic {}",
            appointment.id,
            status.as_str(),
            clinic_id
        );
        Ok(appointment)
    }

    /// Appointments for a clinic ordered by schedule.
    pub async fn list_appointments(&self, clinic_id: Uuid) -> Result<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE clinic_id = $1 ORDER BY scheduled_at",
        )
        .bind(clinic_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(appointments)
    }

    async fn fetch_pending(&self, clinic_id: Uuid, request_id: Uuid) -> Result<AppointmentRequest> {
        let request = sqlx::query_as::<_, AppointmentRequest>(
            "SELECT * FROM appointment_requests WHERE id = $1 AND clinic_id = $2",
        )
        .bind(request_id)
        .bind(clinic_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("appointment request"))?;

        if request.status != RequestStatus::Pending.as_str() {
            return Err(AppError::Conflict("request already reviewed".to_string()));
        }

        Ok(request)
    }

    /// First write of the approval sequence, visible on its own if the
    /// second write never lands.
    pub(crate) async fn create_appointment_from_request(
        &self,
        request: &AppointmentRequest,
    ) -> Result<Appointment> {
        let appointment = sqlx::query_as::<_, Appointment>(
            "INSERT INTO appointments
                 (clinic_id, animal_id, veterinarian_id, scheduled_at,
                  duration_minutes, status, notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING *",
        )
        .bind(request.clinic_id)
        .bind(request.animal_id)
        .bind(request.veterinarian_id)
        .bind(scheduled_at(request.requested_date, request.requested_time))
        .bind(DEFAULT_DURATION_MINUTES)
        .bind(AppointmentStatus::Confirmed.as_str())
        .bind(&request.notes)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        Ok(appointment)
    }

    async fn mark_reviewed(
        &self,
        request_id: Uuid,
        status: RequestStatus,
        reviewer: Uuid,
        reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE appointment_requests
             SET status = $2, reviewed_by = $3, reviewed_at = $4,
                 rejection_reason = $5, updated_at = $4
             WHERE id = $1",
        )
        .bind(request_id)
        .bind(status.as_str())
        .bind(reviewer)
        .bind(OffsetDateTime::now_utc())
        .bind(reason)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, time};

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("failed to connect to test database");
        sqlx::migrate!("./sql/migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");
        Some(pool)
    }

    async fn seed_request(pool: &PgPool) -> AppointmentRequest {
        let clinic: Uuid = sqlx::query_scalar("INSERT INTO clinics (name) VALUES ('t') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
        let tutor: Uuid = sqlx::query_scalar(
            "INSERT INTO tutors (clinic_id, name) VALUES ($1, 't') RETURNING id",
        )
        .bind(clinic)
        .fetch_one(pool)
        .await
        .unwrap();
        let animal: Uuid = sqlx::query_scalar(
            "INSERT INTO animals (clinic_id, tutor_id, name, species)
             VALUES ($1, $2, 'a', 'cat') RETURNING id",
        )
        .bind(clinic)
        .bind(tutor)
        .fetch_one(pool)
        .await
        .unwrap();

        SchedulingService::new(pool.clone())
            .submit_request(
                clinic,
                tutor,
                &NewAppointmentRequest {
                    animal_id: animal,
                    veterinarian_id: None,
                    requested_date: date!(2025 - 06 - 01),
                    requested_time: time!(11:00),
                    notes: None,
                },
            )
            .await
            .unwrap()
    }

    // The approval sequence is two independent writes. If only the first one
    // lands, the appointment exists while the request is still pending.
    #[tokio::test]
    async fn appointment_write_is_visible_without_the_review_write() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };

        let request = seed_request(&pool).await;
        let service = SchedulingService::new(pool.clone());

        let appointment = service.create_appointment_from_request(&request).await.unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed.as_str());

        let status: String =
            sqlx::query_scalar("SELECT status FROM appointment_requests WHERE id = $1")
                .bind(request.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, RequestStatus::Pending.as_str());
    }

    #[test]
    fn scheduled_at_composes_date_and_time() {
        let at = scheduled_at(date!(2025 - 03 - 10), time!(09:00));
        assert_eq!(at.date(), date!(2025 - 03 - 10));
        assert_eq!(at.time(), time!(09:00));
        assert_eq!(at.offset(), time::UtcOffset::UTC);
        assert_eq!(at.unix_timestamp(), 1741597200);
    }

    #[test]
    fn default_slot_is_thirty_minutes() {
        assert_eq!(DEFAULT_DURATION_MINUTES, 30);
    }
}
