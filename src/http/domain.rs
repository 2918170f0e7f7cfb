use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::clinic::{NewAnimal, NewReceptionist, NewTutor, NewVeterinarian};
use crate::error::AppError;
use crate::model::{
    Animal, Appointment, AppointmentRequest, AppointmentStatus, AuthContext, Portal, Receptionist,
    Tutor, Veterinarian,
};
use crate::scheduling::NewAppointmentRequest;

#[derive(Debug, Deserialize)]
pub struct RejectRequestBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: AppointmentStatus,
}

/// GET /clinics/:clinic_id/animals — tutors see only their own animals.
pub async fn list_animals(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Vec<Animal>>, AppError> {
    context.require_clinic(clinic_id)?;

    let animals = match context.portal {
        Portal::Tutor => {
            let tutor_id = context.require_tutor()?;
            state.clinic.list_animals_for_tutor(clinic_id, tutor_id).await?
        }
        _ => state.clinic.list_animals(clinic_id).await?,
    };

    Ok(Json(animals))
}

/// POST /clinics/:clinic_id/animals
pub async fn create_animal(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
    Json(new): Json<NewAnimal>,
) -> Result<(StatusCode, Json<Animal>), AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let animal = state.clinic.create_animal(clinic_id, &new).await?;
    Ok((StatusCode::CREATED, Json(animal)))
}

/// GET /clinics/:clinic_id/tutors
pub async fn list_tutors(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Vec<Tutor>>, AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let tutors = state.clinic.list_tutors(clinic_id).await?;
    Ok(Json(tutors))
}

/// POST /clinics/:clinic_id/tutors
pub async fn create_tutor(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
    Json(new): Json<NewTutor>,
) -> Result<(StatusCode, Json<Tutor>), AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let tutor = state.clinic.create_tutor(clinic_id, &new).await?;
    Ok((StatusCode::CREATED, Json(tutor)))
}

/// GET /clinics/:clinic_id/veterinarians — any clinic member may list the
/// active veterinarians (tutors need them to request appointments).
pub async fn list_veterinarians(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Vec<Veterinarian>>, AppError> {
    context.require_clinic(clinic_id)?;

    let veterinarians = state.clinic.list_veterinarians(clinic_id).await?;
    Ok(Json(veterinarians))
}

/// POST /clinics/:clinic_id/veterinarians — data-only profile; an identity is
/// linked later by the provisioning endpoint.
pub async fn create_veterinarian(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
    Json(new): Json<NewVeterinarian>,
) -> Result<(StatusCode, Json<Veterinarian>), AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let veterinarian = state.clinic.create_veterinarian(clinic_id, &new).await?;
    Ok((StatusCode::CREATED, Json(veterinarian)))
}

/// GET /clinics/:clinic_id/receptionists
pub async fn list_receptionists(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Vec<Receptionist>>, AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let receptionists = state.clinic.list_receptionists(clinic_id).await?;
    Ok(Json(receptionists))
}

/// POST /clinics/:clinic_id/receptionists
pub async fn create_receptionist(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
    Json(new): Json<NewReceptionist>,
) -> Result<(StatusCode, Json<Receptionist>), AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let receptionist = state.clinic.create_receptionist(clinic_id, &new).await?;
    Ok((StatusCode::CREATED, Json(receptionist)))
}

/// GET /clinics/:clinic_id/appointments
pub async fn list_appointments(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let appointments = state.scheduling.list_appointments(clinic_id).await?;
    Ok(Json(appointments))
}

/// POST /clinics/:clinic_id/appointments/:appointment_id/status
pub async fn update_appointment_status(
    State(state): State<AppState>,
    context: AuthContext,
    Path((clinic_id, appointment_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Appointment>, AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let appointment = state
        .scheduling
        .update_status(clinic_id, appointment_id, body.status)
        .await?;
    Ok(Json(appointment))
}

/// GET /clinics/:clinic_id/appointment-requests — staff see the pending
/// queue, tutors see their own submissions.
pub async fn list_requests(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentRequest>>, AppError> {
    context.require_clinic(clinic_id)?;

    let requests = match context.portal {
        Portal::Tutor => {
            let tutor_id = context.require_tutor()?;
            state.scheduling.requests_for_tutor(clinic_id, tutor_id).await?
        }
        _ => {
            context.require_staff_rights()?;
            state.scheduling.pending_requests(clinic_id).await?
        }
    };

    Ok(Json(requests))
}

/// POST /clinics/:clinic_id/appointment-requests — tutor submission.
pub async fn submit_request(
    State(state): State<AppState>,
    context: AuthContext,
    Path(clinic_id): Path<Uuid>,
    Json(new): Json<NewAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentRequest>), AppError> {
    context.require_clinic(clinic_id)?;
    let tutor_id = context.require_tutor()?;

    let request = state.scheduling.submit_request(clinic_id, tutor_id, &new).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// POST /clinics/:clinic_id/appointment-requests/:request_id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    context: AuthContext,
    Path((clinic_id, request_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Appointment>, AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    let appointment = state
        .scheduling
        .approve(clinic_id, request_id, context.user_id)
        .await?;
    Ok(Json(appointment))
}

/// POST /clinics/:clinic_id/appointment-requests/:request_id/reject
pub async fn reject_request(
    State(state): State<AppState>,
    context: AuthContext,
    Path((clinic_id, request_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RejectRequestBody>,
) -> Result<StatusCode, AppError> {
    context.require_clinic(clinic_id)?;
    context.require_staff_rights()?;

    if body.reason.trim().is_empty() {
        return Err(AppError::Validation("a rejection reason is required".to_string()));
    }

    state
        .scheduling
        .reject(clinic_id, request_id, context.user_id, &body.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
