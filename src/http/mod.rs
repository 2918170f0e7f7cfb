pub mod auth;
pub mod domain;
pub mod functions;

use axum::{
    Router, async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::clinic::ClinicService;
use crate::error::AppError;
use crate::model::{AuthContext, Portal};
use crate::provisioning::ProvisioningService;
use crate::scheduling::SchedulingService;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub provisioning: Arc<ProvisioningService>,
    pub scheduling: Arc<SchedulingService>,
    pub clinic: Arc<ClinicService>,
}

/// Bearer-token session extraction. Handlers that take an `AuthContext`
/// parameter only run for valid sessions.
#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Authentication)?;

        state.auth.validate_token(token)
    }
}

impl AuthContext {
    /// Every clinic-scoped route re-checks that the session's active clinic
    /// matches the clinic in the path. A foreign id is an authorization
    /// failure, not a 404.
    pub fn require_clinic(&self, clinic_id: Uuid) -> Result<(), AppError> {
        if self.clinic_id == Some(clinic_id) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "active clinic does not match the requested clinic".to_string(),
            ))
        }
    }

    /// Reviewing requests and managing clinic records is staff work; the
    /// reception portal shares it.
    pub fn require_staff_rights(&self) -> Result<(), AppError> {
        match self.portal {
            Portal::Staff | Portal::Receptionist => Ok(()),
            _ => Err(AppError::Authorization(
                "staff or reception access required".to_string(),
            )),
        }
    }

    /// Tutor-portal sessions carry the tutor profile id.
    pub fn require_tutor(&self) -> Result<Uuid, AppError> {
        if self.portal != Portal::Tutor {
            return Err(AppError::Authorization("tutor access required".to_string()));
        }
        self.profile_id
            .ok_or_else(|| AppError::Authorization("tutor session has no profile".to_string()))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/:portal/login", post(auth::login))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/switch-clinic", post(auth::switch_clinic))
        .route("/auth/password", post(auth::change_password))
        .route(
            "/clinics/:clinic_id/animals",
            get(domain::list_animals).post(domain::create_animal),
        )
        .route(
            "/clinics/:clinic_id/tutors",
            get(domain::list_tutors).post(domain::create_tutor),
        )
        .route(
            "/clinics/:clinic_id/veterinarians",
            get(domain::list_veterinarians).post(domain::create_veterinarian),
        )
        .route(
            "/clinics/:clinic_id/receptionists",
            get(domain::list_receptionists).post(domain::create_receptionist),
        )
        .route(
            "/clinics/:clinic_id/appointments",
            get(domain::list_appointments),
        )
        .route(
            "/clinics/:clinic_id/appointments/:appointment_id/status",
            post(domain::update_appointment_status),
        )
        .route(
            "/clinics/:clinic_id/appointment-requests",
            get(domain::list_requests).post(domain::submit_request),
        )
        .route(
            "/clinics/:clinic_id/appointment-requests/:request_id/approve",
            post(domain::approve_request),
        )
        .route(
            "/clinics/:clinic_id/appointment-requests/:request_id/reject",
            post(domain::reject_request),
        )
        .route(
            "/functions/create-veterinarian-account",
            post(functions::create_veterinarian_account),
        )
        .route(
            "/functions/create-receptionist-account",
            post(functions::create_receptionist_account),
        )
        .route(
            "/functions/create-tutor-account",
            post(functions::create_tutor_account),
        )
        .route("/functions/update-portal-user", post(functions::update_portal_user))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
