use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::error::AppError;
use crate::model::{AuthContext, Portal, PortalSession, Role};
use crate::provisioning::{SignupOutcome, SignupRequest};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(flatten)]
    pub session: PortalSession,
}

#[derive(Debug, Deserialize)]
pub struct SwitchClinicRequest {
    pub clinic_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SwitchClinicResponse {
    pub token: String,
    pub clinic_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

/// POST /auth/:portal/login
pub async fn login(
    State(state): State<AppState>,
    Path(portal): Path<Portal>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let (session, token) = state.auth.login(portal, &req.email, &req.password).await?;
    Ok(Json(LoginResponse { token, session }))
}

/// POST /auth/signup — founding-admin signup: identity, clinic, profile and
/// admin membership in one privileged flow.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupOutcome>), AppError> {
    if req.password.len() < 6 {
        return Err(AppError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let outcome = state.provisioning.signup(&req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /auth/switch-clinic — staff only; the target must be among the
/// caller's active memberships.
pub async fn switch_clinic(
    State(state): State<AppState>,
    context: AuthContext,
    Json(req): Json<SwitchClinicRequest>,
) -> Result<Json<SwitchClinicResponse>, AppError> {
    let (switched, token) = state.auth.switch_clinic(&context, req.clinic_id).await?;

    // switch_clinic always sets both on success
    let clinic_id = switched.clinic_id.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("switched session missing clinic id"))
    })?;
    let role = switched
        .role
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("switched session missing role")))?;

    Ok(Json(SwitchClinicResponse { token, clinic_id, role }))
}

/// POST /auth/password — self-service credential change (e.g. replacing the
/// CPF initial password).
pub async fn change_password(
    State(state): State<AppState>,
    context: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .update_credential(context.user_id, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tutor;
    use time::OffsetDateTime;

    #[test]
    fn login_response_flattens_the_session_beside_the_token() {
        let now = OffsetDateTime::now_utc();
        let response = LoginResponse {
            token: "session-token".to_string(),
            session: PortalSession::Tutor {
                profile: Tutor {
                    id: Uuid::new_v4(),
                    clinic_id: Uuid::new_v4(),
                    user_id: None,
                    name: "Ana Souza".to_string(),
                    cpf: None,
                    email: None,
                    phone: None,
                    address: None,
                    city: None,
                    created_at: now,
                    updated_at: now,
                },
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["token"], "session-token");
        assert_eq!(value["portal"], "tutor");
        assert_eq!(value["profile"]["name"], "Ana Souza");
    }
}
