use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::error::AppError;
use crate::model::AuthContext;
use crate::provisioning::ProfileKind;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub profile_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub success: bool,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePortalUserRequest {
    pub kind: ProfileKind,
    pub profile_id: Uuid,
    pub email: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatePortalUserResponse {
    pub success: bool,
}

async fn create_account(
    state: &AppState,
    context: &AuthContext,
    kind: ProfileKind,
    profile_id: Uuid,
) -> Result<Json<CreateAccountResponse>, AppError> {
    let user_id = state
        .provisioning
        .create_portal_account(context, kind, profile_id)
        .await?;

    Ok(Json(CreateAccountResponse { success: true, user_id }))
}

/// POST /functions/create-veterinarian-account
pub async fn create_veterinarian_account(
    State(state): State<AppState>,
    context: AuthContext,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, AppError> {
    create_account(&state, &context, ProfileKind::Veterinarian, req.profile_id).await
}

/// POST /functions/create-receptionist-account
pub async fn create_receptionist_account(
    State(state): State<AppState>,
    context: AuthContext,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, AppError> {
    create_account(&state, &context, ProfileKind::Receptionist, req.profile_id).await
}

/// POST /functions/create-tutor-account
pub async fn create_tutor_account(
    State(state): State<AppState>,
    context: AuthContext,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, AppError> {
    create_account(&state, &context, ProfileKind::Tutor, req.profile_id).await
}

/// POST /functions/update-portal-user — update the identity behind a role
/// profile; a changed email is mirrored onto the profile row.
pub async fn update_portal_user(
    State(state): State<AppState>,
    context: AuthContext,
    Json(req): Json<UpdatePortalUserRequest>,
) -> Result<Json<UpdatePortalUserResponse>, AppError> {
    state
        .provisioning
        .update_portal_user(
            &context,
            req.kind,
            req.profile_id,
            req.email.as_deref(),
            req.new_password.as_deref(),
        )
        .await?;

    Ok(Json(UpdatePortalUserResponse { success: true }))
}
