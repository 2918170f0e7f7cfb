use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::error::{AppError, Result};
use crate::model::{AuthContext, Clinic, Role, User};

/// Which role-profile table a provisioning call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Veterinarian,
    Receptionist,
    Tutor,
}

impl ProfileKind {
    fn table(&self) -> &'static str {
        match self {
            ProfileKind::Veterinarian => "veterinarians",
            ProfileKind::Receptionist => "receptionists",
            ProfileKind::Tutor => "tutors",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            ProfileKind::Veterinarian => "veterinarian",
            ProfileKind::Receptionist => "receptionist",
            ProfileKind::Tutor => "tutor",
        }
    }
}

/// The columns provisioning needs from any of the three profile tables.
#[derive(Debug, FromRow)]
struct ProfileLink {
    id: Uuid,
    clinic_id: Uuid,
    user_id: Option<Uuid>,
    email: Option<String>,
    cpf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub clinic: ClinicData,
    pub profile: ProfileData,
}

#[derive(Debug, Deserialize)]
pub struct ClinicData {
    pub name: String,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileData {
    pub full_name: String,
    pub cpf: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupOutcome {
    pub user_id: Uuid,
    pub email: String,
    pub clinic_id: Uuid,
    pub clinic_name: String,
}

/// Keep only the digits of a national id (CPF). The result is the
/// deterministic initial credential for provisioned accounts.
pub fn cpf_digits(cpf: &str) -> String {
    cpf.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Privileged account provisioning. Every operation re-validates the
/// caller's admin membership against storage; the role claim in the session
/// token is never trusted on its own.
pub struct ProvisioningService {
    db_pool: PgPool,
    auth: Arc<AuthService>,
}

impl ProvisioningService {
    pub fn new(db_pool: PgPool, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    /// Founding-admin signup: identity, clinic, profile and an active admin
    /// membership in one flow. Any failure after identity creation deletes
    /// the identity.
    pub async fn signup(&self, req: &SignupRequest) -> Result<SignupOutcome> {
        if req.profile.full_name.trim().is_empty() {
            return Err(AppError::Validation("full_name is required".to_string()));
        }
        if req.clinic.name.trim().is_empty() {
            return Err(AppError::Validation("clinic name is required".to_string()));
        }

        let user = self.auth.register_user(&req.email, &req.password).await?;

        let clinic = match self.create_clinic(&req.clinic).await {
            Ok(clinic) => clinic,
            Err(err) => {
                self.rollback_identity(&user).await;
                return Err(err);
            }
        };

        if let Err(err) = self.create_profile(&user, &req.profile).await {
            self.rollback_identity(&user).await;
            return Err(err);
        }

        if let Err(err) = self.create_admin_membership(&user, clinic.id).await {
            self.rollback_identity(&user).await;
            return Err(err);
        }

        info!(
            "Signup completed: user_id {} founded clinic {}",
            user.user_id, clinic.id
        );
        Ok(SignupOutcome {
            user_id: user.user_id,
            email: user.email,
            clinic_id: clinic.id,
            clinic_name: clinic.name,
        })
    }

    /// Create an identity for an existing role-profile row and link it back.
    /// The initial credential is the profile's CPF digits.
    pub async fn create_portal_account(
        &self,
        caller: &AuthContext,
        kind: ProfileKind,
        profile_id: Uuid,
    ) -> Result<Uuid> {
        let profile = self.fetch_profile(kind, profile_id).await?;
        self.assert_clinic_admin(caller.user_id, profile.clinic_id)
            .await?;

        if profile.user_id.is_some() {
            return Err(AppError::Conflict(format!(
                "{} already has a linked account",
                kind.noun()
            )));
        }

        let email = profile
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!("{} has no email on record", kind.noun()))
            })?;
        let initial_password = cpf_digits(profile.cpf.as_deref().unwrap_or(""));
        if initial_password.is_empty() {
            return Err(AppError::Validation(format!(
                "{} has no CPF on record for the initial password",
                kind.noun()
            )));
        }

        let user_id = self
            .create_identity_and_link(kind, &profile, &email, &initial_password)
            .await?;

        info!(
            "Provisioned {} account: profile {} -> user {}",
            kind.noun(),
            profile.id,
            user_id
        );
        Ok(user_id)
    }

    /// Update the identity behind a role profile. A changed email is
    /// mirrored onto the profile row to keep the two in sync.
    pub async fn update_portal_user(
        &self,
        caller: &AuthContext,
        kind: ProfileKind,
        profile_id: Uuid,
        email: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<()> {
        let profile = self.fetch_profile(kind, profile_id).await?;
        self.assert_clinic_admin(caller.user_id, profile.clinic_id)
            .await?;

        let user_id = profile.user_id.ok_or_else(|| {
            AppError::Validation(format!("{} has no linked account", kind.noun()))
        })?;

        if let Some(password) = new_password {
            self.auth.update_credential(user_id, password).await?;
        }

        if let Some(email) = email {
            if email.trim().is_empty() {
                return Err(AppError::Validation("email must not be empty".to_string()));
            }
            self.auth.update_email(user_id, email).await?;

            if profile.email.as_deref() != Some(email) {
                sqlx::query(&format!(
                    "UPDATE {} SET email = $2, updated_at = $3 WHERE id = $1",
                    kind.table()
                ))
                .bind(profile.id)
                .bind(email)
                .bind(OffsetDateTime::now_utc())
                .execute(&self.db_pool)
                .await?;
            }
        }

        info!("Updated {} account: profile {}", kind.noun(), profile.id);
        Ok(())
    }

    /// Server-side re-check: the caller must hold an active admin membership
    /// in the target clinic.
    async fn assert_clinic_admin(&self, caller_id: Uuid, clinic_id: Uuid) -> Result<()> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM clinic_users
             WHERE user_id = $1 AND clinic_id = $2 AND is_active = TRUE",
        )
        .bind(caller_id)
        .bind(clinic_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match role.as_deref().and_then(Role::parse) {
            Some(role) if role.is_clinic_admin() => Ok(()),
            _ => Err(AppError::Authorization(
                "caller is not an admin of this clinic".to_string(),
            )),
        }
    }

    async fn fetch_profile(&self, kind: ProfileKind, profile_id: Uuid) -> Result<ProfileLink> {
        sqlx::query_as::<_, ProfileLink>(&format!(
            "SELECT id, clinic_id, user_id, email, cpf FROM {} WHERE id = $1",
            kind.table()
        ))
        .bind(profile_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound(kind.noun()))
    }

    /// Create the identity, then link it onto the profile row. If the link
    /// write fails the identity is deleted again, so a failed provisioning
    /// never leaves a usable credential behind.
    async fn create_identity_and_link(
        &self,
        kind: ProfileKind,
        profile: &ProfileLink,
        email: &str,
        initial_password: &str,
    ) -> Result<Uuid> {
        let user = self.auth.register_user(email, initial_password).await?;

        if let Err(err) = self.link_identity(kind, profile.id, user.user_id).await {
            self.rollback_identity(&user).await;
            return Err(err);
        }

        Ok(user.user_id)
    }

    async fn link_identity(&self, kind: ProfileKind, profile_id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET user_id = $2, updated_at = $3 WHERE id = $1 AND user_id IS NULL",
            kind.table()
        ))
        .bind(profile_id)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() != 1 {
            return Err(AppError::Conflict(format!(
                "{} is no longer available for linking",
                kind.noun()
            )));
        }

        Ok(())
    }

    /// Compensating action: delete an identity created earlier in a flow
    /// that subsequently failed. Deletion failures are logged, not raised;
    /// the original error is the one the caller needs to see.
    async fn rollback_identity(&self, user: &User) {
        if let Err(err) = self.auth.delete_user(user.user_id).await {
            warn!(
                "rollback failed, identity {} may be orphaned: {err}",
                user.user_id
            );
        }
    }

    async fn create_clinic(&self, data: &ClinicData) -> Result<Clinic> {
        let clinic = sqlx::query_as::<_, Clinic>(
            "INSERT INTO clinics (name, cnpj, phone, city, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING *",
        )
        .bind(&data.name)
        .bind(&data.cnpj)
        .bind(&data.phone)
        .bind(&data.city)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        Ok(clinic)
    }

    async fn create_profile(&self, user: &User, data: &ProfileData) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_profiles (id, full_name, cpf, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)",
        )
        .bind(user.user_id)
        .bind(&data.full_name)
        .bind(&data.cpf)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn create_admin_membership(&self, user: &User, clinic_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO clinic_users (clinic_id, user_id, role, is_active, created_at)
             VALUES ($1, $2, $3, TRUE, $4)",
        )
        .bind(clinic_id)
        .bind(user.user_id)
        .bind(Role::Admin.as_str())
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;

    async fn test_service() -> Option<(PgPool, ProvisioningService, Arc<AuthService>)> {
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

        let auth = Arc::new(AuthService::new(
            pool.clone(),
            JwtConfig::new("unit_test_secret", 3600, "clinicore-test".into()),
        ));
        let service = ProvisioningService::new(pool.clone(), auth.clone());
        Some((pool, service, auth))
    }

    // A failed link deletes the identity created for it, so no orphaned
    // credential can log in afterwards.
    #[tokio::test]
    async fn failed_link_rolls_back_the_identity() {
        let Some((_pool, service, auth)) = test_service().await else {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        };

        // A profile id that exists in no table makes the link write affect
        // zero rows.
        let phantom = ProfileLink {
            id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            user_id: None,
            email: Some(format!("ghost_{}@example.com", Uuid::new_v4().simple())),
            cpf: Some("000.111.222-33".to_string()),
        };
        let email = phantom.email.clone().unwrap();

        let result = service
            .create_identity_and_link(ProfileKind::Tutor, &phantom, &email, "00011122233")
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let login = auth.authenticate(&email, "00011122233").await;
        assert!(matches!(login, Err(AppError::Authentication)));
    }

    #[test]
    fn cpf_digits_strips_formatting() {
        assert_eq!(cpf_digits("123.456.789-09"), "12345678909");
        assert_eq!(cpf_digits("12345678909"), "12345678909");
        assert_eq!(cpf_digits("abc"), "");
        assert_eq!(cpf_digits(""), "");
    }

    #[test]
    fn profile_kind_targets_its_table() {
        assert_eq!(ProfileKind::Veterinarian.table(), "veterinarians");
        assert_eq!(ProfileKind::Receptionist.table(), "receptionists");
        assert_eq!(ProfileKind::Tutor.table(), "tutors");
    }
}
