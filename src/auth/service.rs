use anyhow::anyhow;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::JwtConfig;
use crate::db;
use crate::error::{AppError, Result};
use crate::model::{
    AuthContext, ClinicMembership, Membership, Portal, PortalSession, Receptionist, Role, Tutor,
    User, UserProfile, Veterinarian,
};

/// Authentication service: credential verification, portal resolution and
/// active-clinic switching.
pub struct AuthService {
    /// Database connection pool.
    db_pool: PgPool,
    /// JWT configuration.
    pub jwt_config: JwtConfig,
}

impl AuthService {
    pub fn new(db_pool: PgPool, jwt_config: JwtConfig) -> Self {
        Self { db_pool, jwt_config }
    }

    /// Hash a password using Argon2.
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("password hashing error: {e}"))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash using Argon2.
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow!("password hash parsing error: {e}"))?;
        let result = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();
        Ok(result)
    }

    /// Verify credentials against the identity store. Unknown email and bad
    /// password are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AppError::Authentication)?;

        if !Self::verify_password(password, &user.password_hash)? {
            error!("Password verification failed for user: {}", email);
            return Err(AppError::Authentication);
        }

        Ok(user)
    }

    /// Full portal login: verify credentials, resolve the claimed portal,
    /// and only then mint a session token. A role mismatch never leaves a
    /// partially-authenticated session behind because no token exists until
    /// resolution succeeds.
    pub async fn login(
        &self,
        portal: Portal,
        email: &str,
        password: &str,
    ) -> Result<(PortalSession, String)> {
        let user = self.authenticate(email, password).await?;
        let (session, context) = self.resolve_portal(&user, portal).await?;
        let token = self.jwt_config.generate_token(&context)?;

        info!("User authenticated on {} portal: {}", portal, email);
        Ok((session, token))
    }

    /// Verify that an active role profile or membership exists for the
    /// claimed portal and build the resolved session.
    pub async fn resolve_portal(
        &self,
        user: &User,
        portal: Portal,
    ) -> Result<(PortalSession, AuthContext)> {
        match portal {
            Portal::Staff => self.resolve_staff(user).await,
            Portal::Veterinarian => {
                let profile = sqlx::query_as::<_, Veterinarian>(
                    "SELECT * FROM veterinarians WHERE user_id = $1",
                )
                .bind(user.user_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(AppError::RoleMismatch(portal))?;

                // Inactive veterinarians are denied even with correct
                // credentials.
                if !profile.is_active {
                    return Err(AppError::RoleMismatch(portal));
                }

                let context = AuthContext {
                    user_id: user.user_id,
                    portal,
                    clinic_id: Some(profile.clinic_id),
                    role: None,
                    profile_id: Some(profile.id),
                };
                Ok((PortalSession::Veterinarian { profile }, context))
            }
            Portal::Receptionist => {
                let profile = sqlx::query_as::<_, Receptionist>(
                    "SELECT * FROM receptionists WHERE user_id = $1",
                )
                .bind(user.user_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(AppError::RoleMismatch(portal))?;

                let context = AuthContext {
                    user_id: user.user_id,
                    portal,
                    clinic_id: Some(profile.clinic_id),
                    role: None,
                    profile_id: Some(profile.id),
                };
                Ok((PortalSession::Receptionist { profile }, context))
            }
            Portal::Tutor => {
                let profile =
                    sqlx::query_as::<_, Tutor>("SELECT * FROM tutors WHERE user_id = $1")
                        .bind(user.user_id)
                        .fetch_optional(&self.db_pool)
                        .await?
                        .ok_or(AppError::RoleMismatch(portal))?;

                let context = AuthContext {
                    user_id: user.user_id,
                    portal,
                    clinic_id: Some(profile.clinic_id),
                    role: None,
                    profile_id: Some(profile.id),
                };
                Ok((PortalSession::Tutor { profile }, context))
            }
        }
    }

    /// Staff resolution: load every active membership, enrich clinic names
    /// in one batch lookup, and select the earliest membership as the
    /// current clinic.
    async fn resolve_staff(&self, user: &User) -> Result<(PortalSession, AuthContext)> {
        // Membership resolution spans clinics; run every lookup on one
        // connection with the clinic context cleared.
        let mut conn = db::unscoped_connection(&self.db_pool).await?;

        let memberships = sqlx::query_as::<_, Membership>(
            "SELECT * FROM clinic_users
             WHERE user_id = $1 AND is_active = TRUE
             ORDER BY created_at",
        )
        .bind(user.user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut staff: Vec<(Uuid, Role)> = Vec::with_capacity(memberships.len());
        for m in &memberships {
            let role = Role::parse(&m.role)
                .ok_or_else(|| anyhow!("unknown role in clinic_users: {}", m.role))?;
            if role.is_staff() {
                staff.push((m.clinic_id, role));
            }
        }

        if staff.is_empty() {
            return Err(AppError::RoleMismatch(Portal::Staff));
        }

        let clinic_ids: Vec<Uuid> = staff.iter().map(|(id, _)| *id).collect();
        let names: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM clinics WHERE id = ANY($1)")
                .bind(&clinic_ids)
                .fetch_all(&mut *conn)
                .await?;

        let clinics: Vec<ClinicMembership> = staff
            .iter()
            .map(|(clinic_id, role)| ClinicMembership {
                clinic_id: *clinic_id,
                clinic_name: names
                    .iter()
                    .find(|(id, _)| id == clinic_id)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                role: *role,
            })
            .collect();

        let profile =
            sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = $1")
                .bind(user.user_id)
                .fetch_optional(&mut *conn)
                .await?;

        let current = &clinics[0];
        let context = AuthContext {
            user_id: user.user_id,
            portal: Portal::Staff,
            clinic_id: Some(current.clinic_id),
            role: Some(current.role),
            profile_id: None,
        };
        let session = PortalSession::Staff {
            profile,
            current_clinic_id: current.clinic_id,
            role: current.role,
            clinics,
        };

        Ok((session, context))
    }

    /// Switch the active clinic of a staff session. The target clinic must
    /// be among the caller's active memberships; a new token is minted with
    /// the membership's role.
    pub async fn switch_clinic(
        &self,
        context: &AuthContext,
        clinic_id: Uuid,
    ) -> Result<(AuthContext, String)> {
        if context.portal != Portal::Staff {
            return Err(AppError::Authorization(
                "only staff sessions can switch clinics".to_string(),
            ));
        }

        let membership: Option<String> = sqlx::query_scalar(
            "SELECT role FROM clinic_users
             WHERE user_id = $1 AND clinic_id = $2 AND is_active = TRUE",
        )
        .bind(context.user_id)
        .bind(clinic_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let role = membership
            .ok_or_else(|| AppError::Authorization("no membership in this clinic".to_string()))?;
        let role =
            Role::parse(&role).ok_or_else(|| anyhow!("unknown role in clinic_users: {role}"))?;

        let switched = AuthContext {
            clinic_id: Some(clinic_id),
            role: Some(role),
            ..context.clone()
        };
        let token = self.jwt_config.generate_token(&switched)?;

        debug!(
            "Clinic context switched for user_id: {}, clinic_id: {}",
            switched.user_id, clinic_id
        );
        Ok((switched, token))
    }

    /// Validate a session token and extract the request context.
    pub fn validate_token(&self, token: &str) -> Result<AuthContext> {
        let claims = self.jwt_config.validate_token(token)?;
        let context = JwtConfig::claims_to_auth_context(claims)?;

        debug!("Token validated for user_id: {}", context.user_id);
        Ok(context)
    }

    /// Create a new identity. Used by signup and by the provisioning
    /// endpoints; never exposed directly to unauthenticated callers.
    pub async fn register_user(&self, email: &str, password: &str) -> Result<User> {
        let password_hash = Self::hash_password(password)?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $3)
             RETURNING *",
        )
        .bind(email)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Conflict("email already registered".to_string())
            }
            _ => AppError::Remote(e),
        })?;

        info!("New identity registered: {}", email);
        Ok(user)
    }

    /// Delete an identity. Profile rows keep existing (their back-reference
    /// is severed by the schema); this is the provisioning rollback hook.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        info!("Identity deleted: {}", user_id);
        Ok(())
    }

    /// Change the caller's own credential (e.g. after first login with the
    /// CPF initial password).
    pub async fn update_credential(&self, user_id: Uuid, new_password: &str) -> Result<()> {
        if new_password.len() < 6 {
            return Err(AppError::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }

        let password_hash = Self::hash_password(new_password)?;
        sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = $3 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db_pool)
        .await?;

        info!("Credential updated for user_id: {}", user_id);
        Ok(())
    }

    /// Update an identity's email address.
    pub async fn update_email(&self, user_id: Uuid, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET email = $2, updated_at = $3 WHERE user_id = $1")
            .bind(user_id)
            .bind(email)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.db_pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                    AppError::Conflict("email already registered".to_string())
                }
                _ => AppError::Remote(e),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashing_round_trip() {
        let password = "test_password";
        let hash = AuthService::hash_password(password).unwrap();

        assert!(AuthService::verify_password(password, &hash).unwrap());
        assert!(!AuthService::verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = AuthService::hash_password("same_password").unwrap();
        let b = AuthService::hash_password("same_password").unwrap();
        assert_ne!(a, b);
    }
}
