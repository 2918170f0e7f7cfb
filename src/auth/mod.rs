mod service;

use anyhow::{Result, anyhow};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::env;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{AuthContext, Portal, Role};

pub use service::AuthService;

/// JWT claims encoded in the session token. A token exists only for a fully
/// resolved portal session; there is no "authenticated but unresolved" state.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: Uuid,
    /// Portal the session was resolved against.
    pub portal: String,
    /// Active clinic id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<Uuid>,
    /// Role within the active clinic (staff sessions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Role-profile id (veterinarian/receptionist/tutor sessions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<Uuid>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
}

/// Configuration for JWT session tokens.
pub struct JwtConfig {
    /// Secret key for signing tokens.
    encoding_key: EncodingKey,
    /// Key for verifying token signatures.
    decoding_key: DecodingKey,
    /// Token expiration time in seconds.
    expiration: i64,
    /// Issuer claim value.
    issuer: String,
}

impl JwtConfig {
    pub fn new(secret: &str, expiration: i64, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration,
            issuer,
        }
    }

    /// Initialize JWT configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET").map_err(|_| anyhow!("JWT_SECRET must be set"))?;
        let expiration = env::var("JWT_EXPIRATION_SECONDS")
            .unwrap_or_else(|_| "86400".to_string()) // Default to 24 hours
            .parse::<i64>()
            .map_err(|_| anyhow!("JWT_EXPIRATION_SECONDS must be a valid number"))?;
        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "clinicore".to_string());

        Ok(Self::new(&secret, expiration, issuer))
    }

    /// Generate a session token for a resolved portal context.
    pub fn generate_token(&self, context: &AuthContext) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let expiration = now + Duration::seconds(self.expiration);

        let claims = Claims {
            sub: context.user_id,
            portal: context.portal.as_str().to_string(),
            cid: context.clinic_id,
            role: context.role.map(|r| r.as_str().to_string()),
            pid: context.profile_id,
            iat: now.unix_timestamp(),
            exp: expiration.unix_timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("failed to generate session token: {e}"))?;

        debug!("Generated session token for user_id: {}", context.user_id);
        Ok(token)
    }

    /// Validate a session token and extract the claims. Any signature,
    /// expiry or issuer failure is reported as an authentication error.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::Authentication)?;

        debug!("Validated session token for user_id: {}", token_data.claims.sub);
        Ok(token_data.claims)
    }

    /// Convert verified claims into a request context. Unknown portal or
    /// role strings mean the token was not minted by us.
    pub fn claims_to_auth_context(claims: Claims) -> Result<AuthContext, AppError> {
        let portal = Portal::parse(&claims.portal).ok_or(AppError::Authentication)?;
        let role = match claims.role.as_deref() {
            Some(r) => Some(Role::parse(r).ok_or(AppError::Authentication)?),
            None => None,
        };

        Ok(AuthContext {
            user_id: claims.sub,
            portal,
            clinic_id: claims.cid,
            role,
            profile_id: claims.pid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new("test_secret_key_for_session_tokens", 3600, "test_issuer".into())
    }

    #[test]
    fn token_lifecycle_for_staff_session() {
        let jwt = test_config();
        let clinic = Uuid::new_v4();
        let context = AuthContext {
            user_id: Uuid::new_v4(),
            portal: Portal::Staff,
            clinic_id: Some(clinic),
            role: Some(Role::Admin),
            profile_id: None,
        };

        let token = jwt.generate_token(&context).unwrap();
        assert!(!token.is_empty());

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, context.user_id);
        assert_eq!(claims.portal, "staff");
        assert_eq!(claims.cid, Some(clinic));
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert_eq!(claims.pid, None);

        let decoded = JwtConfig::claims_to_auth_context(claims).unwrap();
        assert_eq!(decoded.user_id, context.user_id);
        assert_eq!(decoded.portal, Portal::Staff);
        assert_eq!(decoded.clinic_id, Some(clinic));
        assert_eq!(decoded.role, Some(Role::Admin));
    }

    #[test]
    fn token_lifecycle_for_tutor_session() {
        let jwt = test_config();
        let profile = Uuid::new_v4();
        let clinic = Uuid::new_v4();
        let context = AuthContext {
            user_id: Uuid::new_v4(),
            portal: Portal::Tutor,
            clinic_id: Some(clinic),
            role: None,
            profile_id: Some(profile),
        };

        let token = jwt.generate_token(&context).unwrap();
        let decoded = JwtConfig::claims_to_auth_context(jwt.validate_token(&token).unwrap()).unwrap();
        assert_eq!(decoded.portal, Portal::Tutor);
        assert_eq!(decoded.profile_id, Some(profile));
        assert_eq!(decoded.role, None);
    }

    #[test]
    fn token_from_another_issuer_is_rejected() {
        let ours = test_config();
        let theirs = JwtConfig::new("test_secret_key_for_session_tokens", 3600, "someone_else".into());
        let context = AuthContext {
            user_id: Uuid::new_v4(),
            portal: Portal::Staff,
            clinic_id: None,
            role: None,
            profile_id: None,
        };

        let token = theirs.generate_token(&context).unwrap();
        assert!(matches!(ours.validate_token(&token), Err(AppError::Authentication)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let jwt = test_config();
        let context = AuthContext {
            user_id: Uuid::new_v4(),
            portal: Portal::Staff,
            clinic_id: None,
            role: None,
            profile_id: None,
        };

        let mut token = jwt.generate_token(&context).unwrap();
        token.push('x');
        assert!(matches!(jwt.validate_token(&token), Err(AppError::Authentication)));
    }
}
