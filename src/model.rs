use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

/// Credential-bearing account. The single source of truth for "who is this
/// user"; everything else links to it by `user_id`.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub cpf: Option<String>,
    pub professional_register: Option<String>,
    pub is_super_admin: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The join of identity, clinic and role. An inactive membership is treated
/// as absent for authorization purposes.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub clinic_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// A membership enriched with the clinic name, as presented to staff after
/// login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicMembership {
    pub clinic_id: Uuid,
    pub clinic_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Veterinarian {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub crmv: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Receptionist {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Tutor {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Animal {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub tutor_id: Uuid,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub birth_date: Option<Date>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub animal_id: Uuid,
    pub veterinarian_id: Option<Uuid>,
    pub scheduled_at: OffsetDateTime,
    pub duration_minutes: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct AppointmentRequest {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub tutor_id: Uuid,
    pub animal_id: Uuid,
    pub veterinarian_id: Option<Uuid>,
    pub requested_date: Date,
    pub requested_time: Time,
    pub notes: Option<String>,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<OffsetDateTime>,
    pub rejection_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Membership role within a clinic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Veterinarian,
    Receptionist,
    Tutor,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "veterinarian" => Some(Role::Veterinarian),
            "receptionist" => Some(Role::Receptionist),
            "tutor" => Some(Role::Tutor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Veterinarian => "veterinarian",
            Role::Receptionist => "receptionist",
            Role::Tutor => "tutor",
        }
    }

    /// Roles admitted through the staff portal.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Tutor)
    }

    /// Roles allowed to provision accounts and manage clinic users.
    pub fn is_clinic_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four public entry points. Each portal authorizes a different
/// role-profile kind; the claimed portal is part of the login request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    Staff,
    Veterinarian,
    Receptionist,
    Tutor,
}

impl Portal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Portal::Staff => "staff",
            Portal::Veterinarian => "veterinarian",
            Portal::Receptionist => "receptionist",
            Portal::Tutor => "tutor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "staff" => Some(Portal::Staff),
            "veterinarian" => Some(Portal::Veterinarian),
            "receptionist" => Some(Portal::Receptionist),
            "tutor" => Some(Portal::Tutor),
            _ => None,
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected requests are immutable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

/// Authenticated request context, decoded from the session token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub portal: Portal,
    /// Active clinic for this session. Always set after a successful login.
    pub clinic_id: Option<Uuid>,
    /// Role within the active clinic (staff sessions).
    pub role: Option<Role>,
    /// Role-profile id (veterinarian/receptionist/tutor sessions).
    pub profile_id: Option<Uuid>,
}

/// The four role tables resolved once at login into a single closed variant.
#[derive(Debug, Serialize)]
#[serde(tag = "portal", rename_all = "lowercase")]
pub enum PortalSession {
    Staff {
        profile: Option<UserProfile>,
        clinics: Vec<ClinicMembership>,
        current_clinic_id: Uuid,
        role: Role,
    },
    Veterinarian { profile: Veterinarian },
    Receptionist { profile: Receptionist },
    Tutor { profile: Tutor },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_storage_representation() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Veterinarian,
            Role::Receptionist,
            Role::Tutor,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn staff_portal_admits_every_role_but_tutor() {
        assert!(Role::SuperAdmin.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(Role::Veterinarian.is_staff());
        assert!(Role::Receptionist.is_staff());
        assert!(!Role::Tutor.is_staff());
    }

    #[test]
    fn only_admins_may_provision() {
        assert!(Role::SuperAdmin.is_clinic_admin());
        assert!(Role::Admin.is_clinic_admin());
        assert!(!Role::Veterinarian.is_clinic_admin());
        assert!(!Role::Receptionist.is_clinic_admin());
        assert!(!Role::Tutor.is_clinic_admin());
    }

    #[test]
    fn reviewed_requests_are_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn appointment_status_serde_matches_storage_representation() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
    }

    #[test]
    fn portal_parses_login_paths() {
        assert_eq!(Portal::parse("staff"), Some(Portal::Staff));
        assert_eq!(Portal::parse("tutor"), Some(Portal::Tutor));
        assert_eq!(Portal::parse("groomer"), None);
    }
}
