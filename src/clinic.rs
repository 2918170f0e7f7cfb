use serde::Deserialize;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};
use crate::model::{Animal, Receptionist, Tutor, Veterinarian};

#[derive(Debug, Deserialize)]
pub struct NewAnimal {
    pub tutor_id: Uuid,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub birth_date: Option<Date>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewTutor {
    pub name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewVeterinarian {
    pub name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub crmv: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewReceptionist {
    pub name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Clinic-scoped domain queries. Every function takes the clinic id as a
/// required parameter; reads run on a connection whose clinic context is set,
/// so row-level policies enforce the same boundary the WHERE clauses express.
pub struct ClinicService {
    db_pool: PgPool,
}

impl ClinicService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn list_animals(&self, clinic_id: Uuid) -> Result<Vec<Animal>> {
        let mut conn = db::clinic_scoped_connection(&self.db_pool, clinic_id).await?;

        let animals = sqlx::query_as::<_, Animal>(
            "SELECT * FROM animals WHERE clinic_id = $1 ORDER BY name",
        )
        .bind(clinic_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(animals)
    }

    /// Animals of a single tutor (tutor portal view).
    pub async fn list_animals_for_tutor(
        &self,
        clinic_id: Uuid,
        tutor_id: Uuid,
    ) -> Result<Vec<Animal>> {
        let mut conn = db::clinic_scoped_connection(&self.db_pool, clinic_id).await?;

        let animals = sqlx::query_as::<_, Animal>(
            "SELECT * FROM animals WHERE clinic_id = $1 AND tutor_id = $2 ORDER BY name",
        )
        .bind(clinic_id)
        .bind(tutor_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(animals)
    }

    pub async fn create_animal(&self, clinic_id: Uuid, new: &NewAnimal) -> Result<Animal> {
        if new.name.trim().is_empty() {
            return Err(AppError::Validation("animal name is required".to_string()));
        }
        if new.species.trim().is_empty() {
            return Err(AppError::Validation("species is required".to_string()));
        }

        // The tutor must belong to the same clinic.
        let tutor_in_clinic: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tutors WHERE id = $1 AND clinic_id = $2)",
        )
        .bind(new.tutor_id)
        .bind(clinic_id)
        .fetch_one(&self.db_pool)
        .await?;

        if !tutor_in_clinic {
            return Err(AppError::NotFound("tutor"));
        }

        let animal = sqlx::query_as::<_, Animal>(
            "INSERT INTO animals
                 (clinic_id, tutor_id, name, species, breed, birth_date, notes,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING *",
        )
        .bind(clinic_id)
        .bind(new.tutor_id)
        .bind(&new.name)
        .bind(&new.species)
        .bind(&new.breed)
        .bind(new.birth_date)
        .bind(&new.notes)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("Animal {} registered in clinic {}", animal.id, clinic_id);
        Ok(animal)
    }

    pub async fn list_tutors(&self, clinic_id: Uuid) -> Result<Vec<Tutor>> {
        let mut conn = db::clinic_scoped_connection(&self.db_pool, clinic_id).await?;

        let tutors = sqlx::query_as::<_, Tutor>(
            "SELECT * FROM tutors WHERE clinic_id = $1 ORDER BY name",
        )
        .bind(clinic_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(tutors)
    }

    pub async fn create_tutor(&self, clinic_id: Uuid, new: &NewTutor) -> Result<Tutor> {
        if new.name.trim().is_empty() {
            return Err(AppError::Validation("tutor name is required".to_string()));
        }

        let tutor = sqlx::query_as::<_, Tutor>(
            "INSERT INTO tutors
                 (clinic_id, name, cpf, email, phone, address, city, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING *",
        )
        .bind(clinic_id)
        .bind(&new.name)
        .bind(&new.cpf)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(&new.city)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("Tutor {} registered in clinic {}", tutor.id, clinic_id);
        Ok(tutor)
    }

    pub async fn list_veterinarians(&self, clinic_id: Uuid) -> Result<Vec<Veterinarian>> {
        let mut conn = db::clinic_scoped_connection(&self.db_pool, clinic_id).await?;

        let veterinarians = sqlx::query_as::<_, Veterinarian>(
            "SELECT * FROM veterinarians WHERE clinic_id = $1 AND is_active = TRUE ORDER BY name",
        )
        .bind(clinic_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(veterinarians)
    }

    /// Register a veterinarian profile in data-only state: no linked identity
    /// until a provisioning call creates one.
    pub async fn create_veterinarian(
        &self,
        clinic_id: Uuid,
        new: &NewVeterinarian,
    ) -> Result<Veterinarian> {
        if new.name.trim().is_empty() {
            return Err(AppError::Validation(
                "veterinarian name is required".to_string(),
            ));
        }

        let veterinarian = sqlx::query_as::<_, Veterinarian>(
            "INSERT INTO veterinarians
                 (clinic_id, name, cpf, email, phone, crmv, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(clinic_id)
        .bind(&new.name)
        .bind(&new.cpf)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.crmv)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            "Veterinarian {} registered in clinic {}",
            veterinarian.id, clinic_id
        );
        Ok(veterinarian)
    }

    pub async fn list_receptionists(&self, clinic_id: Uuid) -> Result<Vec<Receptionist>> {
        let mut conn = db::clinic_scoped_connection(&self.db_pool, clinic_id).await?;

        let receptionists = sqlx::query_as::<_, Receptionist>(
            "SELECT * FROM receptionists WHERE clinic_id = $1 AND is_active = TRUE ORDER BY name",
        )
        .bind(clinic_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(receptionists)
    }

    pub async fn create_receptionist(
        &self,
        clinic_id: Uuid,
        new: &NewReceptionist,
    ) -> Result<Receptionist> {
        if new.name.trim().is_empty() {
            return Err(AppError::Validation(
                "receptionist name is required".to_string(),
            ));
        }

        let receptionist = sqlx::query_as::<_, Receptionist>(
            "INSERT INTO receptionists
                 (clinic_id, name, cpf, email, phone, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING *",
        )
        .bind(clinic_id)
        .bind(&new.name)
        .bind(&new.cpf)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            "Receptionist {} registered in clinic {}",
            receptionist.id, clinic_id
        );
        Ok(receptionist)
    }
}
